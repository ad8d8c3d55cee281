//! Identity newtypes and deterministic color derivation
//!
//! Rooms, files and users are identified by opaque strings handed to us by
//! the identity provider and the file tree. The newtypes keep them from
//! being mixed up at call sites.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Opaque room identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

/// Opaque file identifier within a room
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub String);

/// Opaque user identifier from the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

macro_rules! impl_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

impl_id!(RoomId);
impl_id!(FileId);
impl_id!(UserId);

/// An RGB collaborator color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    /// CSS-style hex form, e.g. `#e06c75`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Fixed palette of distinguishable editor colors
const PALETTE: [Color; 12] = [
    Color(0xe0, 0x6c, 0x75),
    Color(0x98, 0xc3, 0x79),
    Color(0xe5, 0xc0, 0x7b),
    Color(0x61, 0xaf, 0xef),
    Color(0xc6, 0x78, 0xdd),
    Color(0x56, 0xb6, 0xc2),
    Color(0xd1, 0x9a, 0x66),
    Color(0xbe, 0x50, 0x46),
    Color(0x7e, 0xc6, 0x99),
    Color(0x6e, 0x8e, 0xf7),
    Color(0xd6, 0x6f, 0xb0),
    Color(0x4d, 0xb3, 0x80),
];

/// Derive a collaborator's color from their id.
///
/// Pure and deterministic: every replica computes the same color for the
/// same user without any coordination. Presentation layers decide what to
/// do with it; the core only hands out the value.
pub fn collaborator_color(user: &UserId) -> Color {
    let hash = blake3::hash(user.0.as_bytes());
    let index = hash.as_bytes()[0] as usize % PALETTE.len();
    PALETTE[index]
}
