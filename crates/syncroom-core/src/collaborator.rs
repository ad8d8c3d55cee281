//! Collaborator roster entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{Color, FileId, UserId, collaborator_color};
use crate::protocol::UserDescriptor;

/// One participant in a room, as tracked by the presence registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: UserId,
    pub display_name: String,
    pub color: Color,
    /// Character offset of their cursor, if known
    pub cursor_offset: Option<usize>,
    /// File their cursor was last seen in
    pub cursor_file: Option<FileId>,
    pub last_seen: DateTime<Utc>,
}

impl Collaborator {
    pub fn new(id: UserId, display_name: impl Into<String>, at: DateTime<Utc>) -> Self {
        let color = collaborator_color(&id);
        Self {
            id,
            display_name: display_name.into(),
            color,
            cursor_offset: None,
            cursor_file: None,
            last_seen: at,
        }
    }

    pub fn from_descriptor(descriptor: &UserDescriptor, at: DateTime<Utc>) -> Self {
        Self::new(descriptor.id.clone(), descriptor.name.clone(), at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_assigned_from_id() {
        let c = Collaborator::new(UserId::new("alice"), "Alice", Utc::now());
        assert_eq!(c.color, collaborator_color(&UserId::new("alice")));
        assert!(c.cursor_offset.is_none());
    }
}
