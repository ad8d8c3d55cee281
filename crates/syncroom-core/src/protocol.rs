//! Logical wire protocol
//!
//! Transport-agnostic message shapes exchanged with the room server. The
//! byte-level codec is postcard; the transport underneath (websocket, QUIC,
//! an in-memory channel in tests) only ever sees opaque frames.
//!
//! `CodeChange`/`CodeUpdate` carry whole-file content per change, not a
//! delta. That is the reference behavior's bandwidth/precision trade-off
//! and is preserved deliberately.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::identity::{Color, FileId, RoomId, UserId};

/// A user as announced to the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescriptor {
    pub id: UserId,
    pub name: String,
    pub color: Color,
}

/// Cursor location in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    /// Character offset from the start of the document
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Messages sent client → server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Announce membership; idempotent, re-sent after every reconnect
    JoinRoom {
        room: RoomId,
        user: UserDescriptor,
    },
    LeaveRoom {
        room: RoomId,
        user: UserId,
    },
    /// Whole-file content per change
    CodeChange {
        room: RoomId,
        file: FileId,
        file_name: String,
        content: String,
        version: u64,
        user: UserId,
    },
    CursorChange {
        room: RoomId,
        file: FileId,
        position: CursorPosition,
        user: UserId,
    },
    RequestEditPermission {
        room: RoomId,
        file: FileId,
        user: UserId,
    },
    ReleaseEditPermission {
        room: RoomId,
        file: FileId,
        user: UserId,
    },
    /// Fired after the auto-save debounce elapses with no further edits
    AutoSave {
        room: RoomId,
        file: FileId,
        content: String,
        user: UserId,
    },
}

/// Messages sent server → client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Full roster snapshot; supersedes all prior incremental roster state
    RoomUsers {
        users: Vec<UserDescriptor>,
    },
    UserJoined {
        user: UserDescriptor,
    },
    UserLeft {
        user: UserId,
    },
    CodeUpdate {
        file: FileId,
        file_name: String,
        content: String,
        version: u64,
        user: UserId,
    },
    CursorUpdate {
        file: FileId,
        position: CursorPosition,
        user: UserId,
    },
    /// Authoritative editor sets, replacing local arbiter state
    FileEditors {
        file_editors: HashMap<FileId, Vec<UserId>>,
    },
    EditPermissionResult {
        file: FileId,
        user: UserId,
        granted: bool,
    },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        postcard::to_allocvec(self).map_err(|e| CodecError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        postcard::from_bytes(bytes).map_err(|e| CodecError::Deserialization(e.to_string()))
    }
}

impl ServerMessage {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        postcard::to_allocvec(self).map_err(|e| CodecError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        postcard::from_bytes(bytes).map_err(|e| CodecError::Deserialization(e.to_string()))
    }
}
