//! Error types for the syncroom layer
//!
//! Denied edit permission and stale cache writes are deliberately NOT
//! errors: denial is a boolean outcome and stale writes are silent no-ops
//! (see `syncroom-sync`). Only genuine failures live here.

use thiserror::Error;

/// Top-level error type for the syncroom layer
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Errors related to the real-time channel
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Reconnection failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Not connected")]
    NotConnected,
}

/// Errors related to wire encoding
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Errors from the persistence service
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),
}

/// Errors related to session lifecycle
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,

    #[error("Not joined to a room")]
    NotJoined,
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::from(TransportError::ReconnectExhausted { attempts: 5 });
        assert!(format!("{}", err).contains("5 attempts"));

        let err = SyncError::from(FetchError::NotFound("f1".to_string()));
        assert!(format!("{}", err).contains("f1"));

        let err = CodecError::Deserialization("truncated".to_string());
        assert!(format!("{}", err).contains("truncated"));
    }

    #[test]
    fn test_from_conversions() {
        fn takes_sync_error(_: SyncError) {}
        takes_sync_error(TransportError::NotConnected.into());
        takes_sync_error(SessionError::Closed.into());
    }
}
