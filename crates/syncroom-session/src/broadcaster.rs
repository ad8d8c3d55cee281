//! Cursor broadcaster
//!
//! Outbound: local cursor movement is coalesced to at most one send per
//! throttle window; movement inside the window parks the newest position
//! and the session arms a flush timer for the remainder.
//!
//! Inbound: a remote cursor event is only worth applying when it concerns
//! the file the local viewer has open; a cursor in file A must not render
//! while viewing file B. Mismatches are dropped before they reach the
//! presence registry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use syncroom_core::{Clock, CursorPosition, FileId, UserId};
use syncroom_sync::PresenceEvent;

/// What to do with one local cursor movement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Outside the window: send immediately
    SendNow(FileId, CursorPosition),
    /// Inside the window: parked; arm a flush timer for this long
    Deferred(std::time::Duration),
}

/// Throttles outbound cursor updates and filters inbound ones
pub struct CursorBroadcaster {
    throttle: Duration,
    clock: Arc<dyn Clock>,
    last_sent: Option<DateTime<Utc>>,
    parked: Option<(FileId, CursorPosition)>,
}

impl CursorBroadcaster {
    pub fn new(throttle: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            throttle,
            clock,
            last_sent: None,
            parked: None,
        }
    }

    /// Feed one local cursor movement through the throttle.
    pub fn on_local_cursor_move(
        &mut self,
        file: FileId,
        position: CursorPosition,
    ) -> ThrottleDecision {
        let now = self.clock.now();
        match self.last_sent {
            Some(last) if now - last < self.throttle => {
                // Newest position wins; older parked movement is obsolete.
                self.parked = Some((file, position));
                let remaining = self.throttle - (now - last);
                trace!(?remaining, "cursor move parked");
                ThrottleDecision::Deferred(remaining.to_std().unwrap_or_default())
            }
            _ => {
                self.last_sent = Some(now);
                self.parked = None;
                ThrottleDecision::SendNow(file, position)
            }
        }
    }

    /// Take the parked position when the flush timer fires.
    ///
    /// Returns `None` when a newer movement already went out.
    pub fn take_parked(&mut self) -> Option<(FileId, CursorPosition)> {
        let parked = self.parked.take()?;
        self.last_sent = Some(self.clock.now());
        Some(parked)
    }

    /// Filter one inbound cursor event against the locally open file.
    ///
    /// Returns the presence event to apply, or `None` when the event is
    /// for a file the viewer is not looking at.
    pub fn on_remote_cursor(
        &self,
        user: UserId,
        file: FileId,
        position: CursorPosition,
        open_file: Option<&FileId>,
    ) -> Option<PresenceEvent> {
        if open_file != Some(&file) {
            trace!(user = %user, file = %file, "remote cursor for unopened file dropped");
            return None;
        }
        Some(PresenceEvent::CursorUpdate {
            user,
            file,
            offset: position.offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncroom_core::ManualClock;

    fn pos(offset: usize) -> CursorPosition {
        CursorPosition {
            offset,
            line: 0,
            column: offset,
        }
    }

    fn broadcaster() -> (CursorBroadcaster, ManualClock) {
        let clock = ManualClock::new();
        let b = CursorBroadcaster::new(Duration::milliseconds(120), Arc::new(clock.clone()));
        (b, clock)
    }

    #[test]
    fn test_first_move_sends_immediately() {
        let (mut b, _clock) = broadcaster();
        let decision = b.on_local_cursor_move(FileId::new("a.js"), pos(3));
        assert_eq!(decision, ThrottleDecision::SendNow(FileId::new("a.js"), pos(3)));
    }

    #[test]
    fn test_moves_inside_window_coalesce() {
        let (mut b, clock) = broadcaster();
        b.on_local_cursor_move(FileId::new("a.js"), pos(1));

        clock.advance(Duration::milliseconds(50));
        assert!(matches!(
            b.on_local_cursor_move(FileId::new("a.js"), pos(2)),
            ThrottleDecision::Deferred(_)
        ));
        clock.advance(Duration::milliseconds(20));
        assert!(matches!(
            b.on_local_cursor_move(FileId::new("a.js"), pos(3)),
            ThrottleDecision::Deferred(_)
        ));

        // Only the newest parked position flushes.
        assert_eq!(b.take_parked(), Some((FileId::new("a.js"), pos(3))));
        assert_eq!(b.take_parked(), None);
    }

    #[test]
    fn test_move_after_window_sends_again() {
        let (mut b, clock) = broadcaster();
        b.on_local_cursor_move(FileId::new("a.js"), pos(1));
        clock.advance(Duration::milliseconds(200));
        assert!(matches!(
            b.on_local_cursor_move(FileId::new("a.js"), pos(2)),
            ThrottleDecision::SendNow(..)
        ));
    }

    #[test]
    fn test_deferred_remaining_time_shrinks() {
        let (mut b, clock) = broadcaster();
        b.on_local_cursor_move(FileId::new("a.js"), pos(1));
        clock.advance(Duration::milliseconds(90));
        let ThrottleDecision::Deferred(remaining) =
            b.on_local_cursor_move(FileId::new("a.js"), pos(2))
        else {
            panic!("expected deferred");
        };
        assert_eq!(remaining, std::time::Duration::from_millis(30));
    }

    #[test]
    fn test_remote_cursor_filtered_by_open_file() {
        let (b, _clock) = broadcaster();
        let open = FileId::new("a.js");

        // Matching file passes through.
        assert!(
            b.on_remote_cursor(UserId::new("u2"), open.clone(), pos(5), Some(&open))
                .is_some()
        );
        // Event for another file is dropped.
        assert!(
            b.on_remote_cursor(UserId::new("u2"), FileId::new("b.js"), pos(5), Some(&open))
                .is_none()
        );
        // No file open: nothing renders.
        assert!(
            b.on_remote_cursor(UserId::new("u2"), open.clone(), pos(5), None)
                .is_none()
        );
    }
}
