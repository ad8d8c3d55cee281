//! Presence registry
//!
//! Tracks every collaborator in the room except the local user, whose own
//! record is the session's concern. Incremental events keep the roster
//! current; a full snapshot (sent by the server after every rejoin)
//! atomically replaces it, which is what clears ghost entries left by an
//! event gap across a reconnect.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use syncroom_core::{Collaborator, FileId, UserDescriptor, UserId};

/// Roster events, in wire arrival order
#[derive(Debug, Clone)]
pub enum PresenceEvent {
    UserJoined(UserDescriptor),
    UserLeft(UserId),
    /// Atomic replacement of the entire non-self roster
    RosterSnapshot(Vec<UserDescriptor>),
    CursorUpdate {
        user: UserId,
        file: FileId,
        offset: usize,
    },
}

/// Roster of non-self collaborators in one room
pub struct PresenceRegistry {
    local: UserId,
    others: HashMap<UserId, Collaborator>,
}

impl PresenceRegistry {
    pub fn new(local: UserId) -> Self {
        Self {
            local,
            others: HashMap::new(),
        }
    }

    /// Apply one presence event.
    ///
    /// - `UserJoined`: insert-or-ignore by id (a duplicate join refreshes
    ///   `last_seen`, nothing else)
    /// - `UserLeft`: remove by id
    /// - `RosterSnapshot`: replace the whole roster
    /// - `CursorUpdate`: update an existing entry only; unknown ids are
    ///   dropped rather than inserted as phantom collaborators
    ///
    /// Events about the local user are ignored; the registry only holds
    /// "others".
    pub fn apply(&mut self, event: PresenceEvent, now: DateTime<Utc>) {
        match event {
            PresenceEvent::UserJoined(descriptor) => {
                if descriptor.id == self.local {
                    return;
                }
                self.others
                    .entry(descriptor.id.clone())
                    .and_modify(|c| c.last_seen = now)
                    .or_insert_with(|| Collaborator::from_descriptor(&descriptor, now));
            }
            PresenceEvent::UserLeft(user) => {
                if self.others.remove(&user).is_some() {
                    debug!(user = %user, "collaborator left");
                }
            }
            PresenceEvent::RosterSnapshot(users) => {
                self.others = users
                    .iter()
                    .filter(|d| d.id != self.local)
                    .map(|d| (d.id.clone(), Collaborator::from_descriptor(d, now)))
                    .collect();
                debug!(count = self.others.len(), "roster snapshot applied");
            }
            PresenceEvent::CursorUpdate { user, file, offset } => {
                if let Some(collaborator) = self.others.get_mut(&user) {
                    collaborator.cursor_offset = Some(offset);
                    collaborator.cursor_file = Some(file);
                    collaborator.last_seen = now;
                }
            }
        }
    }

    pub fn get(&self, user: &UserId) -> Option<&Collaborator> {
        self.others.get(user)
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.others.contains_key(user)
    }

    /// All non-self collaborators, in no particular order
    pub fn others(&self) -> impl Iterator<Item = &Collaborator> {
        self.others.values()
    }

    pub fn len(&self) -> usize {
        self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.others.is_empty()
    }

    /// Drop entries not seen for longer than `idle`.
    ///
    /// Returns the ids that were removed.
    pub fn prune_stale(&mut self, idle: chrono::Duration, now: DateTime<Utc>) -> Vec<UserId> {
        let stale: Vec<UserId> = self
            .others
            .values()
            .filter(|c| now - c.last_seen > idle)
            .map(|c| c.id.clone())
            .collect();
        for id in &stale {
            self.others.remove(id);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncroom_core::collaborator_color;

    fn descriptor(id: &str) -> UserDescriptor {
        let user = UserId::new(id);
        UserDescriptor {
            color: collaborator_color(&user),
            name: id.to_uppercase(),
            id: user,
        }
    }

    fn registry() -> PresenceRegistry {
        PresenceRegistry::new(UserId::new("me"))
    }

    #[test]
    fn test_join_and_leave() {
        let mut reg = registry();
        let now = Utc::now();
        reg.apply(PresenceEvent::UserJoined(descriptor("u1")), now);
        assert!(reg.contains(&UserId::new("u1")));

        reg.apply(PresenceEvent::UserLeft(UserId::new("u1")), now);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_duplicate_join_is_idempotent() {
        let mut reg = registry();
        let now = Utc::now();
        reg.apply(PresenceEvent::UserJoined(descriptor("u1")), now);
        reg.apply(PresenceEvent::UserJoined(descriptor("u1")), now);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_self_join_ignored() {
        let mut reg = registry();
        reg.apply(PresenceEvent::UserJoined(descriptor("me")), Utc::now());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_snapshot_replaces_roster() {
        // Scenario: a join event followed by an empty snapshot leaves an
        // empty roster; the snapshot is authoritative.
        let mut reg = registry();
        let now = Utc::now();
        reg.apply(PresenceEvent::UserJoined(descriptor("u9")), now);
        reg.apply(PresenceEvent::RosterSnapshot(vec![]), now);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_snapshot_filters_self() {
        let mut reg = registry();
        reg.apply(
            PresenceEvent::RosterSnapshot(vec![descriptor("me"), descriptor("u2")]),
            Utc::now(),
        );
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(&UserId::new("u2")));
    }

    #[test]
    fn test_cursor_update_for_unknown_id_is_dropped() {
        let mut reg = registry();
        reg.apply(
            PresenceEvent::CursorUpdate {
                user: UserId::new("ghost"),
                file: FileId::new("a.js"),
                offset: 3,
            },
            Utc::now(),
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn test_cursor_update_for_known_id() {
        let mut reg = registry();
        let now = Utc::now();
        reg.apply(PresenceEvent::UserJoined(descriptor("u1")), now);
        reg.apply(
            PresenceEvent::CursorUpdate {
                user: UserId::new("u1"),
                file: FileId::new("a.js"),
                offset: 17,
            },
            now,
        );
        let c = reg.get(&UserId::new("u1")).unwrap();
        assert_eq!(c.cursor_offset, Some(17));
        assert_eq!(c.cursor_file, Some(FileId::new("a.js")));
    }

    #[test]
    fn test_prune_stale() {
        let mut reg = registry();
        let start = Utc::now();
        reg.apply(PresenceEvent::UserJoined(descriptor("old")), start);
        let later = start + chrono::Duration::minutes(10);
        reg.apply(PresenceEvent::UserJoined(descriptor("new")), later);

        let removed = reg.prune_stale(chrono::Duration::minutes(5), later);
        assert_eq!(removed, vec![UserId::new("old")]);
        assert!(reg.contains(&UserId::new("new")));
    }
}
