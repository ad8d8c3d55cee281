//! Room session facade
//!
//! One [`RoomSession`] per joined room, composing the channel, presence
//! registry, mutation queue, file cache, permission arbiter and cursor
//! broadcaster behind a single entry point for the editing surface and
//! the file tree.
//!
//! The session is single-threaded by construction: every operation takes
//! `&mut self`, and the embedder drives it from one task, forwarding
//! inbound frames to [`RoomSession::handle_server_message`] (or calling
//! [`RoomSession::pump_inbound`]) and expired timers to
//! [`RoomSession::handle_timer`]. The only suspension points are the
//! persistence fetch and transport calls; both re-check session state
//! after resuming, so a result arriving mid-teardown is discarded rather
//! than applied.
//!
//! Error policy: transport loss enters the bounded retry cycle; a stale
//! cache write is a silent no-op; a denied edit request is a boolean
//! rendered as read-only; a failed fetch surfaces one
//! [`SessionEvent::FetchFailed`] and the session keeps running. No event
//! from a single file or user can poison state for the others.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use syncroom_core::{
    ClientMessage, Clock, Collaborator, CoreResult, CursorPosition, FileId, Mutation,
    MutationKind, RoomId, ServerMessage, SessionError, SyncConfig, UserDescriptor, UserId,
};
use syncroom_sync::{
    EditPermissionArbiter, FileCache, MutationQueue, PresenceEvent, PresenceRegistry,
};

use crate::broadcaster::{CursorBroadcaster, ThrottleDecision};
use crate::channel::{Channel, ChannelEvent, ConnectionState, SendOutcome};
use crate::persistence::PersistenceService;
use crate::scheduler::Scheduler;
use crate::transport::Transport;

/// Timers owned by the session, keyed for debounce/cancellation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionTimer {
    /// Fixed-delay reconnect attempt
    Reconnect,
    /// Flush a parked cursor position
    CursorFlush,
    /// Periodic cache eviction sweep
    CacheSweep,
    /// Auto-save debounce for one file
    AutoSave(FileId),
}

/// Notifications for the editing surface and file tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connection(ConnectionState),
    RosterChanged,
    /// Fresh content for a file (remote edit or completed fetch)
    ContentUpdated {
        file: FileId,
        content: String,
        version: u64,
    },
    /// A collaborator's cursor moved in the locally open file
    RemoteCursor {
        user: UserId,
        file: FileId,
        offset: usize,
    },
    /// Editor sets changed; query [`RoomSession::editors`] for details
    EditorsChanged,
    /// Server verdict on our own edit-permission request
    PermissionResult { file: FileId, granted: bool },
    /// A persistence read failed; shown inline, session continues
    FetchFailed { file: FileId, reason: String },
}

/// Per-room synchronization facade
pub struct RoomSession {
    room: RoomId,
    local: UserDescriptor,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    channel: Channel,
    transport: Arc<dyn Transport>,
    persistence: Arc<dyn PersistenceService>,
    presence: PresenceRegistry,
    queue: MutationQueue,
    cache: FileCache,
    arbiter: EditPermissionArbiter,
    broadcaster: CursorBroadcaster,
    scheduler: Scheduler<SessionTimer, SessionTimer>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    /// File the local viewer currently has open
    open_file: Option<FileId>,
    closed: bool,
}

impl RoomSession {
    /// Build a session.
    ///
    /// Returns the session plus two receivers: session events for the UI,
    /// and expired timers the embedder must feed back into
    /// [`Self::handle_timer`].
    pub fn new(
        room: RoomId,
        local: UserDescriptor,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn Transport>,
        persistence: Arc<dyn PersistenceService>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<SessionEvent>,
        mpsc::UnboundedReceiver<SessionTimer>,
    ) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let session = Self {
            channel: Channel::new(transport.clone(), config.max_reconnect_attempts),
            presence: PresenceRegistry::new(local.id.clone()),
            queue: MutationQueue::new(local.id.clone()),
            cache: FileCache::new(&config, clock.clone()),
            arbiter: EditPermissionArbiter::new(config.editor_capacity),
            broadcaster: CursorBroadcaster::new(config.cursor_throttle, clock.clone()),
            scheduler: Scheduler::new(timer_tx),
            room,
            local,
            config,
            clock,
            transport,
            persistence,
            events_tx,
            open_file: None,
            closed: false,
        };
        (session, events_rx, timer_rx)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed {
            Err(SessionError::Closed.into())
        } else {
            Ok(())
        }
    }

    /// Connect and announce room membership. Also arms the cache sweep.
    pub async fn join(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        info!(room = %self.room, user = %self.local.id, "joining room");
        let event = self.channel.connect().await;
        self.handle_channel_event(event).await;
        self.scheduler.schedule_repeating(
            SessionTimer::CacheSweep,
            self.config.cache_sweep_interval.to_std().unwrap_or_default(),
            SessionTimer::CacheSweep,
        );
        Ok(())
    }

    /// Leave the room and tear down. Idempotent; safe to call with fetches
    /// or sends still in flight.
    pub async fn leave(&mut self) {
        if self.closed {
            return;
        }
        info!(room = %self.room, "leaving room");
        self.closed = true;
        // Best effort; dropped silently when the link is down.
        let _ = self
            .channel
            .send(&ClientMessage::LeaveRoom {
                room: self.room.clone(),
                user: self.local.id.clone(),
            })
            .await;
        self.arbiter.release_all_for(&self.local.id);
        self.scheduler.cancel_all();
        self.channel.shutdown();
        self.emit(SessionEvent::Connection(ConnectionState::Disconnected));
    }

    /// Manual reconnect out of the terminal failed state.
    pub async fn reconnect(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        if let Some(event) = self.channel.manual_reconnect().await {
            self.handle_channel_event(event).await;
        }
        Ok(())
    }

    pub fn connection_state(&self) -> &ConnectionState {
        self.channel.state()
    }

    /// Send via the channel, entering the retry cycle when the link drops
    /// under us.
    async fn send(&mut self, msg: ClientMessage) -> CoreResult<()> {
        match self.channel.send(&msg).await? {
            SendOutcome::Sent | SendOutcome::Dropped => {}
            SendOutcome::ConnectionLost => {
                self.schedule_reconnect();
                self.emit(SessionEvent::Connection(self.channel.state().clone()));
            }
        }
        Ok(())
    }

    fn schedule_reconnect(&mut self) {
        self.scheduler.schedule(
            SessionTimer::Reconnect,
            self.config.reconnect_delay.to_std().unwrap_or_default(),
            SessionTimer::Reconnect,
        );
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                // Idempotent rejoin announcement; the server answers with a
                // roster snapshot that clears any event-gap ghosts.
                let join = ClientMessage::JoinRoom {
                    room: self.room.clone(),
                    user: self.local.clone(),
                };
                let _ = self.send(join).await;
                self.emit(SessionEvent::Connection(ConnectionState::Connected));
            }
            ChannelEvent::Disconnected => {
                self.schedule_reconnect();
                self.emit(SessionEvent::Connection(self.channel.state().clone()));
            }
            ChannelEvent::Reconnecting { .. } => {
                self.schedule_reconnect();
                self.emit(SessionEvent::Connection(self.channel.state().clone()));
            }
            ChannelEvent::ReconnectFailed => {
                // Terminal; the UI shows a manual-retry banner.
                self.emit(SessionEvent::Connection(ConnectionState::Failed));
            }
        }
    }

    /// Feed one expired timer back into the session.
    pub async fn handle_timer(&mut self, timer: SessionTimer) {
        if self.closed {
            return;
        }
        match timer {
            SessionTimer::Reconnect => {
                if let Some(event) = self.channel.try_reconnect().await {
                    self.handle_channel_event(event).await;
                }
            }
            SessionTimer::CursorFlush => {
                if let Some((file, position)) = self.broadcaster.take_parked() {
                    let msg = ClientMessage::CursorChange {
                        room: self.room.clone(),
                        file,
                        position,
                        user: self.local.id.clone(),
                    };
                    let _ = self.send(msg).await;
                }
            }
            SessionTimer::CacheSweep => {
                self.cache.sweep();
            }
            SessionTimer::AutoSave(file) => {
                if let Some(state) = self.cache.get(&file) {
                    let msg = ClientMessage::AutoSave {
                        room: self.room.clone(),
                        file: file.clone(),
                        content: state.content.clone(),
                        user: self.local.id.clone(),
                    };
                    let _ = self.send(msg).await;
                }
            }
        }
    }

    /// Receive one frame from the transport and dispatch it.
    ///
    /// Returns false when the stream closed (the retry cycle has been
    /// entered). A malformed frame is logged and skipped; one bad sender
    /// must not end the session.
    pub async fn pump_inbound(&mut self) -> bool {
        match self.transport.recv().await {
            Some(frame) => {
                match ServerMessage::decode(&frame) {
                    Ok(msg) => self.handle_server_message(msg).await,
                    Err(e) => warn!(error = %e, "dropping malformed inbound frame"),
                }
                true
            }
            None => {
                if let Some(event) = self.channel.notify_disconnected() {
                    self.handle_channel_event(event).await;
                }
                false
            }
        }
    }

    /// Dispatch one decoded server message.
    pub async fn handle_server_message(&mut self, msg: ServerMessage) {
        if self.closed {
            debug!("message after teardown discarded");
            return;
        }
        let now = self.clock.now();
        match msg {
            ServerMessage::RoomUsers { users } => {
                self.presence.apply(PresenceEvent::RosterSnapshot(users), now);
                self.emit(SessionEvent::RosterChanged);
            }
            ServerMessage::UserJoined { user } => {
                self.presence.apply(PresenceEvent::UserJoined(user), now);
                self.emit(SessionEvent::RosterChanged);
            }
            ServerMessage::UserLeft { user } => {
                self.presence.apply(PresenceEvent::UserLeft(user.clone()), now);
                self.arbiter.release_all_for(&user);
                self.emit(SessionEvent::RosterChanged);
                self.emit(SessionEvent::EditorsChanged);
            }
            ServerMessage::CodeUpdate {
                file,
                content,
                version,
                user,
                ..
            } => {
                self.handle_code_update(file, content, version, user).await;
            }
            ServerMessage::CursorUpdate {
                file,
                position,
                user,
            } => {
                if user == self.local.id {
                    return;
                }
                if let Some(event) = self.broadcaster.on_remote_cursor(
                    user.clone(),
                    file.clone(),
                    position,
                    self.open_file.as_ref(),
                ) {
                    self.presence.apply(event, now);
                    self.emit(SessionEvent::RemoteCursor {
                        user,
                        file,
                        offset: position.offset,
                    });
                }
            }
            ServerMessage::FileEditors { file_editors } => {
                self.arbiter.apply_snapshot(file_editors);
                self.emit(SessionEvent::EditorsChanged);
            }
            ServerMessage::EditPermissionResult {
                file,
                user,
                granted,
            } => {
                if user != self.local.id {
                    return;
                }
                // Server verdict overrides the optimistic local decision.
                if granted {
                    self.arbiter.request_edit(&file, &user);
                } else {
                    self.arbiter.release_edit(&file, &user);
                }
                self.emit(SessionEvent::PermissionResult { file, granted });
            }
        }
    }

    async fn handle_code_update(
        &mut self,
        file: FileId,
        content: String,
        version: u64,
        user: UserId,
    ) {
        if user == self.local.id {
            // Echo of our own edit: acknowledge the oldest pending
            // mutation. Echoes arrive in issue order over the single
            // stream, so front-of-queue matching is sound.
            let front = self.queue.pending().next().map(|m| m.id.clone());
            if let Some(id) = front {
                self.queue.acknowledge(&id);
            }
            self.queue.observe_version(version);
            self.cache.put(&file, content, Some(version), Some(user));
            return;
        }

        // Remote edit. The wire carries whole-file content, so it lands as
        // a replace: transform is a pass-through and the version check in
        // the cache arbitrates ordering.
        let remote = Mutation::new(
            MutationKind::Replace { text: content },
            user.clone(),
            self.clock.now(),
        );
        let transformed = self.queue.transform_incoming(remote);
        let base = self
            .cache
            .get(&file)
            .map(|s| s.content.clone())
            .unwrap_or_default();
        let next = transformed.apply(&base);
        if self.cache.put(&file, next.clone(), Some(version), Some(user)) {
            self.queue.rebase_after_remote(&transformed);
            self.queue.observe_version(version);
            self.emit(SessionEvent::ContentUpdated {
                file,
                content: next,
                version,
            });
        }
    }

    /// Hydrate the cache with the room's open files after join.
    ///
    /// The file tree fetches the listing out of band and hands the
    /// contents over in one batch.
    pub fn hydrate_files(&mut self, files: Vec<syncroom_core::FileState>) -> CoreResult<()> {
        self.ensure_open()?;
        let top = files.iter().map(|f| f.version).max();
        self.cache.batch_put(files);
        if let Some(version) = top {
            self.queue.observe_version(version);
        }
        Ok(())
    }

    /// Apply a remote positional mutation (insert/delete) directly.
    ///
    /// The reference wire protocol only ships whole-file replaces, but the
    /// transformer supports positional ops for embedders that carry them.
    pub fn apply_remote_mutation(&mut self, file: &FileId, remote: Mutation) -> Option<String> {
        if self.closed || remote.author == self.local.id {
            return None;
        }
        let transformed = self.queue.transform_incoming(remote);
        let base = self.cache.get(file).map(|s| s.content.clone())?;
        let next = transformed.apply(&base);
        self.cache
            .put(file, next.clone(), None, Some(transformed.author.clone()));
        self.queue.rebase_after_remote(&transformed);
        self.emit(SessionEvent::ContentUpdated {
            file: file.clone(),
            content: next.clone(),
            version: self.queue.local_version(),
        });
        Some(next)
    }

    /// Record a local edit from the editing surface.
    ///
    /// Queues the mutation, applies it optimistically to the cache, ships
    /// whole-file content, and arms the auto-save debounce.
    pub async fn local_edit(&mut self, file: &FileId, kind: MutationKind) -> CoreResult<()> {
        self.ensure_open()?;
        let base = self
            .cache
            .get(file)
            .map(|s| s.content.clone())
            .unwrap_or_default();
        let mutation = Mutation::new(kind, self.local.id.clone(), self.clock.now());
        let stamped = self.queue.enqueue_local(mutation);
        let next = stamped.apply(&base);
        // Optimistic local write; the server still owns version numbering.
        self.cache
            .put(file, next.clone(), None, Some(self.local.id.clone()));

        let msg = ClientMessage::CodeChange {
            room: self.room.clone(),
            file: file.clone(),
            file_name: file.as_str().to_string(),
            content: next,
            version: self.queue.local_version(),
            user: self.local.id.clone(),
        };
        self.send(msg).await?;

        self.scheduler.schedule(
            SessionTimer::AutoSave(file.clone()),
            self.config.auto_save_debounce.to_std().unwrap_or_default(),
            SessionTimer::AutoSave(file.clone()),
        );
        Ok(())
    }

    /// Report a local cursor move; throttled on the way out.
    pub async fn local_cursor(&mut self, file: FileId, position: CursorPosition) -> CoreResult<()> {
        self.ensure_open()?;
        match self.broadcaster.on_local_cursor_move(file, position) {
            ThrottleDecision::SendNow(file, position) => {
                let msg = ClientMessage::CursorChange {
                    room: self.room.clone(),
                    file,
                    position,
                    user: self.local.id.clone(),
                };
                self.send(msg).await?;
            }
            ThrottleDecision::Deferred(remaining) => {
                self.scheduler
                    .schedule(SessionTimer::CursorFlush, remaining, SessionTimer::CursorFlush);
            }
        }
        Ok(())
    }

    /// Open a file for viewing. Serves fresh cache immediately; otherwise
    /// fetches from persistence, guarded against duplicate fetches.
    pub async fn open_file(&mut self, file: FileId) -> CoreResult<()> {
        self.ensure_open()?;
        self.open_file = Some(file.clone());

        if self.cache.is_fresh(&file) {
            if let Some(state) = self.cache.get(&file) {
                let event = SessionEvent::ContentUpdated {
                    file,
                    content: state.content.clone(),
                    version: state.version,
                };
                self.emit(event);
            }
            return Ok(());
        }

        // Check-then-set: a false return means a fetch is already in
        // flight and will emit when it lands.
        if !self.cache.mark_pending(&file) {
            debug!(file = %file, "fetch already pending");
            return Ok(());
        }

        let fetched = self.persistence.read_file(&file).await;

        // Suspension point passed: the session may have been torn down or
        // the guard superseded while we were away.
        if self.closed {
            return Ok(());
        }
        if !self.cache.is_pending(&file) {
            debug!(file = %file, "fetch result discarded, guard no longer held");
            return Ok(());
        }
        self.cache.clear_pending(&file);

        match fetched {
            Ok((content, version)) => {
                if self.cache.put(&file, content.clone(), Some(version), None) {
                    self.queue.observe_version(version);
                }
                // Serve whatever the cache now holds; a concurrent fresher
                // write wins over our fetch result.
                if let Some(state) = self.cache.get(&file) {
                    let event = SessionEvent::ContentUpdated {
                        file,
                        content: state.content.clone(),
                        version: state.version,
                    };
                    self.emit(event);
                }
            }
            Err(e) => {
                warn!(file = %file, error = %e, "file fetch failed");
                self.emit(SessionEvent::FetchFailed {
                    file,
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Request an edit slot on a file. Denial is a boolean; the caller
    /// renders read-only.
    pub async fn request_edit(&mut self, file: &FileId) -> CoreResult<bool> {
        self.ensure_open()?;
        let granted = self.arbiter.request_edit(file, &self.local.id);
        if granted {
            let msg = ClientMessage::RequestEditPermission {
                room: self.room.clone(),
                file: file.clone(),
                user: self.local.id.clone(),
            };
            self.send(msg).await?;
        }
        Ok(granted)
    }

    /// Release an edit slot. Idempotent; safe during teardown.
    pub async fn release_edit(&mut self, file: &FileId) -> CoreResult<()> {
        self.arbiter.release_edit(file, &self.local.id);
        let msg = ClientMessage::ReleaseEditPermission {
            room: self.room.clone(),
            file: file.clone(),
            user: self.local.id.clone(),
        };
        // Best effort even mid-teardown; a dropped frame is fine, the
        // server also releases on disconnect.
        let _ = self.channel.send(&msg).await;
        Ok(())
    }

    // -- queries for the presentation layer ------------------------------

    pub fn can_edit(&self, file: &FileId) -> bool {
        self.arbiter.can_edit(file, &self.local.id)
    }

    pub fn editors(&self, file: &FileId) -> BTreeSet<UserId> {
        self.arbiter.editors(file)
    }

    pub fn collaborators(&self) -> Vec<&Collaborator> {
        self.presence.others().collect()
    }

    pub fn cached_content(&mut self, file: &FileId) -> Option<String> {
        self.cache.get(file).map(|s| s.content.clone())
    }

    pub fn cached_version(&self, file: &FileId) -> Option<u64> {
        self.cache.version(file)
    }

    pub fn pending_mutations(&self) -> usize {
        self.queue.pending_len()
    }

    pub fn open_file_id(&self) -> Option<&FileId> {
        self.open_file.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
