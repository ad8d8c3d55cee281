//! Configuration for the synchronization layer
//!
//! The reference timing constants (30 s freshness, 5 s pending guard, and
//! friends) carry no recorded rationale, so none of them is hard-coded at a
//! call site. Everything times out or caps through this struct.

use chrono::Duration;

/// Tunable parameters for a room session and its sub-components
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long cached file content counts as fresh
    pub cache_freshness: Duration,
    /// Auto-expiry of the per-file pending-fetch guard
    pub pending_guard: Duration,
    /// Interval of the background cache sweep
    pub cache_sweep_interval: Duration,
    /// Cache entries untouched longer than this are evicted by the sweep
    pub cache_idle_eviction: Duration,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay: Duration,
    /// Consecutive failed reconnects before the channel goes terminal
    pub max_reconnect_attempts: u32,
    /// Concurrent editors allowed per file
    pub editor_capacity: usize,
    /// Minimum spacing between outbound cursor updates
    pub cursor_throttle: Duration,
    /// Quiet period after the last local edit before auto-save fires
    pub auto_save_debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_freshness: Duration::seconds(30),
            pending_guard: Duration::seconds(5),
            cache_sweep_interval: Duration::seconds(60),
            cache_idle_eviction: Duration::minutes(5),
            reconnect_delay: Duration::seconds(2),
            max_reconnect_attempts: 5,
            editor_capacity: 5,
            cursor_throttle: Duration::milliseconds(120),
            auto_save_debounce: Duration::milliseconds(500),
        }
    }
}
