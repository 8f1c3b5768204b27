mod synchronizer;

pub use synchronizer::HistorySynchronizer;

use orderbook_domain::services::history_window::HistoryWindow;
use std::time::Duration;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_RELAY_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Pause between two iterations.
    pub interval: Duration,
    /// Wall-clock budget of one history fetch.
    pub fetch_timeout: Duration,
    /// Batches buffered between the fetch task and the writer.
    pub relay_capacity: usize,
    /// Advance the sync marker even when the fetch failed, timed out or a
    /// batch could not be written.
    pub advance_on_failed_fetch: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            advance_on_failed_fetch: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Completed,
    Failed(String),
    TimedOut,
    Cancelled,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Completed => "completed",
            FetchStatus::Failed(_) => "failed",
            FetchStatus::TimedOut => "timed_out",
            FetchStatus::Cancelled => "cancelled",
        }
    }
}

/// What one synchronization iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub window: HistoryWindow,
    pub batches: u64,
    pub trades_written: u64,
    pub write_failures: u64,
    pub fetch: FetchStatus,
    pub marked_synced: bool,
}

impl SyncOutcome {
    /// Whether the iteration may advance the sync marker under `settings`.
    pub fn may_mark_synced(&self, settings: &SyncSettings) -> bool {
        match self.fetch {
            FetchStatus::Cancelled => false,
            FetchStatus::Completed if self.write_failures == 0 => true,
            _ => settings.advance_on_failed_fetch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchStatus, SyncOutcome, SyncSettings};
    use orderbook_domain::services::history_window::{HistoryWindow, SyncPhase};

    fn outcome(fetch: FetchStatus, write_failures: u64) -> SyncOutcome {
        SyncOutcome {
            window: HistoryWindow {
                phase: SyncPhase::Tail,
                start: 10,
                end: 20,
            },
            batches: 1,
            trades_written: 5,
            write_failures,
            fetch,
            marked_synced: false,
        }
    }

    #[test]
    fn marker_is_gated_on_clean_fetch_by_default() {
        let settings = SyncSettings::default();
        assert!(outcome(FetchStatus::Completed, 0).may_mark_synced(&settings));
        assert!(!outcome(FetchStatus::Completed, 1).may_mark_synced(&settings));
        assert!(!outcome(FetchStatus::TimedOut, 0).may_mark_synced(&settings));
        assert!(!outcome(FetchStatus::Failed("boom".into()), 0).may_mark_synced(&settings));
        assert!(!outcome(FetchStatus::Cancelled, 0).may_mark_synced(&settings));
    }

    #[test]
    fn lenient_mode_advances_unless_cancelled() {
        let settings = SyncSettings {
            advance_on_failed_fetch: true,
            ..SyncSettings::default()
        };
        assert!(outcome(FetchStatus::Completed, 2).may_mark_synced(&settings));
        assert!(outcome(FetchStatus::TimedOut, 0).may_mark_synced(&settings));
        assert!(outcome(FetchStatus::Failed("boom".into()), 0).may_mark_synced(&settings));
        assert!(!outcome(FetchStatus::Cancelled, 0).may_mark_synced(&settings));
    }
}
