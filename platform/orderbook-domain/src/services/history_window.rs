use crate::services::watermarks::Watermarks;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing has been fully synced yet; fetch strictly older trades.
    Backfill,
    /// Fetch everything since the last completed pass.
    Tail,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Backfill => "backfill",
            SyncPhase::Tail => "tail",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open request window `[start, end)` in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub phase: SyncPhase,
    pub start: i64,
    pub end: i64,
}

impl HistoryWindow {
    /// Backfill requests `[0, lowest_timestamp)`, or `[0, now)` on an empty
    /// store. Tail requests `[history_synced, now)`.
    pub fn next(watermarks: &Watermarks, now: i64) -> HistoryWindow {
        if watermarks.is_history_synced() {
            return HistoryWindow {
                phase: SyncPhase::Tail,
                start: watermarks.history_synced,
                end: now,
            };
        }
        let end = if watermarks.lowest_timestamp == 0 {
            now
        } else {
            watermarks.lowest_timestamp
        };
        HistoryWindow {
            phase: SyncPhase::Backfill,
            start: 0,
            end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HistoryWindow, SyncPhase};
    use crate::services::watermarks::Watermarks;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn empty_store_backfills_everything() {
        let window = HistoryWindow::next(&Watermarks::default(), NOW);
        assert_eq!(
            window,
            HistoryWindow {
                phase: SyncPhase::Backfill,
                start: 0,
                end: NOW
            }
        );
    }

    #[test]
    fn backfill_ends_at_lowest_timestamp() {
        let marks = Watermarks {
            highest_timestamp: 500,
            lowest_timestamp: 120,
            history_synced: 0,
        };
        let window = HistoryWindow::next(&marks, NOW);
        assert_eq!(window.phase, SyncPhase::Backfill);
        assert_eq!((window.start, window.end), (0, 120));
    }

    #[test]
    fn synced_store_tails_from_marker() {
        let marks = Watermarks {
            highest_timestamp: 180,
            lowest_timestamp: 80,
            history_synced: 150,
        };
        let window = HistoryWindow::next(&marks, NOW);
        assert_eq!(window.phase, SyncPhase::Tail);
        assert_eq!((window.start, window.end), (150, NOW));
    }
}
