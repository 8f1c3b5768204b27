use crate::value_objects::trade::Trade;

/// Time boundaries of the trades durably stored for one pair.
///
/// Zero means "unset" for every field. `history_synced` holds the
/// `highest_timestamp` recorded at the end of the last completed catch-up pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermarks {
    pub highest_timestamp: i64,
    pub lowest_timestamp: i64,
    pub history_synced: i64,
}

impl Watermarks {
    /// Folds a batch into the running boundaries. `highest_timestamp` only
    /// rises and `lowest_timestamp` only falls (an unset low is replaced).
    /// Timestamps `<= 0` collide with the unset sentinel and never move the
    /// low side.
    pub fn merged_with(&self, trades: &[Trade]) -> Watermarks {
        let mut next = *self;
        for trade in trades {
            next = next.merged_with_timestamp(trade.timestamp);
        }
        next
    }

    pub fn merged_with_timestamp(&self, timestamp: i64) -> Watermarks {
        let mut next = *self;
        if timestamp > next.highest_timestamp {
            next.highest_timestamp = timestamp;
        }
        if timestamp > 0 && (next.lowest_timestamp == 0 || timestamp < next.lowest_timestamp) {
            next.lowest_timestamp = timestamp;
        }
        next
    }

    /// Applies `other` without ever regressing either boundary.
    pub fn advance_to(&mut self, other: &Watermarks) {
        if other.highest_timestamp > self.highest_timestamp {
            self.highest_timestamp = other.highest_timestamp;
        }
        if other.lowest_timestamp != 0
            && (self.lowest_timestamp == 0 || other.lowest_timestamp < self.lowest_timestamp)
        {
            self.lowest_timestamp = other.lowest_timestamp;
        }
    }

    pub fn is_history_synced(&self) -> bool {
        self.history_synced > 0
    }
}
