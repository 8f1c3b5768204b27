use crate::value_objects::currency_pair::CurrencyPair;
use crate::value_objects::trade::Trade;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub pair: CurrencyPair,
    /// Inclusive lower bound, epoch seconds.
    pub start: i64,
    /// Exclusive upper bound, epoch seconds.
    pub end: i64,
}

/// Paginated trade history of an external venue.
///
/// Implementations push each page into `batches` as soon as it is decoded and
/// return once the window is exhausted. A closed receiver means the consumer
/// gave up; implementations should stop and return `Ok(())`.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(
        &self,
        request: HistoryRequest,
        batches: mpsc::Sender<Vec<Trade>>,
    ) -> Result<(), String>;
}
