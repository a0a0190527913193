use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Slot missing, owned by someone else, in the wrong status, or lost to a
    /// concurrent swap. Re-discover and retry with fresh data.
    #[error("invalid slot state: {0}")]
    InvalidSlotState(String),

    /// Missing, addressed to another user, or already resolved the other way.
    /// Callers cannot tell these cases apart.
    #[error("swap request not found")]
    RequestNotFound,

    /// Persistence failed. Every write is conditioned or keyed by request id,
    /// so the whole operation may be retried.
    #[error("store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ExchangeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExchangeError::StoreUnavailable(_))
    }
}

impl From<anyhow::Error> for ExchangeError {
    fn from(e: anyhow::Error) -> Self {
        ExchangeError::StoreUnavailable(e)
    }
}
