use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error categories surfaced by the engine.
///
/// Not-found conditions (a missing key on `Find`/`Update`/`Remove`, an empty
/// cursor on `Next`/`Previous`/`GetCurrentX`) are deliberately *not*
/// represented here: they are success-shaped `(false, Ok(()))` / zero-value
/// returns, never an `Err`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("node repository error: {0}")]
    Repository(String),

    #[error("item action tracker error: {0}")]
    Tracker(String),

    #[error("structural invariant violation: {0}")]
    InvariantViolation(String),

    #[error("transaction has not begun")]
    TransactionNotBegun,

    #[error("transaction is not open for writing")]
    TransactionNotForWriting,
}

impl Error {
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    pub fn tracker(msg: impl Into<String>) -> Self {
        Self::Tracker(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}
