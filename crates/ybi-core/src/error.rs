use thiserror::Error;

/// The single error type crossing component boundaries. Library crates
/// return `Result<_, BacktestError>`; the CLI binary wraps this in
/// `anyhow::Result` at its outer edge only.
#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("data unavailable for {ticker} on {date}: {detail}")]
    DataUnavailable {
        ticker: String,
        date: String,
        detail: String,
    },

    #[error("universe empty on {0}")]
    UniverseEmpty(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("provider authentication failed")]
    ProviderAuth,
}

impl BacktestError {
    /// CLI process exit code for this error class, per the driver's
    /// documented exit-code contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            BacktestError::Config(_) | BacktestError::ProviderAuth => 2,
            BacktestError::DataUnavailable { .. } => 3,
            BacktestError::UniverseEmpty(_) => 0,
            BacktestError::InvariantViolation(_) => 4,
        }
    }
}
