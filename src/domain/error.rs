//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for pricelab.
#[derive(Debug, thiserror::Error)]
pub enum PricelabError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no price data for {symbol} between {start_date} and {end_date}")]
    NoData {
        symbol: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },

    #[error("no trades executed for {symbol} under {strategy}")]
    NoTrades { symbol: String, strategy: String },

    #[error("unknown strategy '{name}' (expected threshold_cross, moving_average or rsi_mean_reversion)")]
    UnknownStrategy { name: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("data source {source_name} failed for {symbol}: {reason}")]
    DataSource {
        source_name: String,
        symbol: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PricelabError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        PricelabError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Caller-input errors, as opposed to data or infrastructure failures.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PricelabError::UnknownStrategy { .. } | PricelabError::InvalidParameter { .. }
        )
    }
}

impl From<&PricelabError> for std::process::ExitCode {
    fn from(err: &PricelabError) -> Self {
        let code: u8 = match err {
            PricelabError::Io(_) => 1,
            PricelabError::ConfigParse { .. }
            | PricelabError::ConfigMissing { .. }
            | PricelabError::ConfigInvalid { .. } => 2,
            PricelabError::Database { .. } | PricelabError::DatabaseQuery { .. } => 3,
            PricelabError::UnknownStrategy { .. } | PricelabError::InvalidParameter { .. } => 4,
            PricelabError::NoData { .. } => 5,
            PricelabError::DataSource { .. } => 6,
            PricelabError::NoTrades { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}
