//! Domain error types.

/// Top-level error type for pipreplay.
#[derive(Debug, thiserror::Error)]
pub enum PipreplayError {
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

    #[error("invalid trade definition: {reason}")]
    InvalidTrade { reason: String },

    #[error("invalid simulation parameters: {reason}")]
    InvalidParams { reason: String },

    #[error("unknown timeframe: {label}")]
    UnknownTimeframe { label: String },

    #[error("setup file error at line {line}: {reason}")]
    SetupParse { line: u64, reason: String },

    #[error("no data for {symbol}: {detail}")]
    NoData { symbol: String, detail: String },

    #[error("backtest run {run_id} not found")]
    RunNotFound { run_id: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipreplayError {
    /// Process exit status for this error family.
    pub fn exit_status(&self) -> u8 {
        match self {
            PipreplayError::Io(_) | PipreplayError::Serialization { .. } => 1,
            PipreplayError::ConfigParse { .. }
            | PipreplayError::ConfigMissing { .. }
            | PipreplayError::ConfigInvalid { .. } => 2,
            PipreplayError::Database { .. } | PipreplayError::DatabaseQuery { .. } => 3,
            PipreplayError::InvalidTrade { .. }
            | PipreplayError::InvalidParams { .. }
            | PipreplayError::UnknownTimeframe { .. }
            | PipreplayError::SetupParse { .. } => 4,
            PipreplayError::NoData { .. } | PipreplayError::RunNotFound { .. } => 5,
        }
    }
}

impl From<&PipreplayError> for std::process::ExitCode {
    fn from(err: &PipreplayError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
