//! CLI-specific error types and exit code mapping

use incident_timeline_core::error::TimelineError;
use incident_timeline_engine::EngineError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The log input could not be turned into a timeline.
    #[error("input error: {0}")]
    Input(String),

    /// `build --fail-on-findings` and at least one rule fired.
    #[error("{0} rule finding(s) detected")]
    FindingsDetected(usize),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from incident-timeline-core.
    #[error("{0}")]
    Core(#[from] TimelineError),

    /// Rule loading or validation error.
    #[error("rule error: {0}")]
    Rule(String),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                          |
    /// |------|--------------------------------------------------|
    /// | 0    | Success                                          |
    /// | 1    | General / command / rule error                   |
    /// | 2    | Configuration error                              |
    /// | 3    | Input error (missing, unreadable, malformed, limits) |
    /// | 4    | `--fail-on-findings` and a rule fired            |
    /// | 10   | IO error                                         |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Input(_) => 3,
            Self::FindingsDetected(_) => 4,
            Self::Io(_) => 10,
            Self::Core(TimelineError::Config(_)) => 2,
            Self::Core(TimelineError::Ingest(_)) => 3,
            Self::Core(TimelineError::Io(_)) => 10,
            Self::Core(TimelineError::Rule(_))
            | Self::JsonSerialize(_)
            | Self::Command(_)
            | Self::Rule(_) => 1,
        }
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        if e.is_input_error() {
            return Self::Input(e.to_string());
        }
        match e {
            EngineError::RuleLoad { .. } | EngineError::RuleValidation { .. } => {
                Self::Rule(e.to_string())
            }
            EngineError::Config { .. } => Self::Config(e.to_string()),
            EngineError::Io(io) => Self::Io(io),
            other => Self::Command(other.to_string()),
        }
    }
}
