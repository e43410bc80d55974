use thiserror::Error;

/// Top-level error type for the binary. Every subsystem raises its own
/// typed error; this only adds the exit-code mapping the CLI needs.
#[derive(Debug, Error)]
pub enum PromptQaError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("planner failed: {0}")]
    Planner(String),

    #[error(transparent)]
    Driver(#[from] promptqa_driver::DriverError),

    #[error(transparent)]
    Schema(#[from] promptqa_schema::SchemaError),

    #[error("llm transport error: {0}")]
    Llm(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PromptQaError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn planner(message: impl Into<String>) -> Self {
        Self::Planner(message.into())
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Maps an unexpected (non-verdict) error to the CLI's exit code. Verdict
    /// exit codes (0/1/2) never flow through this path; they come from
    /// [`crate::report::exit_code_for_verdict`].
    pub fn exit_code(&self) -> i32 {
        match self {
            PromptQaError::Planner(_) => 3,
            _ => 4,
        }
    }
}
