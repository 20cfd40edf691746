use thiserror::Error;

/// Why a script fragment produced no chart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SandboxError {
    #[error("'{0}' is not available inside the chart sandbox")]
    Forbidden(String),

    #[error("Unexpected input at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Canvas element '{0}' does not exist")]
    MissingTarget(String),

    #[error("Chart configuration could not be read")]
    InvalidConfig,

    #[error("Chart engine could not draw: {0}")]
    Draw(String),

    #[error("Script did not create a chart")]
    NoChart,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("Chart engine failed to load: {0}")]
    EngineLoad(String),

    #[error("Chart engine could not draw the chart: {0}")]
    Draw(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

pub type Result<T> = std::result::Result<T, ChartError>;
