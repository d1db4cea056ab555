//! Core error type for gha-doc.
//!
//! `DocError` is used throughout the core (ingestion, call graph, enhancer,
//! rendering, pipeline). Recoverable conditions such as dependency cycles or
//! unreachable remote workflows are logged instead and never surface here.

#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Failed to parse workflow '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Enhancement error: {0}")]
    Enhancement(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("No workflow files found matching pattern: {0}")]
    NoWorkflowFiles(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DocError {
    pub fn parse(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        DocError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for DocError {
    fn from(e: std::io::Error) -> Self {
        DocError::Io(e.to_string())
    }
}

impl From<minijinja::Error> for DocError {
    fn from(e: minijinja::Error) -> Self {
        DocError::Render(e.to_string())
    }
}
