use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] sarflood::Error),
}

impl AppError {
    pub fn missing(arg: &str) -> Self {
        AppError::MissingArgument {
            arg: format!("--{arg}"),
        }
    }
}
