use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Upstream source error ({context}): {message}")]
    Source { context: String, message: String },

    #[error("Account '{account_id}' has no launch date")]
    MissingLaunchDate { account_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn source(context: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Source {
            context: context.into(),
            message: message.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
