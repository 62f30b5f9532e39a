use std::path::PathBuf;
use thiserror::Error;

pub type StudioResult<T> = Result<T, StudioError>;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("corrupt data in {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("scene index {index} out of range (scene count {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no save path set for {0}")]
    MissingPath(&'static str),

    #[error("unknown scene field: {0}")]
    UnknownField(String),

    #[error("video has no narration text")]
    MissingText,

    #[error("{stage} did not complete: {reason}")]
    StageIncomplete { stage: &'static str, reason: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StudioError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn incomplete(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::StageIncomplete {
            stage,
            reason: reason.into(),
        }
    }

    /// Errors caused by the caller rather than by disk state.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StudioError::IndexOutOfRange { .. }
                | StudioError::UnknownField(_)
                | StudioError::MissingText
        )
    }
}
