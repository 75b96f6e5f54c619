use thiserror::Error;

/// Errors raised at the edges of the stage pipeline.
///
/// The per-frame path itself is total: classification and mapping never fail.
/// Everything here happens either while a track is being decoded or while a
/// variant table is being validated and bound to a scene.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("audio decode failed: {0}")]
    Decode(String),

    #[error("unknown visualization variant '{0}'")]
    UnknownVariant(String),

    #[error("variant '{variant}' references unknown scene object '{object}'")]
    UnknownObject { variant: String, object: String },

    #[error("variant '{0}' uses drop actions but has no drop configuration")]
    MissingDrop(String),

    #[error("invalid analyser configuration: {0}")]
    InvalidAnalyser(String),

    #[error("invalid variant '{variant}': {reason}")]
    InvalidVariant { variant: String, reason: String },
}

pub type StageResult<T> = std::result::Result<T, StageError>;
