use thiserror::Error;

use crate::embedding::Embedding;
use crate::errors::AppError;

/// Typed failure contract for the external feature extractor. The pipeline
/// maps these over a fixed table; it never inspects extractor error text.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no face detected in sample")]
    NoFace,

    #[error("found {count} faces; exactly one face required")]
    MultipleFaces { count: usize },

    #[error("failed to decode sample: {0}")]
    Decode(String),

    #[error("extractor fault: {0}")]
    Backend(String),
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::NoFace => AppError::NoFaceDetected,
            ExtractError::MultipleFaces { count } => AppError::MultipleFaces { count },
            ExtractError::Decode(message) => AppError::InvalidPayload { message },
            ExtractError::Backend(message) => AppError::Internal(message),
        }
    }
}

/// External collaborator producing exactly one fixed-length embedding per
/// sample, or a typed failure. Implementations may block for a long time;
/// the pipeline always invokes them under the bounded executor.
pub trait EmbeddingExtractor: Send + Sync {
    fn extract(&self, sample: &[u8]) -> Result<Embedding, ExtractError>;
}
