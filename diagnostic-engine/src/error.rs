use error_common::{ClassifiedError, ErrorContext, ErrorKind};
use thiserror::Error;
use uuid::Uuid;

use crate::types::Modality;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Knowledge base unavailable: {0}")]
    KnowledgeBaseUnavailable(String),

    #[error("Image analysis failed for {modality}: {cause}")]
    ImageAnalysis { modality: Modality, cause: String },

    #[error("Image analysis for {modality} timed out after {elapsed_ms} ms")]
    Timeout { modality: Modality, elapsed_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Failure raised while serving a request; keeps the request id for the response
    #[error("{error}")]
    InRequest { request_id: Uuid, error: Box<EngineError> },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Attach the id of the request being served, once
    pub fn in_request(self, request_id: Uuid) -> Self {
        match self {
            scoped @ EngineError::InRequest { .. } => scoped,
            error => EngineError::InRequest {
                request_id,
                error: Box::new(error),
            },
        }
    }

    /// The underlying failure, without request scoping
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::InRequest { error, .. } => error.root(),
            other => other,
        }
    }
}

impl ClassifiedError for EngineError {
    fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidInput { .. } => ErrorKind::InvalidInput,
            EngineError::KnowledgeBaseUnavailable(_) => ErrorKind::KnowledgeBaseUnavailable,
            EngineError::ImageAnalysis { .. } => ErrorKind::ImageAnalysisError,
            EngineError::Timeout { .. } => ErrorKind::TimeoutError,
            EngineError::Config(_) => ErrorKind::ConfigurationError,
            EngineError::Internal(_) => ErrorKind::InternalError,
            EngineError::InRequest { error, .. } => error.kind(),
        }
    }

    fn context(&self) -> ErrorContext {
        match self {
            EngineError::InvalidInput { field, .. } => {
                ErrorContext::new().add_context("field", field.as_str())
            }
            EngineError::ImageAnalysis { modality, .. } => {
                ErrorContext::new().with_modality(modality.as_str())
            }
            EngineError::Timeout { modality, elapsed_ms } => ErrorContext::new()
                .with_modality(modality.as_str())
                .add_context("elapsed_ms", elapsed_ms.to_string()),
            EngineError::InRequest { request_id, error } => {
                error.context().with_request_id(request_id.to_string())
            }
            _ => ErrorContext::new(),
        }
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(e: serde_yaml::Error) -> Self {
        EngineError::KnowledgeBaseUnavailable(format!("unreadable knowledge base: {}", e))
    }
}
