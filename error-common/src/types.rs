use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codes;
use crate::context::ErrorContext;

/// Category of a failure crossing the engine boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed request: bad age, gender, oversized text, unparseable shape
    InvalidInput,
    /// Reference data failed to load or validate at start-up
    KnowledgeBaseUnavailable,
    /// The image classification interface failed or returned malformed output
    ImageAnalysisError,
    /// The image classification call exceeded its deadline
    TimeoutError,
    /// Engine configuration is inconsistent
    ConfigurationError,
    /// Logic or reference-data defect in the pure scoring path
    InternalError,
}

impl ErrorKind {
    /// Stable error code reported alongside the kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => codes::validation::INVALID_INPUT,
            ErrorKind::KnowledgeBaseUnavailable => codes::knowledge_base::UNAVAILABLE,
            ErrorKind::ImageAnalysisError => codes::imaging::ANALYSIS_FAILED,
            ErrorKind::TimeoutError => codes::imaging::TIMEOUT,
            ErrorKind::ConfigurationError => codes::configuration::INVALID,
            ErrorKind::InternalError => codes::internal::UNEXPECTED,
        }
    }

    /// Whether a request hitting this kind can still produce a partial result
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::ImageAnalysisError | ErrorKind::TimeoutError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::KnowledgeBaseUnavailable => "KnowledgeBaseUnavailable",
            ErrorKind::ImageAnalysisError => "ImageAnalysisError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::InternalError => "InternalError",
        };
        f.write_str(name)
    }
}

/// Failure payload returned across the request/response boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub context: ErrorContext,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error_kind: kind,
            code: kind.code().to_string(),
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }
}

/// Implemented by crate-local error enums so they can be reported uniformly
pub trait ClassifiedError: std::error::Error {
    fn kind(&self) -> ErrorKind;

    fn context(&self) -> ErrorContext {
        ErrorContext::new()
    }

    fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.kind(), self.to_string()).with_context(self.context())
    }
}

/// Log a classified error with its kind and code as structured fields
pub fn log_error<E: ClassifiedError>(context: &str, error: &E) {
    let kind = error.kind();
    if kind.is_recoverable() {
        tracing::warn!(
            context = context,
            error_kind = %kind,
            error_code = kind.code(),
            error = %error,
            "Recoverable engine error"
        );
    } else {
        tracing::error!(
            context = context,
            error_kind = %kind,
            error_code = kind.code(),
            error = %error,
            "Engine error occurred"
        );
    }
}
