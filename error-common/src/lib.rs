//! Common error handling utilities for CareSense
//!
//! Every crate in the workspace reports failures through the same small
//! vocabulary so callers of the inference engine see one failure shape:
//!
//! - **ErrorKind**: the category a failure belongs to
//! - **Error codes**: stable string codes per kind
//! - **ErrorContext**: request id, modality and free key/value details
//! - **ErrorResponse**: the `{errorKind, message, context}` wire payload
//!
//! # Example
//!
//! ```rust
//! use error_common::{ErrorContext, ErrorKind, ErrorResponse};
//!
//! let response = ErrorResponse::new(ErrorKind::InvalidInput, "age must be at most 150")
//!     .with_context(ErrorContext::new().add_context("field", "age"));
//!
//! assert_eq!(response.error_kind, ErrorKind::InvalidInput);
//! assert_eq!(response.code, "VALIDATION_1001");
//! ```

pub mod types;
pub mod context;
pub mod codes;

pub use types::*;
pub use context::*;
