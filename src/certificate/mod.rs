//! Certificate module - validation, templating and PDF rendering of donation certificates.
//!
//! The pipeline is split into small pieces:
//! - `validation` - turns a raw `CertificateRequest` into a `CanonicalCertificate`
//! - `template` - renders the HTML template with server-side formatting filters
//! - `integrity` - optional SHA-256 layout lock checked once at construction
//! - `engine` - `PdfEngine` backends (headless Chrome, wkhtmltopdf)
//! - `generator` - ties the above together behind a render timeout
//! - `store` - the managed output directory
//! - `handlers` - the actix-web facade

pub mod engine;
pub mod format;
pub mod generator;
pub mod handlers;
pub mod integrity;
pub mod model;
pub mod store;
pub mod template;
pub mod validation;

pub use engine::{EngineKind, PdfEngine};
pub use generator::{CertificateGenerator, GeneratorOptions};
pub use model::{CanonicalCertificate, CertificateRequest};
pub use store::{CertificateFile, CertificateStore};
pub use validation::{parse_amount, validate, ValidationError, ValidationErrors};

use std::time::Duration;
use thiserror::Error;

/// Process exit code for invalid input (EX_DATAERR).
pub const EXIT_VALIDATION: i32 = 65;
/// Process exit code for template, engine and layout-lock failures (EX_SOFTWARE).
pub const EXIT_RENDER: i32 = 70;
/// Process exit code for file-system failures (EX_IOERR).
pub const EXIT_IO: i32 = 74;

/// Errors that can occur while producing a certificate.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error("template not found: {0}")]
    TemplateNotFound(String),
    #[error("missing template variable: {0}")]
    MissingVariable(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("failed to read template: {0}")]
    TemplateIo(#[source] std::io::Error),
    #[error(
        "template layout hash mismatch (expected {expected}, actual {actual}); refusing to render"
    )]
    LayoutLockMismatch { expected: String, actual: String },
    #[error("PDF engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("PDF rendering failed: {0}")]
    Render(String),
    #[error("PDF rendering timed out after {}s", .0.as_secs())]
    RenderTimeout(Duration),
    #[error("failed to write PDF: {0}")]
    WritePdf(#[source] std::io::Error),
}

impl CertificateError {
    /// True when the caller supplied bad data, as opposed to an infrastructure failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => EXIT_VALIDATION,
            Self::TemplateIo(_) | Self::WritePdf(_) => EXIT_IO,
            _ => EXIT_RENDER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_kind() {
        let validation = CertificateError::Validation(ValidationErrors::single(
            ValidationError::new("amount", "must be greater than zero"),
        ));
        let render = CertificateError::RenderTimeout(Duration::from_secs(5));
        let io = CertificateError::WritePdf(std::io::Error::other("disk full"));

        assert!(validation.is_validation());
        assert!(!render.is_validation());
        assert_eq!(validation.exit_code(), EXIT_VALIDATION);
        assert_eq!(render.exit_code(), EXIT_RENDER);
        assert_eq!(io.exit_code(), EXIT_IO);
    }

    #[test]
    fn test_timeout_message_mentions_seconds() {
        let err = CertificateError::RenderTimeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "PDF rendering timed out after 60s");
    }
}
