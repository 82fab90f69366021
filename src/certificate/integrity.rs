//! Template layout lock.
//!
//! Pins the template file to a known SHA-256 so a silently edited template can never
//! reach a printed certificate. The check runs once, when the generator is built, over
//! the same bytes the generator then renders from.

use sha2::{Digest, Sha256};
use std::path::Path;

use super::CertificateError;

/// Expected SHA-256 of a template file, as a hex string.
#[derive(Debug, Clone)]
pub struct TemplateLock {
    expected: String,
}

impl TemplateLock {
    pub fn new(expected_sha256: impl Into<String>) -> Self {
        Self {
            expected: expected_sha256.into().trim().to_ascii_lowercase(),
        }
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Hash the template contents read from `path` and fail if they differ from the
    /// expected digest.
    pub fn verify(&self, path: &Path, contents: &[u8]) -> Result<(), CertificateError> {
        let actual = sha256_hex(contents);

        if actual != self.expected {
            log::error!(
                "Template {} does not match the configured layout lock",
                path.display()
            );
            return Err(CertificateError::LayoutLockMismatch {
                expected: self.expected.clone(),
                actual,
            });
        }

        log::info!("Template layout lock verified for {}", path.display());
        Ok(())
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
