//! PDF engines.
//!
//! Every backend implements `PdfEngine`, so the generator never depends on a specific
//! browser or print tool. The backend is picked once from configuration.

mod chrome;
mod wkhtmltopdf;

pub use chrome::ChromeEngine;
pub use wkhtmltopdf::WkhtmltopdfEngine;

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use super::CertificateError;

/// A4 portrait in inches, as the print APIs expect.
pub const A4_WIDTH_IN: f64 = 8.27;
pub const A4_HEIGHT_IN: f64 = 11.69;

/// Element that must exist before the page is printed.
pub const DEFAULT_READY_SELECTOR: &str = "#donor-name";

/// Converts a complete HTML document into an A4 PDF file.
#[async_trait]
pub trait PdfEngine: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Render `html` and write the PDF to `out_path`.
    async fn render_pdf(&self, html: &str, out_path: &Path) -> Result<(), CertificateError>;
}

/// Available engine backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    #[default]
    Chrome,
    Wkhtmltopdf,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Self::Chrome),
            "wkhtmltopdf" => Ok(Self::Wkhtmltopdf),
            other => Err(format!(
                "unknown PDF engine '{}', expected 'chrome' or 'wkhtmltopdf'",
                other
            )),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chrome => write!(f, "chrome"),
            Self::Wkhtmltopdf => write!(f, "wkhtmltopdf"),
        }
    }
}

/// Backend-specific settings.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub chrome_path: Option<PathBuf>,
    pub wkhtmltopdf_path: Option<PathBuf>,
    pub ready_selector: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            wkhtmltopdf_path: None,
            ready_selector: DEFAULT_READY_SELECTOR.to_string(),
        }
    }
}

/// Build the configured engine, failing if its executable cannot be found.
pub fn select_engine(
    kind: EngineKind,
    options: &EngineOptions,
) -> Result<Arc<dyn PdfEngine>, CertificateError> {
    let engine: Arc<dyn PdfEngine> = match kind {
        EngineKind::Chrome => Arc::new(ChromeEngine::new(
            options.chrome_path.clone(),
            options.ready_selector.clone(),
        )?),
        EngineKind::Wkhtmltopdf => {
            Arc::new(WkhtmltopdfEngine::new(options.wkhtmltopdf_path.clone())?)
        }
    };
    log::info!("Using PDF engine: {}", engine.name());
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parsing() {
        assert_eq!("chrome".parse::<EngineKind>(), Ok(EngineKind::Chrome));
        assert_eq!(" Chromium ".parse::<EngineKind>(), Ok(EngineKind::Chrome));
        assert_eq!("WKHTMLTOPDF".parse::<EngineKind>(), Ok(EngineKind::Wkhtmltopdf));
        assert!("weasyprint".parse::<EngineKind>().is_err());
        assert_eq!(EngineKind::default().to_string(), "chrome");
    }

    #[test]
    fn test_missing_executable_is_unavailable() {
        let options = EngineOptions {
            chrome_path: Some(PathBuf::from("/nonexistent/chrome")),
            wkhtmltopdf_path: Some(PathBuf::from("/nonexistent/wkhtmltopdf")),
            ..EngineOptions::default()
        };

        for kind in [EngineKind::Chrome, EngineKind::Wkhtmltopdf] {
            match select_engine(kind, &options) {
                Err(CertificateError::EngineUnavailable(_)) => {}
                Err(other) => panic!("unexpected error for {kind}: {other:?}"),
                Ok(_) => panic!("engine {kind} should be unavailable"),
            }
        }
    }
}
