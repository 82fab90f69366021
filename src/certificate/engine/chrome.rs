//! Headless Chrome backend.
//!
//! Launches a fresh browser per document, loads the HTML from a temporary file and
//! prints it once the page, its fonts and the ready selector are all available.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use url::Url;

use super::{PdfEngine, A4_HEIGHT_IN, A4_WIDTH_IN};
use crate::certificate::CertificateError;

const HTML_FILENAME: &str = "certificate.html";

pub struct ChromeEngine {
    executable: PathBuf,
    ready_selector: String,
}

impl ChromeEngine {
    /// Locate the browser executable; `None` searches the usual install locations.
    pub fn new(
        executable: Option<PathBuf>,
        ready_selector: String,
    ) -> Result<Self, CertificateError> {
        let executable = match executable {
            Some(path) => path,
            None => headless_chrome::browser::default_executable()
                .map_err(CertificateError::EngineUnavailable)?,
        };

        if !executable.is_file() {
            return Err(CertificateError::EngineUnavailable(format!(
                "Chrome executable not found at {}",
                executable.display()
            )));
        }

        log::debug!("Chrome executable: {}", executable.display());
        Ok(Self {
            executable,
            ready_selector,
        })
    }
}

fn print_options() -> PrintToPdfOptions {
    PrintToPdfOptions {
        landscape: Some(false),
        display_header_footer: Some(false),
        print_background: Some(true),
        scale: Some(1.0),
        paper_width: Some(A4_WIDTH_IN),
        paper_height: Some(A4_HEIGHT_IN),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        prefer_css_page_size: Some(true),
        ..Default::default()
    }
}

/// Blocking browser session: load, wait for resources, print.
fn print_document(
    executable: &Path,
    html_path: &Path,
    ready_selector: &str,
) -> anyhow::Result<Vec<u8>> {
    let options = LaunchOptions::default_builder()
        .path(Some(executable.to_path_buf()))
        .headless(true)
        .sandbox(false)
        .build()
        .map_err(|e| anyhow!("invalid browser launch options: {}", e))?;

    let browser = Browser::new(options).context("failed to launch Chrome")?;
    let tab = browser.new_tab().context("failed to open tab")?;

    let url = Url::from_file_path(html_path)
        .map_err(|_| anyhow!("cannot build file URL for {}", html_path.display()))?;

    tab.navigate_to(url.as_str())
        .with_context(|| format!("navigation to {} failed", url))?;
    tab.wait_until_navigated()
        .context("page did not finish loading")?;

    // Web fonts resolve after the load event.
    tab.evaluate("document.fonts.ready.then(() => true)", true)
        .context("waiting for fonts failed")?;
    tab.wait_for_element(ready_selector)
        .with_context(|| format!("ready selector '{}' never appeared", ready_selector))?;

    tab.print_to_pdf(Some(print_options()))
        .context("print to PDF failed")
}

#[async_trait]
impl PdfEngine for ChromeEngine {
    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn render_pdf(&self, html: &str, out_path: &Path) -> Result<(), CertificateError> {
        let work_dir = tempdir().map_err(CertificateError::WritePdf)?;
        let html_path = work_dir.path().join(HTML_FILENAME);
        tokio::fs::write(&html_path, html)
            .await
            .map_err(CertificateError::WritePdf)?;

        let executable = self.executable.clone();
        let selector = self.ready_selector.clone();

        let pdf = tokio::task::spawn_blocking(move || {
            // the temp dir must outlive the browser session
            let _work_dir = work_dir;
            print_document(&executable, &html_path, &selector)
        })
        .await
        .map_err(|e| CertificateError::Render(format!("browser task failed: {}", e)))?
        .map_err(|e| CertificateError::Render(format!("{:#}", e)))?;

        tokio::fs::write(out_path, &pdf)
            .await
            .map_err(CertificateError::WritePdf)?;

        log::debug!("Chrome wrote {} bytes to {}", pdf.len(), out_path.display());
        Ok(())
    }
}
