//! wkhtmltopdf backend.
//!
//! Handles writing the HTML to a temporary directory and invoking the CLI, which
//! writes the PDF straight to the output path.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::tempdir;
use tokio::process::Command;

use super::PdfEngine;
use crate::certificate::CertificateError;

const HTML_FILENAME: &str = "certificate.html";

/// A4, zero margins, 1:1 scale, backgrounds on.
const PRINT_ARGS: &[&str] = &[
    "--quiet",
    "--page-size",
    "A4",
    "--margin-top",
    "0",
    "--margin-right",
    "0",
    "--margin-bottom",
    "0",
    "--margin-left",
    "0",
    "--zoom",
    "1.0",
    "--disable-smart-shrinking",
    "--background",
    "--print-media-type",
    "--enable-local-file-access",
    "--load-error-handling",
    "abort",
];

pub struct WkhtmltopdfEngine {
    program: PathBuf,
}

impl WkhtmltopdfEngine {
    /// Check that the CLI runs; `None` looks `wkhtmltopdf` up on `PATH`.
    pub fn new(program: Option<PathBuf>) -> Result<Self, CertificateError> {
        let program = program.unwrap_or_else(|| PathBuf::from("wkhtmltopdf"));

        let status = std::process::Command::new(&program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                CertificateError::EngineUnavailable(format!(
                    "cannot run {}: {}",
                    program.display(),
                    e
                ))
            })?;

        if !status.success() {
            return Err(CertificateError::EngineUnavailable(format!(
                "{} --version exited with status {}",
                program.display(),
                status.code().unwrap_or(-1)
            )));
        }

        Ok(Self { program })
    }
}

#[async_trait]
impl PdfEngine for WkhtmltopdfEngine {
    fn name(&self) -> &'static str {
        "wkhtmltopdf"
    }

    async fn render_pdf(&self, html: &str, out_path: &Path) -> Result<(), CertificateError> {
        let temp_dir = tempdir().map_err(CertificateError::WritePdf)?;
        let html_path = temp_dir.path().join(HTML_FILENAME);
        tokio::fs::write(&html_path, html)
            .await
            .map_err(CertificateError::WritePdf)?;

        let output = Command::new(&self.program)
            .args(PRINT_ARGS)
            .arg(&html_path)
            .arg(out_path)
            .current_dir(temp_dir.path())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CertificateError::Render(format!("wkhtmltopdf failed to start: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CertificateError::Render(format!(
                "wkhtmltopdf exited with status {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(())
    }
}
