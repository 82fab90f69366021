//! Certificate generator.
//!
//! Validates the request, renders the HTML template with server-side formatting and
//! hands the document to the configured `PdfEngine` under a timeout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::engine::PdfEngine;
use super::integrity::TemplateLock;
use super::model::{CanonicalCertificate, CertificateRequest};
use super::template::TemplateRenderer;
use super::validation::validate;
use super::CertificateError;

pub const DEFAULT_TEMPLATE_NAME: &str = "certificate_template.html";
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Template location, layout lock and timeout for a generator.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub template_dir: PathBuf,
    pub template_name: String,
    /// Lock the layout to this SHA-256 of the template file
    pub expected_template_sha256: Option<String>,
    pub render_timeout: Duration,
}

impl GeneratorOptions {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            template_name: DEFAULT_TEMPLATE_NAME.to_string(),
            expected_template_sha256: None,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.template_dir.join(&self.template_name)
    }
}

/// Renders locked-layout certificate PDFs from an HTML template.
pub struct CertificateGenerator {
    renderer: TemplateRenderer,
    engine: Arc<dyn PdfEngine>,
    template_name: String,
    render_timeout: Duration,
}

impl CertificateGenerator {
    /// Build a generator. The template is read once here; when a layout lock is
    /// configured those bytes are hashed and a mismatch fails construction. Rendering
    /// always uses the bytes that were checked, never a later copy of the file.
    pub fn new(
        options: GeneratorOptions,
        engine: Arc<dyn PdfEngine>,
    ) -> Result<Self, CertificateError> {
        let template_path = options.template_path();

        let contents = fs::read(&template_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                CertificateError::TemplateNotFound(template_path.display().to_string())
            }
            _ => CertificateError::TemplateIo(e),
        })?;

        if let Some(expected) = options
            .expected_template_sha256
            .as_deref()
            .filter(|expected| !expected.trim().is_empty())
        {
            TemplateLock::new(expected).verify(&template_path, &contents)?;
        }

        let source = String::from_utf8(contents).map_err(|e| {
            CertificateError::Template(format!(
                "{} is not valid UTF-8: {}",
                template_path.display(),
                e
            ))
        })?;
        let renderer = TemplateRenderer::from_sources(&[(&options.template_name, &source)])?;

        log::info!(
            "Certificate generator ready (template: {}, engine: {}, timeout: {}s)",
            template_path.display(),
            engine.name(),
            options.render_timeout.as_secs()
        );

        Ok(Self {
            renderer,
            engine,
            template_name: options.template_name,
            render_timeout: options.render_timeout,
        })
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Render the HTML document for an already validated certificate.
    pub fn render_html(&self, certificate: &CanonicalCertificate) -> Result<String, CertificateError> {
        self.renderer
            .render(&self.template_name, certificate.to_context())
    }

    /// Render a validated certificate to `out_path`.
    pub async fn render_to(
        &self,
        certificate: &CanonicalCertificate,
        out_path: &Path,
    ) -> Result<PathBuf, CertificateError> {
        let html = self.render_html(certificate)?;

        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(CertificateError::WritePdf)?;
            }
        }

        log::debug!(
            "Rendering certificate {} with {}",
            certificate.donation_id(),
            self.engine.name()
        );

        match tokio::time::timeout(self.render_timeout, self.engine.render_pdf(&html, out_path))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                // a failed engine may have left a truncated file
                let _ = tokio::fs::remove_file(out_path).await;
                return Err(e);
            }
            Err(_) => {
                log::error!(
                    "Rendering certificate {} exceeded {}s",
                    certificate.donation_id(),
                    self.render_timeout.as_secs()
                );
                // do not leave a truncated file behind
                let _ = tokio::fs::remove_file(out_path).await;
                return Err(CertificateError::RenderTimeout(self.render_timeout));
            }
        }

        Ok(out_path.to_path_buf())
    }

    /// Validate `request` and render it to `out_path`.
    pub async fn generate(
        &self,
        request: &CertificateRequest,
        out_path: &Path,
    ) -> Result<PathBuf, CertificateError> {
        let certificate = validate(request)?;
        self.render_to(&certificate, out_path).await
    }
}
