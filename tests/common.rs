#![allow(dead_code)]

use actix_web::web;
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use donation_certificate_server::certificate::{
    CertificateError, CertificateGenerator, CertificateStore, GeneratorOptions, PdfEngine,
};
use donation_certificate_server::config::default_template_dir;
use donation_certificate_server::AppState;

pub const PDF_HEADER: &str = "%PDF-1.4\n";

/// Test engine that "prints" by writing a PDF header followed by the rendered HTML,
/// so assertions can look at the text that would appear on the page.
pub struct EchoPdfEngine;

#[async_trait]
impl PdfEngine for EchoPdfEngine {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn render_pdf(&self, html: &str, out_path: &Path) -> Result<(), CertificateError> {
        let mut bytes = PDF_HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(html.as_bytes());
        tokio::fs::write(out_path, bytes)
            .await
            .map_err(CertificateError::WritePdf)
    }
}

/// Test engine that always fails like a crashed browser.
pub struct FailingPdfEngine;

#[async_trait]
impl PdfEngine for FailingPdfEngine {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn render_pdf(&self, _html: &str, _out_path: &Path) -> Result<(), CertificateError> {
        Err(CertificateError::Render("navigation failed".to_string()))
    }
}

/// App state over the shipped template and a temporary output directory.
pub struct TestContext {
    pub state: web::Data<AppState>,
    pub output: TempDir,
}

impl TestContext {
    pub fn output_path(&self, filename: &str) -> std::path::PathBuf {
        self.output.path().join(filename)
    }

    /// Drop a PDF into the output directory with a back-dated modification time.
    pub fn write_aged_pdf(&self, filename: &str, age: Duration) {
        let path = self.output_path(filename);
        fs::write(&path, PDF_HEADER).unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    pub fn pdf_count(&self) -> usize {
        fs::read_dir(self.output.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "pdf"))
            .count()
    }
}

pub fn setup_with_engine(engine: Arc<dyn PdfEngine>) -> TestContext {
    let output = tempfile::tempdir().unwrap();
    let generator =
        CertificateGenerator::new(GeneratorOptions::new(default_template_dir()), engine).unwrap();
    let store = CertificateStore::new(output.path()).unwrap();

    TestContext {
        state: web::Data::new(AppState::new(generator, store)),
        output,
    }
}

pub fn setup() -> TestContext {
    setup_with_engine(Arc::new(EchoPdfEngine))
}
