//! Shared application state.

use std::sync::Arc;

use crate::certificate::engine::select_engine;
use crate::certificate::{CertificateError, CertificateGenerator, CertificateStore};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<CertificateGenerator>,
    /// Generated files are written to, listed from and cleaned up in this one directory
    pub store: CertificateStore,
}

impl AppState {
    pub fn new(generator: CertificateGenerator, store: CertificateStore) -> Self {
        Self {
            generator: Arc::new(generator),
            store,
        }
    }

    /// Probe the engine, verify the template lock and open the output directory.
    /// Any failure here must stop the service before it accepts requests.
    pub fn from_config(config: &AppConfig) -> Result<Self, CertificateError> {
        let engine = select_engine(config.engine, &config.engine_options)?;
        let generator = CertificateGenerator::new(config.generator_options(), engine)?;
        let store =
            CertificateStore::new(&config.output_dir).map_err(CertificateError::WritePdf)?;

        log::info!("Output directory: {}", store.root().display());
        Ok(Self::new(generator, store))
    }
}
