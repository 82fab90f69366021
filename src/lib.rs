use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod certificate;
pub mod config;
pub mod state;

pub use crate::config::AppConfig;
pub use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable reason, naming the offending field where there is one
    pub error: String,
    pub kind: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(kind: &str, message: &str) -> Self {
        Self {
            error: message.to_string(),
            kind: kind.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::certificate::handlers::health,
        crate::certificate::handlers::generate_certificate,
        crate::certificate::handlers::download_certificate,
        crate::certificate::handlers::list_certificates,
        crate::certificate::handlers::cleanup_certificates,
    ),
    components(
        schemas(
            certificate::handlers::HealthResponse,
            certificate::handlers::GenerateCertificateRequest,
            certificate::handlers::GenerateCertificateResponse,
            certificate::handlers::ListCertificatesResponse,
            certificate::handlers::CleanupRequest,
            certificate::handlers::CleanupResponse,
            certificate::store::CertificateFile,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Certificate Service", description = "Donation certificate generation and file management.")
    )
)]
pub struct ApiDoc;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

pub async fn run() -> std::io::Result<()> {
    init_logging();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Engine probe and template lock run here, before the server binds.
    let app_state = match AppState::from_config(&config) {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to initialise certificate generator: {}", e);
            std::process::exit(1);
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("donation_certificate_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::other(format!("failed to build metrics middleware: {}", e)))?;

    log::info!(
        "Starting certificate service at http://{}:{}",
        config.host,
        config.port
    );
    log::info!(
        "Template: {}",
        config.template_dir.join(&config.template_name).display()
    );

    let allowed_origins = config.allowed_origins.clone();

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .configure(certificate::handlers::config)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
