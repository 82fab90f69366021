use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{error, web, HttpRequest, HttpResponse, Responder};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, SystemTime};
use utoipa::ToSchema;

use crate::certificate::model::{
    CertificateRequest, DEFAULT_ORG_NAME, DEFAULT_ORG_SUBTITLE, DEFAULT_REASON_TEXT,
};
use crate::certificate::store::CertificateFile;
use crate::certificate::validation::{parse_amount, validate, ValidationError, ValidationErrors};
use crate::{AppState, ErrorResponse};

pub const SERVICE_NAME: &str = "certificate-generator";
pub const DEFAULT_MAX_AGE_HOURS: f64 = 24.0;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "certificate-generator")]
    pub service: String,
}

/// Body of `POST /generate`. Required fields are optional here so their absence can be
/// reported by name before any value is checked.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GenerateCertificateRequest {
    #[schema(example = "Asha Rao")]
    pub donor_name: Option<String>,
    /// Decimal amount in INR, as a string or a number
    #[schema(value_type = Option<String>, example = "1500.00")]
    pub amount: Option<Value>,
    #[schema(example = "D-100")]
    pub donation_id: Option<String>,
    #[schema(example = "2024-01-15")]
    pub donation_date: Option<String>,
    #[schema(example = "Razorpay")]
    pub payment_mode: Option<String>,
    pub org_name: Option<String>,
    pub org_subtitle: Option<String>,
    pub reason_text: Option<String>,
    pub show_80g_note: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub extra_meta: Option<Map<String, Value>>,
}

#[derive(Debug)]
pub enum RequestError {
    MissingField(&'static str),
    Invalid(ValidationErrors),
}

impl GenerateCertificateRequest {
    pub const REQUIRED_FIELDS: [&'static str; 4] =
        ["donor_name", "amount", "donation_id", "donation_date"];

    /// First required field that is absent or null.
    pub fn missing_field(&self) -> Option<&'static str> {
        let present = [
            self.donor_name.is_some(),
            self.amount.is_some(),
            self.donation_id.is_some(),
            self.donation_date.is_some(),
        ];
        Self::REQUIRED_FIELDS
            .iter()
            .zip(present)
            .find(|(_, is_present)| !is_present)
            .map(|(field, _)| *field)
    }

    /// Check presence, parse typed values and fill defaults.
    pub fn into_certificate_request(self) -> Result<CertificateRequest, RequestError> {
        if let Some(field) = self.missing_field() {
            return Err(RequestError::MissingField(field));
        }

        let mut errors = ValidationErrors::new();
        let amount = self.amount.as_ref().and_then(|value| {
            amount_from_json(value).map_err(|e| errors.add(e)).ok()
        });
        let donation_date = self.donation_date.as_deref().and_then(|value| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map_err(|_| errors.add(ValidationError::invalid_date_format(value)))
                .ok()
        });

        let (Some(amount), Some(donation_date)) = (amount, donation_date) else {
            return Err(RequestError::Invalid(errors));
        };

        let mut request = CertificateRequest::new(
            self.donor_name.unwrap_or_default(),
            amount,
            self.donation_id.unwrap_or_default(),
            donation_date,
        );
        request.payment_mode = self.payment_mode;
        request.org_name = self.org_name.unwrap_or_else(|| DEFAULT_ORG_NAME.to_string());
        request.org_subtitle = self
            .org_subtitle
            .unwrap_or_else(|| DEFAULT_ORG_SUBTITLE.to_string());
        request.reason_text = self
            .reason_text
            .unwrap_or_else(|| DEFAULT_REASON_TEXT.to_string());
        request.show_80g_note = self.show_80g_note.unwrap_or(true);
        request.extra_meta = self.extra_meta.unwrap_or_default();
        Ok(request)
    }
}

/// Amounts arrive as JSON strings or numbers.
fn amount_from_json(value: &Value) -> Result<Decimal, ValidationError> {
    match value {
        Value::String(s) => parse_amount(s),
        Value::Number(n) => parse_amount(&n.to_string()),
        other => Err(ValidationError::invalid_amount(&other.to_string())),
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct GenerateCertificateResponse {
    pub success: bool,
    #[schema(example = "certificate_D-100_20240115_093000.pdf")]
    pub filename: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ListCertificatesResponse {
    pub certificates: Vec<CertificateFile>,
    pub total: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CleanupRequest {
    /// Delete certificates older than this many hours
    #[serde(default = "default_max_age_hours")]
    #[schema(example = 24)]
    pub max_age_hours: f64,
}

fn default_max_age_hours() -> f64 {
    DEFAULT_MAX_AGE_HOURS
}

impl Default for CleanupRequest {
    fn default() -> Self {
        Self {
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    pub success: bool,
    pub deleted_count: usize,
    pub message: String,
}

fn validation_failed(errors: &ValidationErrors) -> HttpResponse {
    warn!("Certificate request rejected: {}", errors);
    HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!(
        "Validation error: {}",
        errors
    )))
}

#[utoipa::path(
    tag = "Certificate Service",
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

#[utoipa::path(
    tag = "Certificate Service",
    post,
    path = "/generate",
    request_body = GenerateCertificateRequest,
    responses(
        (status = 200, description = "Certificate generated", body = GenerateCertificateResponse),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 500, description = "Rendering or storage failure", body = ErrorResponse)
    )
)]
pub async fn generate_certificate(
    data: web::Data<AppState>,
    body: web::Json<GenerateCertificateRequest>,
) -> impl Responder {
    info!("Executing generate_certificate handler");

    let request = match body.into_inner().into_certificate_request() {
        Ok(request) => request,
        Err(RequestError::MissingField(field)) => {
            warn!("Certificate request missing field '{}'", field);
            return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!(
                "Missing required field: {}",
                field
            )));
        }
        Err(RequestError::Invalid(errors)) => return validation_failed(&errors),
    };

    let certificate = match validate(&request) {
        Ok(certificate) => certificate,
        Err(errors) => return validation_failed(&errors),
    };

    let store = data.store.clone();
    let donation_id = certificate.donation_id().to_string();
    let (filename, path) = match web::block(move || store.allocate(&donation_id)).await {
        Ok(Ok(reserved)) => reserved,
        Ok(Err(e)) => {
            error!("Failed to reserve certificate file: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse::internal_error(
                &format!("Internal server error: {}", e),
            ));
        }
        Err(e) => {
            error!("Reserve task failed: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse::internal_error(
                &format!("Internal server error: {}", e),
            ));
        }
    };
    debug!("Rendering certificate to {}", path.display());

    let result = data.generator.render_to(&certificate, &path).await;
    if result.is_err() {
        data.store.discard(&path);
    }

    match result {
        Ok(_) => {
            info!("Certificate {} generated", filename);
            HttpResponse::Ok().json(GenerateCertificateResponse {
                success: true,
                filename,
                message: "Certificate generated successfully".to_string(),
            })
        }
        Err(e) if e.is_validation() => {
            HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!(
                "Validation error: {}",
                e
            )))
        }
        Err(e) => {
            error!("Failed to generate certificate {}: {}", filename, e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&format!(
                "Internal server error: {}",
                e
            )))
        }
    }
}

#[utoipa::path(
    tag = "Certificate Service",
    get,
    path = "/download/{filename}",
    params(
        ("filename" = String, Path, description = "Name of a generated certificate")
    ),
    responses(
        (status = 200, description = "Certificate PDF sent as an attachment"),
        (status = 404, description = "Certificate not found", body = ErrorResponse)
    )
)]
pub async fn download_certificate(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let filename = path.into_inner();
    info!("Executing download_certificate handler for {}", filename);

    let Some(file_path) = data.store.resolve(&filename) else {
        warn!("Certificate not found: {}", filename);
        return HttpResponse::NotFound().json(ErrorResponse::not_found("Certificate not found"));
    };

    match NamedFile::open_async(&file_path).await {
        Ok(file) => file
            .set_content_disposition(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(filename)],
            })
            .into_response(&req),
        Err(e) => {
            error!("Failed to open {}: {}", file_path.display(), e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&format!(
                "Download error: {}",
                e
            )))
        }
    }
}

#[utoipa::path(
    tag = "Certificate Service",
    get,
    path = "/certificates",
    responses(
        (status = 200, description = "Generated certificates, newest first", body = ListCertificatesResponse),
        (status = 500, description = "Output directory could not be read", body = ErrorResponse)
    )
)]
pub async fn list_certificates(data: web::Data<AppState>) -> impl Responder {
    info!("Executing list_certificates handler");
    let store = data.store.clone();

    match web::block(move || store.list()).await {
        Ok(Ok(certificates)) => HttpResponse::Ok().json(ListCertificatesResponse {
            total: certificates.len(),
            certificates,
        }),
        Ok(Err(e)) => {
            error!("Failed to list certificates: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&format!("List error: {}", e)))
        }
        Err(e) => {
            error!("List task failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&format!("List error: {}", e)))
        }
    }
}

#[utoipa::path(
    tag = "Certificate Service",
    post,
    path = "/cleanup",
    request_body(content = CleanupRequest, description = "Optional; max_age_hours defaults to 24"),
    responses(
        (status = 200, description = "Expired certificates deleted", body = CleanupResponse),
        (status = 400, description = "Invalid max_age_hours", body = ErrorResponse),
        (status = 500, description = "Output directory could not be cleaned", body = ErrorResponse)
    )
)]
pub async fn cleanup_certificates(data: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    // Only an empty body falls back to the default; anything else must parse.
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CleanupRequest::default()
    } else {
        match serde_json::from_slice::<CleanupRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected cleanup body: {}", e);
                return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!(
                    "Invalid JSON body: {}",
                    e
                )));
            }
        }
    };
    let max_age_hours = request.max_age_hours;
    info!(
        "Executing cleanup_certificates handler (max_age_hours = {})",
        max_age_hours
    );

    let Some(max_age) = max_age_from_hours(max_age_hours) else {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request(
            "max_age_hours must be a non-negative number",
        ));
    };

    let store = data.store.clone();

    match web::block(move || store.cleanup(max_age, SystemTime::now())).await {
        Ok(Ok(deleted_count)) => {
            info!("Cleaned up {} old certificates", deleted_count);
            HttpResponse::Ok().json(CleanupResponse {
                success: true,
                deleted_count,
                message: format!("Cleaned up {} old certificates", deleted_count),
            })
        }
        Ok(Err(e)) => {
            error!("Cleanup failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&format!("Cleanup error: {}", e)))
        }
        Err(e) => {
            error!("Cleanup task failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&format!("Cleanup error: {}", e)))
        }
    }
}

/// Age threshold for cleanup. Ages too large for a `Duration` saturate, which keeps
/// every file.
fn max_age_from_hours(hours: f64) -> Option<Duration> {
    if !hours.is_finite() || hours < 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(hours * 3600.0).unwrap_or(Duration::MAX))
}

/// Malformed JSON bodies get the same error shape as every other 400.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response =
            HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!(
                "Invalid JSON body: {}",
                err
            )));
        error::InternalError::from_response(err, response).into()
    })
}

/// Configure certificate routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/generate").route(web::post().to(generate_certificate)))
        .service(
            web::resource("/download/{filename}").route(web::get().to(download_certificate)),
        )
        .service(web::resource("/certificates").route(web::get().to(list_certificates)))
        .service(web::resource("/cleanup").route(web::post().to(cleanup_certificates)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> GenerateCertificateRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        let req = body(json!({ "donor_name": "Asha", "amount": "10" }));
        assert_eq!(req.missing_field(), Some("donation_id"));

        let req = body(json!({
            "donor_name": "Asha", "amount": "10", "donation_id": "D-1"
        }));
        match req.into_certificate_request() {
            Err(RequestError::MissingField(field)) => assert_eq!(field, "donation_date"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_cleanup_age_bounds() {
        assert_eq!(max_age_from_hours(24.0), Some(Duration::from_secs(24 * 3600)));
        assert_eq!(max_age_from_hours(0.5), Some(Duration::from_secs(1800)));
        assert_eq!(max_age_from_hours(1e300), Some(Duration::MAX));
        assert_eq!(max_age_from_hours(f64::MAX), Some(Duration::MAX));
        assert_eq!(max_age_from_hours(-1.0), None);
        assert_eq!(max_age_from_hours(f64::NAN), None);
        assert_eq!(max_age_from_hours(f64::INFINITY), None);
    }

    #[test]
    fn test_null_counts_as_missing() {
        let req = body(json!({
            "donor_name": "Asha", "amount": null, "donation_id": "D-1", "donation_date": "2024-01-15"
        }));
        assert_eq!(req.missing_field(), Some("amount"));
    }

    #[test]
    fn test_amount_as_string_or_number() {
        for amount in [json!("1500.00"), json!(1500), json!(1500.5)] {
            let req = body(json!({
                "donor_name": "Asha", "amount": amount, "donation_id": "D-1", "donation_date": "2024-01-15"
            }));
            let parsed = req.into_certificate_request().unwrap();
            assert!(parsed.amount >= Decimal::from(1500));
        }
    }

    #[test]
    fn test_unparseable_values_name_their_field() {
        let req = body(json!({
            "donor_name": "Asha", "amount": "ten", "donation_id": "D-1", "donation_date": "15/01/2024"
        }));
        match req.into_certificate_request() {
            Err(RequestError::Invalid(errors)) => {
                assert_eq!(errors.fields(), vec!["amount", "donation_date"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_impossible_calendar_date() {
        let req = body(json!({
            "donor_name": "Asha", "amount": "10", "donation_id": "D-1", "donation_date": "2023-02-29"
        }));
        assert!(matches!(
            req.into_certificate_request(),
            Err(RequestError::Invalid(_))
        ));
    }

    #[test]
    fn test_optional_fields_default() {
        let req = body(json!({
            "donor_name": "Asha", "amount": "10", "donation_id": "D-1", "donation_date": "2024-01-15",
            "payment_mode": "UPI", "show_80g_note": false, "extra_meta": { "pan": "ABCDE1234F" }
        }));
        let parsed = req.into_certificate_request().unwrap();
        assert_eq!(parsed.org_name, DEFAULT_ORG_NAME);
        assert_eq!(parsed.payment_mode.as_deref(), Some("UPI"));
        assert!(!parsed.show_80g_note);
        assert_eq!(parsed.extra_meta["pan"], "ABCDE1234F");
    }
}
