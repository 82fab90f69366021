use chrono::DateTime;
use donation_certificate_server::certificate::{CertificateError, ValidationError, ValidationErrors};
use donation_certificate_server::ErrorResponse;
use serde_json::json;

#[test]
fn test_error_response_shape() {
    let response = ErrorResponse::bad_request("Missing required field: amount");
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["error"], json!("Missing required field: amount"));
    assert_eq!(value["kind"], json!("BadRequest"));
    assert!(DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
}

#[test]
fn test_error_kinds() {
    assert_eq!(ErrorResponse::not_found("Certificate not found").kind, "NotFound");
    assert_eq!(ErrorResponse::internal_error("boom").kind, "InternalServerError");
}

#[test]
fn test_validation_messages_name_every_field() {
    let mut errors = ValidationErrors::new();
    errors.add(ValidationError::empty_field("donor_name"));
    errors.add(ValidationError::invalid_amount("-5"));

    let message = CertificateError::from(errors).to_string();
    assert!(message.contains("donor_name"), "{}", message);
    assert!(message.contains("amount"), "{}", message);
}
