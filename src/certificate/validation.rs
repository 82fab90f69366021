//! Input validation for certificate requests.
//!
//! Errors are collected per field so a caller sees every problem at once, and the
//! message always names the offending field.

use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;

use super::format::collapse_whitespace;
use super::model::{CanonicalCertificate, CertificateRequest};

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_DONATION_ID_CHARS: usize = 64;

/// Characters that could open markup or template syntax in the printed page.
const FORBIDDEN_NAME_CHARS: [char; 4] = ['<', '>', '{', '}'];

/// Validation error for a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn empty_field(field: &str) -> Self {
        Self::new(field, "must not be empty")
    }

    pub fn too_long(field: &str, max: usize) -> Self {
        Self::new(field, format!("must be at most {} characters", max))
    }

    pub fn invalid_amount(value: &str) -> Self {
        Self::new("amount", format!("'{}' is not a valid decimal amount", value))
    }

    pub fn invalid_date_format(value: &str) -> Self {
        Self::new(
            "donation_date",
            format!("'{}' is not a valid date, use YYYY-MM-DD", value),
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn single(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Names of the fields that failed, in the order they were checked.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    /// Ok if no errors were collected, otherwise the collection itself.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self::single(error)
    }
}

// ============================================================================
// Field checks
// ============================================================================

/// Parse an amount as typed by a caller: plain decimal (`1500.00`) or scientific
/// notation (`1.5e3`).
pub fn parse_amount(raw: &str) -> Result<Decimal, ValidationError> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| ValidationError::invalid_amount(raw))
}

/// Collapse whitespace in the donor name and check length and forbidden characters.
pub fn validate_donor_name(value: &str, errors: &mut ValidationErrors) -> String {
    let name = collapse_whitespace(value);
    if name.is_empty() {
        errors.add(ValidationError::empty_field("donor_name"));
    } else if name.chars().count() > MAX_NAME_CHARS {
        errors.add(ValidationError::too_long("donor_name", MAX_NAME_CHARS));
    }

    if name.contains(FORBIDDEN_NAME_CHARS) {
        errors.add(ValidationError::new(
            "donor_name",
            "must not contain markup or template delimiters (< > { })",
        ));
    }
    name
}

/// Quantize to two decimals, round-half-up, and require a positive result.
pub fn validate_amount(value: Decimal, errors: &mut ValidationErrors) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);

    if value <= Decimal::ZERO || rounded <= Decimal::ZERO {
        errors.add(ValidationError::new("amount", "must be greater than zero"));
    }
    rounded
}

pub fn validate_donation_id(value: &str, errors: &mut ValidationErrors) -> String {
    let id = value.trim();
    if id.is_empty() {
        errors.add(ValidationError::empty_field("donation_id"));
    } else if id.chars().count() > MAX_DONATION_ID_CHARS {
        errors.add(ValidationError::too_long("donation_id", MAX_DONATION_ID_CHARS));
    }
    id.to_string()
}

/// Validate a request and produce its canonical copy. The request itself is left untouched.
pub fn validate(request: &CertificateRequest) -> Result<CanonicalCertificate, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let donor_name = validate_donor_name(&request.donor_name, &mut errors);
    let amount = validate_amount(request.amount, &mut errors);
    let donation_id = validate_donation_id(&request.donation_id, &mut errors);

    errors.into_result()?;

    Ok(CanonicalCertificate::from_validated(CertificateRequest {
        donor_name,
        amount,
        donation_id,
        ..request.clone()
    }))
}
