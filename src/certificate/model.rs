//! Certificate data model.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use super::format::{format_date_dmy, format_inr};

pub const DEFAULT_ORG_NAME: &str = "Shri Raghavendra Swamy Brundavana Sannidhi, Halasuru";
pub const DEFAULT_ORG_SUBTITLE: &str = "Guru Seva Mandali (Regd.)";
pub const DEFAULT_REASON_TEXT: &str = "for their valued contribution";

/// Certificate fields as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateRequest {
    pub donor_name: String,
    /// Amount in INR
    pub amount: Decimal,
    pub donation_id: String,
    pub donation_date: NaiveDate,
    /// e.g. "Razorpay", "UPI", "Bank Transfer"
    pub payment_mode: Option<String>,
    pub org_name: String,
    pub org_subtitle: String,
    /// Line shown under the donor name
    pub reason_text: String,
    pub show_80g_note: bool,
    pub extra_meta: Map<String, Value>,
}

impl CertificateRequest {
    /// Request with the organisation defaults filled in.
    pub fn new(
        donor_name: impl Into<String>,
        amount: Decimal,
        donation_id: impl Into<String>,
        donation_date: NaiveDate,
    ) -> Self {
        Self {
            donor_name: donor_name.into(),
            amount,
            donation_id: donation_id.into(),
            donation_date,
            payment_mode: None,
            org_name: DEFAULT_ORG_NAME.to_string(),
            org_subtitle: DEFAULT_ORG_SUBTITLE.to_string(),
            reason_text: DEFAULT_REASON_TEXT.to_string(),
            show_80g_note: true,
            extra_meta: Map::new(),
        }
    }
}

/// A validated, normalized copy of a `CertificateRequest`.
///
/// Only `validation::validate` builds one, so holding a value means every field
/// invariant already holds.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalCertificate {
    inner: CertificateRequest,
}

/// Values handed to the HTML template.
#[derive(Debug, Serialize)]
pub struct TemplateContext<'a> {
    pub donor_name: &'a str,
    /// Quantized amount as a plain decimal string, formatted by the `inr` filter
    pub amount: String,
    pub donation_id: &'a str,
    /// ISO date, formatted by the `date_numeric` / `date_dmy` filters
    pub donation_date: String,
    pub org_name: &'a str,
    pub org_subtitle: &'a str,
    pub reason_text: &'a str,
    pub show_80g_note: bool,
    pub payment_mode: Option<&'a str>,
    pub extra_meta: &'a Map<String, Value>,
    pub rendered_at: String,
}

impl CanonicalCertificate {
    pub(crate) fn from_validated(inner: CertificateRequest) -> Self {
        Self { inner }
    }

    pub fn donor_name(&self) -> &str {
        &self.inner.donor_name
    }

    pub fn amount(&self) -> Decimal {
        self.inner.amount
    }

    pub fn donation_id(&self) -> &str {
        &self.inner.donation_id
    }

    pub fn donation_date(&self) -> NaiveDate {
        self.inner.donation_date
    }

    pub fn fields(&self) -> &CertificateRequest {
        &self.inner
    }

    /// Amount as it appears on the certificate, e.g. "₹1,500.00".
    pub fn display_amount(&self) -> String {
        format_inr(self.inner.amount)
    }

    pub fn to_context(&self) -> TemplateContext<'_> {
        let req = &self.inner;
        let now = Utc::now();
        TemplateContext {
            donor_name: &req.donor_name,
            amount: req.amount.to_string(),
            donation_id: &req.donation_id,
            donation_date: req.donation_date.format("%Y-%m-%d").to_string(),
            org_name: &req.org_name,
            org_subtitle: &req.org_subtitle,
            reason_text: &req.reason_text,
            show_80g_note: req.show_80g_note,
            payment_mode: req.payment_mode.as_deref(),
            extra_meta: &req.extra_meta,
            rendered_at: format!(
                "{}, {} UTC",
                format_date_dmy(now.date_naive()),
                now.format("%H:%M")
            ),
        }
    }
}
