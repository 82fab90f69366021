//! HTML template rendering.
//!
//! Templates are registered from memory with strict undefined behaviour, so a template
//! referencing a field the context does not provide fails instead of printing an empty
//! string. HTML templates are auto-escaped; only values piped through `|safe` are raw.

use chrono::NaiveDate;
use minijinja::value::Value;
use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use super::format::{format_date_dmy, format_date_numeric, format_inr};
use super::CertificateError;

/// Renders certificate templates held in memory.
///
/// Sources are fixed once the renderer is built; editing a template file afterwards
/// has no effect on what is rendered.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    /// Renderer over in-memory templates, keyed by name.
    pub fn from_sources(templates: &[(&str, &str)]) -> Result<Self, CertificateError> {
        let mut env = Environment::new();
        // escaping and whitespace rules are fixed when a template is compiled
        Self::configure(&mut env);
        for (name, source) in templates {
            env.add_template_owned(name.to_string(), source.to_string())
                .map_err(map_template_error)?;
        }
        Ok(Self { env })
    }

    fn configure(env: &mut Environment<'static>) {
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|name| {
            if name.ends_with(".html") || name.ends_with(".htm") || name.ends_with(".xml") {
                AutoEscape::Html
            } else {
                AutoEscape::None
            }
        });
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        env.add_filter("inr", inr_filter);
        env.add_filter("date_dmy", date_dmy_filter);
        env.add_filter("date_numeric", date_numeric_filter);
    }

    pub fn render<S: Serialize>(
        &self,
        template_name: &str,
        context: S,
    ) -> Result<String, CertificateError> {
        let template = self
            .env
            .get_template(template_name)
            .map_err(map_template_error)?;
        template.render(context).map_err(map_template_error)
    }
}

fn map_template_error(err: Error) -> CertificateError {
    match err.kind() {
        ErrorKind::TemplateNotFound => CertificateError::TemplateNotFound(err.to_string()),
        ErrorKind::UndefinedError => CertificateError::MissingVariable(err.to_string()),
        _ => CertificateError::Template(err.to_string()),
    }
}

fn value_text(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.trim().to_string(),
        None => value.to_string(),
    }
}

fn inr_filter(value: Value) -> Result<String, Error> {
    let raw = value_text(&value);
    let amount = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("inr filter expects a decimal amount, got '{}'", raw),
            )
        })?;
    Ok(format_inr(amount))
}

fn parse_date(value: &Value, filter: &str) -> Result<NaiveDate, Error> {
    let raw = value_text(value);
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("{} filter expects a YYYY-MM-DD date, got '{}'", filter, raw),
        )
    })
}

fn date_dmy_filter(value: Value) -> Result<String, Error> {
    parse_date(&value, "date_dmy").map(format_date_dmy)
}

fn date_numeric_filter(value: Value) -> Result<String, Error> {
    parse_date(&value, "date_numeric").map(format_date_numeric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer(source: &str) -> TemplateRenderer {
        TemplateRenderer::from_sources(&[("cert.html", source)]).unwrap()
    }

    #[test]
    fn test_filters_format_server_side() {
        let r = renderer("{{ amount | inr }} on {{ date | date_numeric }} ({{ date | date_dmy }})");
        let html = r
            .render("cert.html", json!({ "amount": "1234567.5", "date": "2024-01-15" }))
            .unwrap();
        assert_eq!(html, "₹12,34,567.50 on 15-01-2024 (15 Jan 2024)");
    }

    #[test]
    fn test_inr_filter_accepts_numbers() {
        let r = renderer("{{ amount | inr }}");
        let html = r.render("cert.html", json!({ "amount": 1500 })).unwrap();
        assert_eq!(html, "₹1,500.00");
    }

    #[test]
    fn test_values_are_html_escaped() {
        let r = renderer("<p>{{ name }}</p><p>{{ note | safe }}</p>");
        let html = r
            .render(
                "cert.html",
                json!({ "name": "A & B \"Co\"", "note": "<b>80G</b>" }),
            )
            .unwrap();
        assert!(html.contains("A &amp; B &quot;Co&quot;"));
        assert!(html.contains("<b>80G</b>"));
    }

    #[test]
    fn test_undefined_variable_fails_loudly() {
        let r = renderer("<p>{{ donor_name }} {{ missing_field }}</p>");
        let err = r
            .render("cert.html", json!({ "donor_name": "Asha" }))
            .unwrap_err();
        assert!(matches!(err, CertificateError::MissingVariable(_)), "{err:?}");
    }

    #[test]
    fn test_unknown_template() {
        let r = renderer("x");
        let err = r.render("other.html", json!({})).unwrap_err();
        assert!(matches!(err, CertificateError::TemplateNotFound(_)));
    }

    #[test]
    fn test_bad_filter_input() {
        let r = renderer("{{ amount | inr }}");
        let err = r.render("cert.html", json!({ "amount": "lots" })).unwrap_err();
        assert!(matches!(err, CertificateError::Template(_)));
    }
}
