//! Field validation shared by every form.
//!
//! DESIGN
//! ======
//! Validators collect every failing field instead of stopping at the first,
//! so a rejected form reports all of its problems at once. Messages are the
//! user-facing Portuguese strings shown next to each field.

use std::collections::BTreeMap;
use std::fmt;

use axum::http::StatusCode;
use uuid::Uuid;

use crate::error::{ApiError, ErrorCode};

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure; the first message for a field wins.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[cfg(test)]
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(value)` when nothing failed, otherwise the collected errors.
    ///
    /// # Errors
    ///
    /// Returns `self` if any field was recorded.
    pub fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }

    #[must_use]
    pub fn into_map(self) -> BTreeMap<&'static str, String> {
        self.0
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().copied().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

impl ErrorCode for FieldErrors {
    fn error_code(&self) -> &'static str {
        "E_VALIDATION"
    }

    fn status(&self) -> StatusCode {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::from_code(&errors).with_fields(errors.into_map())
    }
}

// =============================================================================
// COERCION
// =============================================================================

/// Coerce a typed currency string into a number.
///
/// Every character outside `[0-9,.-]` is dropped and the first comma becomes
/// the decimal point. There is no thousands handling: `"R$ 2.500"` is `2.5`.
/// An empty result is `0`. Returns `None` when what remains is not a number.
#[must_use]
pub fn parse_currency(raw: &str) -> Option<f64> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    let normalized = kept.replacen(',', ".", 1);
    if normalized.is_empty() {
        return Some(0.0);
    }
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Required positive amount: present, numeric, greater than zero.
pub fn required_amount(errors: &mut FieldErrors, field: &'static str, raw: &str) -> f64 {
    if raw.trim().is_empty() {
        errors.add(field, "Valor é obrigatório");
        return 0.0;
    }
    match parse_currency(raw) {
        None => {
            errors.add(field, "Valor deve ser um número válido");
            0.0
        }
        Some(v) if v <= 0.0 => {
            errors.add(field, "Valor deve ser maior que zero");
            v
        }
        Some(v) => v,
    }
}

/// Optional amount: blank means absent, otherwise it must be numeric.
pub fn optional_amount(errors: &mut FieldErrors, field: &'static str, raw: &str) -> Option<f64> {
    if raw.trim().is_empty() {
        return None;
    }
    let parsed = parse_currency(raw);
    if parsed.is_none() {
        errors.add(field, "Valor deve ser um número válido");
    }
    parsed
}

// =============================================================================
// TEXT
// =============================================================================

/// Trimmed text whose length (in characters) lies in `[min, max]`.
pub fn text_between(
    errors: &mut FieldErrors,
    field: &'static str,
    label: &str,
    raw: &str,
    min: usize,
    max: usize,
) -> String {
    let value = raw.trim();
    let len = value.chars().count();
    if len < min {
        errors.add(field, format!("{label} deve ter no mínimo {min} caracteres"));
    } else if len > max {
        errors.add(field, format!("{label} deve ter no máximo {max} caracteres"));
    }
    value.to_owned()
}

/// Blank input becomes `None`; anything else is kept trimmed.
#[must_use]
pub fn optional_text(raw: &str) -> Option<String> {
    let value = raw.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

/// Structural email check: one `@`, a non-empty local part, and a dotted
/// domain without empty labels or whitespace.
#[must_use]
pub fn is_valid_email(raw: &str) -> bool {
    let value = raw.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

pub fn required_email(errors: &mut FieldErrors, field: &'static str, raw: &str) -> String {
    if !is_valid_email(raw) {
        errors.add(field, "Email inválido");
    }
    raw.trim().to_owned()
}

/// Blank is allowed; otherwise the address must be valid.
pub fn optional_email(errors: &mut FieldErrors, field: &'static str, raw: &str) -> Option<String> {
    let value = optional_text(raw)?;
    if !is_valid_email(&value) {
        errors.add(field, "Email inválido");
    }
    Some(value)
}

pub fn required_uuid(errors: &mut FieldErrors, field: &'static str, raw: &str) -> Uuid {
    Uuid::parse_str(raw.trim()).unwrap_or_else(|_| {
        errors.add(field, "Selecione um cliente válido");
        Uuid::nil()
    })
}

/// Parse a wire enum value, recording `message` when it is not one.
pub fn required_choice<T: Default>(
    errors: &mut FieldErrors,
    field: &'static str,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
    message: &str,
) -> T {
    parse(raw).unwrap_or_else(|| {
        errors.add(field, message);
        T::default()
    })
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
