use std::sync::OnceLock;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::error::ApiError;

/// JSON body that has passed its `validator` rules.
///
/// Malformed JSON maps to 400 with the parser's message; rule failures map to
/// 400 with the per-field list.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Query string that has passed its `validator` rules.
///
/// Unparseable parameters (an unknown enum variant, a non-boolean flag) map to
/// a 400 field error on `query` instead of axum's plain-text rejection.
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::validation("query", rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

/// Validate every element of a nested list, prefixing field names with `list[i].`
pub fn validate_each<T: Validate>(list_name: &str, items: &[T]) -> Result<(), ApiError> {
    let mut fields = Vec::new();
    for (i, item) in items.iter().enumerate() {
        if let Err(errors) = item.validate() {
            if let ApiError::Validation(errs) = ApiError::from(errors) {
                fields.extend(errs.into_iter().map(|mut e| {
                    e.field = format!("{list_name}[{i}].{}", e.field);
                    e
                }));
            }
        }
    }
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(fields))
    }
}

fn cnic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{13}|\d{5}-\d{7}-\d)$").expect("CNIC pattern is valid")
    })
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("time pattern is valid"))
}

pub fn validate_cnic(cnic: &str) -> Result<(), ValidationError> {
    if cnic_pattern().is_match(cnic.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("cnic");
        err.message = Some("CNIC must be 13 digits (e.g. 12345-1234567-1)".into());
        Err(err)
    }
}

pub fn validate_time(time: &str) -> Result<(), ValidationError> {
    if time_pattern().is_match(time) {
        Ok(())
    } else {
        let mut err = ValidationError::new("time");
        err.message = Some("Time must be HH:MM (24h)".into());
        Err(err)
    }
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MedicationEntry;

    #[test]
    fn cnic_formats() {
        assert!(validate_cnic("3520212345671").is_ok());
        assert!(validate_cnic("35202-1234567-1").is_ok());
        assert!(validate_cnic("35202-12345671").is_err());
        assert!(validate_cnic("12345").is_err());
    }

    #[test]
    fn time_formats() {
        assert!(validate_time("00:00").is_ok());
        assert!(validate_time("23:59").is_ok());
        assert!(validate_time("24:00").is_err());
        assert!(validate_time("9:30").is_err());
    }

    #[test]
    fn blank_strings_fail() {
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank(" x ").is_ok());
    }

    #[test]
    fn nested_errors_carry_index() {
        let good = MedicationEntry {
            name: "Amoxicillin".into(),
            dosage: "500mg".into(),
            frequency: "BD".into(),
            duration: "7 days".into(),
            instructions: None,
        };
        let mut bad = good.clone();
        bad.name.clear();

        assert!(validate_each("medications", &[good.clone()]).is_ok());
        match validate_each("medications", &[good, bad]) {
            Err(ApiError::Validation(fields)) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "medications[1].name");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
