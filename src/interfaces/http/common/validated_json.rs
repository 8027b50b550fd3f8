//! JSON body extractor that runs `validator` rules
//!
//! Malformed bodies and rule violations both surface as
//! `DomainError::Validation`, so callers see the same `INVALID_PARAM`
//! envelope and 400 status as a validation failure raised by a service.

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use super::ApiError;
use crate::domain::DomainError;

/// `Json<T>` that has passed `T::validate()`.
pub struct ValidatedJson<T>(pub T);

/// "field: message" pairs ordered by field name.
fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let parts: Vec<String> = fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{field}: {message}"),
                None => format!("{field}: {}", e.code),
            })
        })
        .collect();

    if parts.is_empty() {
        "request body failed validation".to_string()
    } else {
        parts.join("; ")
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| DomainError::Validation(rejection.body_text()))?;
        value
            .validate()
            .map_err(|errors| DomainError::Validation(describe(&errors)))?;
        Ok(Self(value))
    }
}
