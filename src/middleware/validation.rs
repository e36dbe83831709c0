use std::collections::HashMap;

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::ApiError;

/// JSON body that has been deserialized and passed `validator` checks.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::invalid_json(e.body_text()))?;

        value
            .validate()
            .map_err(|e| ApiError::validation_error("Request validation failed", Some(field_errors(&e))))?;

        Ok(ValidatedJson(value))
    }
}

/// Query string that has been deserialized and passed `validator` checks.
pub struct ValidatedQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        value
            .validate()
            .map_err(|e| ApiError::validation_error("Query validation failed", Some(field_errors(&e))))?;

        Ok(ValidatedQuery(value))
    }
}

/// First message per failing field.
fn field_errors(errors: &ValidationErrors) -> HashMap<String, String> {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            let first = errs.first()?;
            let message = match &first.message {
                Some(message) => message.to_string(),
                None => format!("failed {} check", first.code),
            };
            Some((field.to_string(), message))
        })
        .collect()
}
