use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use opsgate_core::{ActorRole, ActorSnapshot, AppError};

use crate::error::ApiError;

/// Authenticated actor extracted from forwarded identity headers.
///
/// Authentication itself lives in front of this service; the auth layer
/// forwards the verified identity as headers on every request.
pub struct ActorContext(pub ActorSnapshot);

const SUBJECT_HEADER: &str = "x-opsgate-subject";
const NAME_HEADER: &str = "x-opsgate-name";
const ROLE_HEADER: &str = "x-opsgate-role";
const DEPARTMENT_HEADER: &str = "x-opsgate-department";

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let subject = header_value(parts, SUBJECT_HEADER).ok_or_else(|| {
            ApiError(AppError::Unauthorized(format!(
                "missing {SUBJECT_HEADER} header"
            )))
        })?;
        let role_value = header_value(parts, ROLE_HEADER).ok_or_else(|| {
            ApiError(AppError::Unauthorized(format!(
                "missing {ROLE_HEADER} header"
            )))
        })?;
        let role = ActorRole::from_str(role_value.as_str())
            .map_err(|error| ApiError(AppError::Unauthorized(error.to_string())))?;
        let display_name = header_value(parts, NAME_HEADER).unwrap_or_else(|| subject.clone());
        let department = header_value(parts, DEPARTMENT_HEADER);

        Ok(Self(ActorSnapshot::new(
            subject,
            display_name,
            role,
            department,
        )))
    }
}
