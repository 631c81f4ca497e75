use async_trait::async_trait;
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{ApiError, ErrorKind};

/// Extract a UUID from the path, rejecting with an `ApiError` body.
pub struct ValidUuid(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for ValidUuid
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::new(ErrorKind::ConstraintViolation, e.body_text()))?;

        let uuid = Uuid::parse_str(&id).map_err(|_| {
            ApiError::new(
                ErrorKind::ConstraintViolation,
                format!("Invalid ID {id}: expected a UUID"),
            )
        })?;

        Ok(Self(uuid))
    }
}

/// JSON body whose rejections (bad syntax, missing fields, wrong content type)
/// come back in the same shape as every other error.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::new(ErrorKind::ConstraintViolation, e.body_text()))?;
        Ok(Self(value))
    }
}
