//! JSON body extractor with typed rejections

use crate::core::error::{ApiError, RequestError, ValidationError};
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

/// Axum extractor that deserializes a JSON body into `T`
///
/// Unlike `axum::Json`, a rejected body becomes an [`ApiError`] so clients
/// get the same error document as for every other failure.
///
/// ```rust,ignore
/// async fn create(
///     JsonBody(body): JsonBody<NewPatientInformation>,
/// ) -> Result<Json<Value>, ApiError> {
///     // body is fully typed here
/// }
/// ```
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ApiError::Validation(ValidationError::InvalidJson {
                message: rejection.body_text(),
            })),
        }
    }
}

/// Axum extractor for typed path parameters
///
/// A segment that does not convert (e.g. `abc` where an `<int:...>`
/// placeholder is declared) does not match the resource, so it is reported
/// as a 404 like any other unknown path.
pub struct PathParams<T>(pub T);

impl<S, T> FromRequestParts<S> for PathParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(PathParams(value)),
            Err(rejection) => Err(ApiError::Request(RequestError::InvalidPath {
                path: parts.uri.path().to_string(),
                message: rejection.body_text(),
            })),
        }
    }
}
