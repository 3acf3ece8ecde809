//! Typed error handling for the records API
//!
//! Handlers and services return [`ApiError`], which knows its HTTP status,
//! a stable machine-readable code and how to render itself as JSON.
//!
//! # Error Categories
//!
//! - [`AuthError`]: sessions, credentials and permissions
//! - [`ResourceError`]: missing or conflicting users and forms
//! - [`ValidationError`]: malformed input
//! - [`StorageError`]: failures inside a storage backend
//! - [`RequestError`]: malformed paths and query strings
//!
//! # Example
//!
//! ```rust,ignore
//! use rehab::prelude::*;
//!
//! async fn load(store: &dyn FormStore, id: i64) -> Result<FormRecord, ApiError> {
//!     store
//!         .get_form(id)
//!         .await?
//!         .ok_or(ApiError::Resource(ResourceError::FormNotFound { id }))
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// The main error type of the records API
#[derive(Debug)]
pub enum ApiError {
    /// Authentication and authorization errors
    Auth(AuthError),

    /// Users and forms that are missing or already exist
    Resource(ResourceError),

    /// Input validation errors
    Validation(ValidationError),

    /// Storage backend errors
    Storage(StorageError),

    /// HTTP/Request errors
    Request(RequestError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Auth(e) => write!(f, "{}", e),
            ApiError::Resource(e) => write!(f, "{}", e),
            ApiError::Validation(e) => write!(f, "{}", e),
            ApiError::Storage(e) => write!(f, "{}", e),
            ApiError::Request(e) => write!(f, "{}", e),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Auth(e) => Some(e),
            ApiError::Resource(e) => Some(e),
            ApiError::Validation(e) => Some(e),
            ApiError::Storage(e) => Some(e),
            ApiError::Request(e) => Some(e),
            ApiError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Shorthand for a single invalid value reported with a plain message
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::Validation(ValidationError::Invalid {
            message: message.into(),
        })
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(e) => e.status_code(),
            ApiError::Resource(e) => e.status_code(),
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Request(e) => e.status_code(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Auth(e) => e.error_code(),
            ApiError::Resource(e) => e.error_code(),
            ApiError::Validation(e) => e.error_code(),
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Request(e) => e.error_code(),
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Resource(ResourceError::UserNotFound { id }) => {
                Some(serde_json::json!({ "user_id": id }))
            }
            ApiError::Resource(ResourceError::FormNotFound { id }) => {
                Some(serde_json::json!({ "form_id": id }))
            }
            ApiError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Auth Errors
// =============================================================================

/// Errors related to sessions, credentials and permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The handler needs a session and the request carried none
    Unauthenticated,

    /// The handler needs an anonymous caller and the request carried a session
    AlreadyAuthenticated,

    /// The session token is unknown
    InvalidSessionToken,

    /// The session token exists but is past its expire date
    ExpiredToken,

    /// The caller tried to act on a session that is not its own
    InvalidSession,

    /// Login attempted for an unknown cpf
    UserDoesNotExist,

    /// Login attempted with the wrong password
    WrongPassword,

    /// The caller lacks at least one of the required permissions
    NotEnoughPermission { missing: Vec<String> },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Unauthenticated => write!(f, "authentication required"),
            AuthError::AlreadyAuthenticated => write!(f, "already authenticated"),
            AuthError::InvalidSessionToken => write!(f, "invalid session token"),
            AuthError::ExpiredToken => write!(f, "expired token"),
            AuthError::InvalidSession => write!(f, "invalid session"),
            AuthError::UserDoesNotExist => write!(f, "user does not exist"),
            AuthError::WrongPassword => write!(f, "wrong password"),
            AuthError::NotEnoughPermission { .. } => write!(f, "not enough permission"),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            _ => StatusCode::FORBIDDEN,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::AlreadyAuthenticated => "ALREADY_AUTHENTICATED",
            AuthError::InvalidSessionToken => "INVALID_SESSION_TOKEN",
            AuthError::ExpiredToken => "EXPIRED_TOKEN",
            AuthError::InvalidSession => "INVALID_SESSION",
            AuthError::UserDoesNotExist => "USER_DOES_NOT_EXIST",
            AuthError::WrongPassword => "WRONG_PASSWORD",
            AuthError::NotEnoughPermission { .. } => "NOT_ENOUGH_PERMISSION",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

// =============================================================================
// Resource Errors
// =============================================================================

/// Errors related to the existence of users and forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    UserNotFound { id: i64 },

    UserAlreadyExists,

    FormNotFound { id: i64 },

    FormAlreadyExists,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::UserNotFound { .. } => write!(f, "user not found"),
            ResourceError::UserAlreadyExists => write!(f, "user already exists"),
            ResourceError::FormNotFound { .. } => write!(f, "form not found"),
            ResourceError::FormAlreadyExists => write!(f, "form already exists"),
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResourceError::UserNotFound { .. } | ResourceError::FormNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ResourceError::UserAlreadyExists | ResourceError::FormAlreadyExists => {
                StatusCode::CONFLICT
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ResourceError::UserNotFound { .. } => "USER_NOT_FOUND",
            ResourceError::UserAlreadyExists => "USER_ALREADY_EXISTS",
            ResourceError::FormNotFound { .. } => "FORM_NOT_FOUND",
            ResourceError::FormAlreadyExists => "FORM_ALREADY_EXISTS",
        }
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        ApiError::Resource(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to input validation
#[derive(Debug)]
pub enum ValidationError {
    /// A value was rejected; the message is shown to the client as is
    Invalid { message: String },

    /// Multiple field validation errors
    FieldErrors(Vec<FieldValidationError>),

    /// Invalid JSON format or shape
    InvalidJson { message: String },
}

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Invalid { message } => write!(f, "{}", message),
            ValidationError::FieldErrors(errors) => {
                let msgs: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                write!(f, "Validation errors: {}", msgs.join(", "))
            }
            ValidationError::InvalidJson { message } => {
                write!(f, "Invalid JSON: {}", message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::Invalid { .. } => "INVALID_VALUE",
            ValidationError::FieldErrors(_) => "VALIDATION_ERROR",
            ValidationError::InvalidJson { .. } => "INVALID_JSON",
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldValidationError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldValidationError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::Validation(ValidationError::FieldErrors(fields))
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to storage backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A lock or transaction could not be completed
    TransactionError { message: String },

    /// A uniqueness or reference constraint was violated
    IntegrityError { message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::TransactionError { message } => {
                write!(f, "Transaction error: {}", message)
            }
            StorageError::IntegrityError { message } => {
                write!(f, "Data integrity error: {}", message)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// HTTP request errors
#[derive(Debug)]
pub enum RequestError {
    /// Invalid path parameter
    InvalidPath { path: String, message: String },

    /// Query string parameter that the resource does not understand
    UnknownQueryParameter { name: String },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidPath { path, message } => {
                write!(f, "Invalid path '{}': {}", path, message)
            }
            RequestError::UnknownQueryParameter { name } => {
                write!(f, "{} is not a searchable field", name)
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::InvalidPath { .. } => StatusCode::NOT_FOUND,
            RequestError::UnknownQueryParameter { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidPath { .. } => "INVALID_PATH",
            RequestError::UnknownQueryParameter { .. } => "UNKNOWN_QUERY_PARAMETER",
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::Request(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ApiError::Internal(format!("password hashing failed: {}", err))
    }
}
