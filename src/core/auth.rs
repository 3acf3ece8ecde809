//! Request context, sessions and permission checks
//!
//! The session resolved for a request travels explicitly: the
//! authentication hook stores a [`RequestContext`] in the request extensions
//! and handlers take it (or one of the stricter extractors below) as an
//! argument.

use super::error::{ApiError, AuthError};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Name of the header carrying the session token
pub const AUTHENTICATION_HEADER: &str = "Authentication";

/// Groups known to the system
pub const ADMIN_GROUP: &str = "admin";
pub const ATTENDANT_GROUP: &str = "attendant";
pub const PHYSIOTHERAPIST_GROUP: &str = "physiotherapist";
pub const PATIENT_GROUP: &str = "patient";

pub const GROUPS: [&str; 4] = [
    ADMIN_GROUP,
    ATTENDANT_GROUP,
    PHYSIOTHERAPIST_GROUP,
    PATIENT_GROUP,
];

pub const CREATE_FORM: &str = "create_form";
pub const CHANGE_FORM_DATA: &str = "change_form_data";
pub const READ_FORM_DATA: &str = "read_form_data";
pub const SEARCH_PATIENT: &str = "search_patient";

/// Permission needed to create a user in `group`
pub fn create_permission(group: &str) -> String {
    format!("create_{}", group)
}

/// Permission needed to change the data of a user in `group`
pub fn change_data_permission(group: &str) -> String {
    format!("change_{}_data", group)
}

/// Permission needed to read the data of a user in `group`
pub fn read_data_permission(group: &str) -> String {
    format!("read_{}_data", group)
}

/// An active login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub groups: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    pub expire_date: DateTime<Utc>,
}

impl Session {
    pub fn has_permission(&self, codename: &str) -> bool {
        self.permissions.contains(codename)
    }

    /// Fail unless the session holds every listed permission
    pub fn require<I, S>(&self, codenames: I) -> Result<(), AuthError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let missing: Vec<String> = codenames
            .into_iter()
            .filter(|c| !self.has_permission(c.as_ref()))
            .map(|c| c.as_ref().to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::NotEnoughPermission { missing })
        }
    }
}

/// Per-request context handed to handlers
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub session: Option<Session>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extractor for handlers that need a session
pub struct Authenticated(pub Session);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = RequestContext::from_request_parts(parts, state).await?;
        context
            .session
            .map(Authenticated)
            .ok_or(ApiError::Auth(AuthError::Unauthenticated))
    }
}

/// Extractor for handlers that must be called without a session
pub struct Unauthenticated;

impl<S> FromRequestParts<S> for Unauthenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = RequestContext::from_request_parts(parts, state).await?;
        if context.is_authenticated() {
            return Err(ApiError::Auth(AuthError::AlreadyAuthenticated));
        }
        Ok(Unauthenticated)
    }
}
