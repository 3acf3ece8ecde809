//! Account resources and the session hooks
//!
//! The `authentication` hook resolves the `Authentication` header into the
//! request context before any handler runs; `session_access` stamps the
//! session's last access once the handler is done.

use super::Hal;
use crate::accounts::{AccountPatch, LoginRequest, LogoutRequest, SignupRequest};
use crate::core::auth::{AUTHENTICATION_HEADER, Authenticated, RequestContext, Unauthenticated};
use crate::core::error::{ApiError, AuthError};
use crate::core::resource::{Handlers, Resource, ResourceModule};
use crate::core::validation::{JsonBody, PathParams};
use crate::server::hooks::{AfterRequestHook, BeforeRequestHook};
use crate::server::host::AppState;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const MODULE: &str = "api.auth";

pub struct AuthModule;

impl ResourceModule for AuthModule {
    fn name(&self) -> &str {
        MODULE
    }

    fn resources(&self) -> Vec<Arc<dyn Resource>> {
        vec![
            Arc::new(Signup),
            Arc::new(Login),
            Arc::new(Logout),
            Arc::new(Account),
        ]
    }

    fn before_request_hooks(&self) -> Vec<Arc<dyn BeforeRequestHook>> {
        vec![Arc::new(Authentication)]
    }

    fn after_request_hooks(&self) -> Vec<Arc<dyn AfterRequestHook>> {
        vec![Arc::new(SessionAccess)]
    }
}

// =============================================================================
// Hooks
// =============================================================================

/// Resolves the session named by the `Authentication` header
pub struct Authentication;

#[async_trait]
impl BeforeRequestHook for Authentication {
    fn name(&self) -> &str {
        "authentication"
    }

    async fn before_request(
        &self,
        state: &AppState,
        headers: &HeaderMap,
        context: &mut RequestContext,
    ) -> Result<(), ApiError> {
        let Some(value) = headers.get(AUTHENTICATION_HEADER) else {
            return Ok(());
        };
        let token = value
            .to_str()
            .map_err(|_| ApiError::Auth(AuthError::InvalidSessionToken))?;

        let session = state.accounts.resolve_session(token).await?;
        tracing::debug!(user_id = session.user_id, "request authenticated");
        context.session = Some(session);
        Ok(())
    }
}

/// Stamps the last access of the request's session
pub struct SessionAccess;

#[async_trait]
impl AfterRequestHook for SessionAccess {
    fn name(&self) -> &str {
        "session_access"
    }

    async fn after_request(
        &self,
        state: &AppState,
        context: &RequestContext,
        _response: &mut Response,
    ) -> Result<(), ApiError> {
        if let Some(session) = context.session() {
            state.accounts.touch(session).await?;
        }
        Ok(())
    }
}

// =============================================================================
// Resources
// =============================================================================

/// `/accounts`: create users
pub struct Signup;

impl Resource for Signup {
    fn name(&self) -> &str {
        "signup"
    }

    fn path(&self) -> &str {
        "/accounts"
    }

    fn dependencies(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().post(signup)
    }
}

async fn signup(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    JsonBody(request): JsonBody<SignupRequest>,
) -> Result<Hal, ApiError> {
    let user_id = state.accounts.signup(&session, request).await?;
    Ok(Hal::new("/accounts")
        .status(StatusCode::CREATED)
        .link("rd:account", format!("/account/{}", user_id))
        .field("user_id", user_id))
}

/// `/accounts/create_session`: log in
pub struct Login;

impl Resource for Login {
    fn name(&self) -> &str {
        "login"
    }

    fn path(&self) -> &str {
        "/accounts/create_session"
    }

    fn dependencies(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().post(login)
    }
}

async fn login(
    State(state): State<AppState>,
    _anonymous: Unauthenticated,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Hal, ApiError> {
    let outcome = state.accounts.login(&request.cpf, &request.password).await?;
    Ok(Hal::new("/accounts/create_session")
        .field("token", outcome.token)
        .field("user_id", outcome.user_id))
}

/// `/accounts/logout`: end the current session
pub struct Logout;

impl Resource for Logout {
    fn name(&self) -> &str {
        "logout"
    }

    fn path(&self) -> &str {
        "/accounts/logout"
    }

    fn dependencies(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().post(logout)
    }
}

async fn logout(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    JsonBody(request): JsonBody<LogoutRequest>,
) -> Result<Hal, ApiError> {
    let user_id = state.accounts.logout(&session, &request.token).await?;
    Ok(Hal::new("/accounts/logout")
        .curie("rd")
        .templated("rd:index", "/")
        .field("user_id", user_id))
}

/// `/account/<int:user_id>`: read and update a user
pub struct Account;

impl Resource for Account {
    fn name(&self) -> &str {
        "account"
    }

    fn path(&self) -> &str {
        "/account/<int:user_id>"
    }

    fn dependencies(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().get(get_account).patch(update_account)
    }
}

async fn get_account(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    PathParams(user_id): PathParams<i64>,
) -> Result<Hal, ApiError> {
    let view = state.accounts.get_account(&session, user_id).await?;
    Hal::new(format!("/account/{}", user_id)).embed("user", &view)
}

async fn update_account(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    PathParams(user_id): PathParams<i64>,
    JsonBody(patch): JsonBody<AccountPatch>,
) -> Result<Hal, ApiError> {
    state
        .accounts
        .update_account(&session, user_id, patch)
        .await?;
    Ok(Hal::new(format!("/account/{}", user_id)).field("user_id", user_id))
}
