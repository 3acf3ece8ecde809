//! Request lifecycle hooks
//!
//! Modules may export hooks that run around every request. Before hooks
//! fill the [`RequestContext`] handed to handlers; after hooks see the same
//! context and the response produced by the handler. Each hook is attached
//! once per application.

use super::host::AppState;
use crate::core::auth::RequestContext;
use crate::core::error::ApiError;
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Hook run before the handler
#[async_trait]
pub trait BeforeRequestHook: Send + Sync {
    /// Identity of the hook; attaching the same name twice is an error
    fn name(&self) -> &str;

    async fn before_request(
        &self,
        state: &AppState,
        headers: &HeaderMap,
        context: &mut RequestContext,
    ) -> Result<(), ApiError>;
}

/// Hook run after the handler
#[async_trait]
pub trait AfterRequestHook: Send + Sync {
    /// Identity of the hook; attaching the same name twice is an error
    fn name(&self) -> &str;

    async fn after_request(
        &self,
        state: &AppState,
        context: &RequestContext,
        response: &mut Response,
    ) -> Result<(), ApiError>;
}

/// Hooks attached to one application, in attach order
#[derive(Clone, Default)]
pub struct HookChain {
    before: Vec<Arc<dyn BeforeRequestHook>>,
    after: Vec<Arc<dyn AfterRequestHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a before hook, returning `false` if one with that name is already attached
    pub fn attach_before(&mut self, hook: Arc<dyn BeforeRequestHook>) -> bool {
        if self.before.iter().any(|h| h.name() == hook.name()) {
            return false;
        }
        self.before.push(hook);
        true
    }

    /// Attach an after hook, returning `false` if one with that name is already attached
    pub fn attach_after(&mut self, hook: Arc<dyn AfterRequestHook>) -> bool {
        if self.after.iter().any(|h| h.name() == hook.name()) {
            return false;
        }
        self.after.push(hook);
        true
    }

    pub fn before_names(&self) -> Vec<&str> {
        self.before.iter().map(|h| h.name()).collect()
    }

    pub fn after_names(&self) -> Vec<&str> {
        self.after.iter().map(|h| h.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

/// Axum middleware running the attached hooks around every request
pub async fn lifecycle(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let hooks = state.hooks.clone();
    let mut context = RequestContext::default();

    for hook in &hooks.before {
        if let Err(err) = hook
            .before_request(&state, request.headers(), &mut context)
            .await
        {
            tracing::debug!(
                hook = hook.name(),
                error = %err,
                "before-request hook rejected request"
            );
            return err.into_response();
        }
    }

    request.extensions_mut().insert(context.clone());
    let mut response = next.run(request).await;

    for hook in &hooks.after {
        if let Err(err) = hook.after_request(&state, &context, &mut response).await {
            tracing::warn!(hook = hook.name(), error = %err, "after-request hook failed");
            return err.into_response();
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedHook(&'static str);

    #[async_trait]
    impl BeforeRequestHook for NamedHook {
        fn name(&self) -> &str {
            self.0
        }

        async fn before_request(
            &self,
            _state: &AppState,
            _headers: &HeaderMap,
            _context: &mut RequestContext,
        ) -> Result<(), ApiError> {
            Ok(())
        }
    }

    #[async_trait]
    impl AfterRequestHook for NamedHook {
        fn name(&self) -> &str {
            self.0
        }

        async fn after_request(
            &self,
            _state: &AppState,
            _context: &RequestContext,
            _response: &mut Response,
        ) -> Result<(), ApiError> {
            Ok(())
        }
    }

    #[test]
    fn test_attach_keeps_order() {
        let mut chain = HookChain::new();
        assert!(chain.attach_before(Arc::new(NamedHook("first"))));
        assert!(chain.attach_before(Arc::new(NamedHook("second"))));
        assert_eq!(chain.before_names(), vec!["first", "second"]);
        assert!(chain.after_names().is_empty());
    }

    #[test]
    fn test_attach_same_name_twice_is_refused() {
        let mut chain = HookChain::new();
        assert!(chain.attach_after(Arc::new(NamedHook("touch"))));
        assert!(!chain.attach_after(Arc::new(NamedHook("touch"))));
        assert_eq!(chain.after_names(), vec!["touch"]);
    }

    #[test]
    fn test_before_and_after_are_independent() {
        let mut chain = HookChain::new();
        assert!(chain.is_empty());
        assert!(chain.attach_before(Arc::new(NamedHook("auth"))));
        assert!(chain.attach_after(Arc::new(NamedHook("auth"))));
        assert!(!chain.is_empty());
    }
}
