//! Server host: the assembled application and its shared state
//!
//! The host is what [`ServerBuilder`](super::ServerBuilder) produces once
//! assembly succeeded. It owns the resource registry, the attached hooks and
//! the services handlers reach through [`AppState`], and turns them into an
//! axum `Router`.

use super::assembler::AssemblyReport;
use super::hooks::{HookChain, lifecycle};
use super::registry::ResourceRegistry;
use crate::accounts::AccountService;
use crate::config::AppConfig;
use crate::core::service::{AccountStore, FormStore};
use crate::forms::FormService;
use axum::Router;
use axum::middleware;
use std::sync::Arc;

/// State shared by every handler and hook
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub forms: FormService,
    pub config: Arc<AppConfig>,
    pub hooks: Arc<HookChain>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        account_store: Arc<dyn AccountStore>,
        form_store: Arc<dyn FormStore>,
        hooks: Arc<HookChain>,
    ) -> Self {
        Self {
            accounts: AccountService::new(
                account_store.clone(),
                form_store.clone(),
                config.session.clone(),
            ),
            forms: FormService::new(account_store, form_store),
            config,
            hooks,
        }
    }
}

/// An assembled application, ready to be exposed over HTTP
pub struct ServerHost {
    pub state: AppState,
    pub registry: ResourceRegistry,
    pub report: AssemblyReport,
}

impl ServerHost {
    pub fn new(state: AppState, registry: ResourceRegistry, report: AssemblyReport) -> Self {
        Self {
            state,
            registry,
            report,
        }
    }

    /// Claimed path templates, in registration order
    pub fn paths(&self) -> Vec<&str> {
        self.registry.claimed_paths()
    }

    /// Build the router: every registered resource wrapped by the hook lifecycle
    pub fn router(&self) -> Router {
        self.registry
            .build_routes()
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                lifecycle,
            ))
            .with_state(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::assembler::{ModuleCatalog, assemble};
    use crate::storage::InMemoryStore;

    fn state(hooks: HookChain) -> AppState {
        let store = Arc::new(InMemoryStore::new());
        AppState::new(
            Arc::new(AppConfig::default()),
            store.clone(),
            store,
            Arc::new(hooks),
        )
    }

    #[test]
    fn test_state_shares_config() {
        let state = state(HookChain::new());
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(cloned.hooks.is_empty());
    }

    #[test]
    fn test_host_exposes_assembled_paths() {
        let catalog = crate::api::default_catalog().expect("catalog builds");
        let mut registry = ResourceRegistry::new();
        let mut hooks = HookChain::new();
        let report = assemble(&catalog, &mut registry, &mut hooks, "api.app").expect("assembles");

        let host = ServerHost::new(state(hooks), registry, report);
        assert!(host.paths().contains(&"/accounts/create_session"));
        assert_eq!(host.paths().len(), host.report.paths.len());
        let _router = host.router();
    }

    #[test]
    fn test_empty_catalog_is_not_assembled() {
        let catalog = ModuleCatalog::new();
        let mut registry = ResourceRegistry::new();
        let mut hooks = HookChain::new();
        assert!(assemble(&catalog, &mut registry, &mut hooks, "api.app").is_err());
    }
}
