//! ServerBuilder for fluent API to assemble and serve the application

use super::assembler::{ModuleCatalog, assemble};
use super::hooks::HookChain;
use super::host::{AppState, ServerHost};
use super::registry::ResourceRegistry;
use crate::config::AppConfig;
use crate::core::resource::ResourceModule;
use crate::core::service::{AccountStore, FormStore};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builder for the HTTP application
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(config)
///     .with_store(InMemoryStore::new())
///     .with_catalog(api::default_catalog()?)
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    catalog: ModuleCatalog,
    account_store: Option<Arc<dyn AccountStore>>,
    form_store: Option<Arc<dyn FormStore>>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder with the default configuration and no modules
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            catalog: ModuleCatalog::new(),
            account_store: None,
            form_store: None,
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Use one backend for both accounts and forms
    pub fn with_store<S>(mut self, store: S) -> Self
    where
        S: AccountStore + FormStore + 'static,
    {
        let store = Arc::new(store);
        self.account_store = Some(store.clone());
        self.form_store = Some(store);
        self
    }

    /// Use an already shared backend for both accounts and forms
    pub fn with_shared_store<S>(mut self, store: Arc<S>) -> Self
    where
        S: AccountStore + FormStore + 'static,
    {
        self.account_store = Some(store.clone());
        self.form_store = Some(store);
        self
    }

    /// Replace the module catalog
    pub fn with_catalog(mut self, catalog: ModuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Add one module to the catalog
    pub fn register_module(mut self, module: impl ResourceModule + 'static) -> Result<Self> {
        self.catalog.insert(Arc::new(module))?;
        Ok(self)
    }

    /// Assemble the configured entry module into a [`ServerHost`]
    ///
    /// Any assembly error aborts the build; no partial host is returned.
    pub fn build_host(self) -> Result<ServerHost> {
        let account_store = self
            .account_store
            .ok_or_else(|| anyhow::anyhow!("AccountStore is required. Call .with_store()"))?;
        let form_store = self
            .form_store
            .ok_or_else(|| anyhow::anyhow!("FormStore is required. Call .with_store()"))?;

        let entry = self.config.server.entry_module.clone();
        let mut registry = ResourceRegistry::new();
        let mut hooks = HookChain::new();
        let report = assemble(&self.catalog, &mut registry, &mut hooks, &entry)?;

        let state = AppState::new(
            Arc::new(self.config),
            account_store,
            form_store,
            Arc::new(hooks),
        );

        Ok(ServerHost::new(state, registry, report))
    }

    /// Build the final router with tracing and, when enabled, permissive CORS
    pub fn build(self) -> Result<Router> {
        let host = self.build_host()?;
        Ok(Self::expose(&host))
    }

    fn expose(host: &ServerHost) -> Router {
        let mut app = host
            .router()
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

        if host.state.config.cors.allow_any_origin {
            app = app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        app
    }

    /// Serve the application on the configured address with graceful shutdown
    ///
    /// Handles SIGTERM and SIGINT (Ctrl+C).
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.bind.clone();
        let app = self.build()?;
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;
    use crate::storage::InMemoryStore;

    // ── Store requirements ───────────────────────────────────────────────

    #[test]
    fn test_build_without_store_fails() {
        let result = ServerBuilder::new()
            .with_catalog(api::default_catalog().expect("catalog"))
            .build();
        let err = result.err().expect("store is required");
        assert!(err.to_string().contains("AccountStore is required"));
    }

    // ── Assembly ─────────────────────────────────────────────────────────

    #[test]
    fn test_build_host_assembles_entry_module() {
        let host = ServerBuilder::new()
            .with_store(InMemoryStore::new())
            .with_catalog(api::default_catalog().expect("catalog"))
            .build_host()
            .expect("host builds");

        assert_eq!(
            host.report.modules,
            vec!["api.app", "api.auth", "api.forms", "api.search"]
        );
        assert_eq!(
            host.state.hooks.before_names(),
            vec!["authentication"]
        );
        assert_eq!(host.state.hooks.after_names(), vec!["session_access"]);
    }

    #[test]
    fn test_unknown_entry_module_fails() {
        let mut config = AppConfig::default();
        config.server.entry_module = "api.missing".to_string();

        let result = ServerBuilder::new()
            .with_config(config)
            .with_store(InMemoryStore::new())
            .with_catalog(api::default_catalog().expect("catalog"))
            .build();
        let err = result.err().expect("unknown module");
        assert!(err.to_string().contains("api.missing"));
    }

    #[test]
    fn test_register_same_module_twice_fails() {
        let result = ServerBuilder::new()
            .register_module(api::search::SearchModule)
            .and_then(|b| b.register_module(api::search::SearchModule));
        assert!(result.is_err());
    }

    #[test]
    fn test_build_with_cors() {
        let mut config = AppConfig::default();
        config.cors.allow_any_origin = true;

        let result = ServerBuilder::new()
            .with_config(config)
            .with_store(InMemoryStore::new())
            .with_catalog(api::default_catalog().expect("catalog"))
            .build();
        assert!(result.is_ok());
    }
}
