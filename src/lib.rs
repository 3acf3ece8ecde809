//! # Rehab Records
//!
//! REST backend for rehabilitation clinical records: accounts with
//! group-based permissions, login sessions and structured clinical forms.
//!
//! ## Features
//!
//! - **Declarative resources**: every endpoint is a [`Resource`](core::resource::Resource)
//!   with a path template and the modules it depends on
//! - **Graph assembly**: the application is assembled from an entry module by
//!   walking resource dependencies, rejecting cycles and duplicate routes at startup
//! - **Explicit request context**: the resolved session travels to handlers as
//!   an extractor instead of ambient state
//! - **Typed forms**: patient information, sociodemographic, kinetic-functional
//!   and structure-and-function measure forms with field-level validation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rehab::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_env_or_default("REHAB_CONFIG")?;
//!     let store = InMemoryStore::new();
//!     seed_defaults(&store, &config).await?;
//!
//!     ServerBuilder::new()
//!         .with_config(config)
//!         .with_store(store)
//!         .with_catalog(default_catalog()?)
//!         .serve()
//!         .await
//! }
//! ```

pub mod accounts;
pub mod api;
pub mod config;
pub mod core;
pub mod forms;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{Authenticated, RequestContext, Session, Unauthenticated},
        error::{ApiError, AuthError, RequestError, ResourceError, StorageError, ValidationError},
        resource::{Handlers, PathTemplate, Resource, ResourceModule},
        service::{AccountStore, FormStore},
        validation::{JsonBody, PathParams},
    };

    // === Domain ===
    pub use crate::accounts::{AccountService, User};
    pub use crate::forms::{FormBody, FormKind, FormRecord, FormService};

    // === Storage ===
    pub use crate::storage::{InMemoryStore, seed_defaults};

    // === Config ===
    pub use crate::config::AppConfig;

    // === Server ===
    pub use crate::api::default_catalog;
    pub use crate::server::{
        AppState, AssemblyError, HookChain, ModuleCatalog, ResourceRegistry, ServerBuilder,
        ServerHost, assemble,
    };

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
}
