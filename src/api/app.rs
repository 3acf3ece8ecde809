//! Entry module: the API index and the health probe

use super::Hal;
use crate::core::resource::{Handlers, Resource, ResourceModule};
use axum::Json;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const MODULE: &str = "api.app";

pub struct AppModule;

impl ResourceModule for AppModule {
    fn name(&self) -> &str {
        MODULE
    }

    fn resources(&self) -> Vec<Arc<dyn Resource>> {
        vec![Arc::new(Index), Arc::new(Health)]
    }
}

/// `/`: links to every sub-API
pub struct Index;

impl Resource for Index {
    fn name(&self) -> &str {
        "index"
    }

    fn path(&self) -> &str {
        "/"
    }

    fn dependencies(&self) -> BTreeSet<String> {
        [super::auth::MODULE, super::forms::MODULE, super::search::MODULE]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().get(index)
    }
}

async fn index() -> Hal {
    Hal::new("/")
        .curie("rd")
        .templated("rd:accounts", "/accounts")
        .templated("rd:forms", "/forms")
        .templated("rd:search", "/search/patients")
}

/// `/health`: liveness probe
pub struct Health;

impl Resource for Health {
    fn name(&self) -> &str {
        "health"
    }

    fn path(&self) -> &str {
        "/health"
    }

    fn dependencies(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().get(health)
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
