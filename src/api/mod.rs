//! REST resources of the records service
//!
//! Each submodule is a [`ResourceModule`](crate::core::resource::ResourceModule)
//! exporting a static table of resources. [`default_catalog`] collects them
//! under their identifiers so the assembler can walk them from `api.app`.
//!
//! Responses follow the HAL convention: every document carries a `_links`
//! object with at least a `self` link.

pub mod app;
pub mod auth;
pub mod forms;
pub mod search;

use crate::core::error::ApiError;
use crate::server::assembler::{AssemblyError, ModuleCatalog};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Every module shipped with the service
pub fn default_catalog() -> Result<ModuleCatalog, AssemblyError> {
    ModuleCatalog::new()
        .with_module(app::AppModule)?
        .with_module(auth::AuthModule)?
        .with_module(forms::FormsModule)?
        .with_module(search::SearchModule)
}

/// A HAL document under construction
#[derive(Debug, Clone)]
pub struct Hal {
    status: StatusCode,
    links: Map<String, Value>,
    fields: Map<String, Value>,
}

impl Hal {
    pub fn new(self_href: impl Into<String>) -> Self {
        let mut links = Map::new();
        links.insert("self".to_string(), json!({ "href": self_href.into() }));
        Self {
            status: StatusCode::OK,
            links,
            fields: Map::new(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn link(mut self, rel: &str, href: impl Into<String>) -> Self {
        self.links
            .insert(rel.to_string(), json!({ "href": href.into() }));
        self
    }

    /// Link whose href contains `{placeholders}`
    pub fn templated(mut self, rel: &str, href: impl Into<String>) -> Self {
        self.links.insert(
            rel.to_string(),
            json!({ "href": href.into(), "templated": true }),
        );
        self
    }

    /// Declare the compact-uri prefix used by the templated links
    pub fn curie(mut self, name: &str) -> Self {
        self.links.insert(
            "curies".to_string(),
            json!([{ "name": name, "href": "/docs/{rel}", "templated": true }]),
        );
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Embed any serializable value under `key`
    pub fn embed<T: Serialize>(self, key: &str, value: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ApiError::Internal(format!("serializing {}: {}", key, e)))?;
        Ok(self.field(key, value))
    }

    pub fn into_value(self) -> Value {
        let mut document = Map::new();
        document.insert("_links".to_string(), Value::Object(self.links));
        document.extend(self.fields);
        Value::Object(document)
    }
}

impl IntoResponse for Hal {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self.into_value())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_lists_every_module() {
        let catalog = default_catalog().expect("catalog builds");
        assert_eq!(
            catalog.names(),
            vec!["api.app", "api.auth", "api.forms", "api.search"]
        );
    }

    #[test]
    fn test_hal_document_layout() {
        let document = Hal::new("/account/3")
            .curie("rd")
            .templated("rd:index", "/")
            .field("user_id", 3)
            .into_value();

        assert_eq!(
            document,
            json!({
                "_links": {
                    "self": { "href": "/account/3" },
                    "curies": [{ "name": "rd", "href": "/docs/{rel}", "templated": true }],
                    "rd:index": { "href": "/", "templated": true },
                },
                "user_id": 3,
            })
        );
    }

    #[test]
    fn test_embed_serializes_structs() {
        #[derive(Serialize)]
        struct Probe {
            id: i64,
        }

        let document = Hal::new("/x")
            .embed("probe", &Probe { id: 9 })
            .expect("serializes")
            .into_value();
        assert_eq!(document["probe"]["id"], 9);
    }
}
