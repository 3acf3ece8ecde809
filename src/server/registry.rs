//! Resource registry: the router object populated during assembly

use super::host::AppState;
use crate::core::resource::PathTemplate;
use axum::Router;
use axum::http::Method;
use axum::routing::MethodRouter;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// A resource bound into the registry
pub struct RegisteredResource {
    pub name: String,
    pub template: PathTemplate,
    pub methods: Vec<Method>,
    router: MethodRouter<AppState>,
}

/// Registry of every resource mounted on the application
///
/// Keeps resources in registration order. Exposes what the assembler needs
/// to enforce uniqueness: the registered resource names and the claimed path
/// templates (both verbatim and by shape).
#[derive(Default)]
pub struct ResourceRegistry {
    resources: IndexMap<String, RegisteredResource>,
    names: HashSet<String>,
    shapes: HashMap<String, String>,
}

impl ResourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a resource at its template
    ///
    /// Callers are expected to have checked [`contains_resource`](Self::contains_resource)
    /// and [`claimant_of`](Self::claimant_of) first; binding over an existing
    /// template replaces it.
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        template: PathTemplate,
        methods: Vec<Method>,
        router: MethodRouter<AppState>,
    ) {
        let name = name.into();
        tracing::debug!(resource = %name, path = %template, ?methods, "binding resource");
        self.names.insert(name.clone());
        self.shapes.insert(template.shape(), name.clone());
        self.resources.insert(
            template.as_str().to_string(),
            RegisteredResource {
                name,
                template,
                methods,
                router,
            },
        );
    }

    /// Whether a resource with this name is already registered
    pub fn contains_resource(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether this exact template is already claimed
    pub fn is_claimed(&self, template: &str) -> bool {
        self.resources.contains_key(template)
    }

    /// Name of the resource already claiming the same requests as
    /// `template`, if any
    pub fn claimant_of(&self, template: &PathTemplate) -> Option<&str> {
        if let Some(existing) = self.resources.get(template.as_str()) {
            return Some(existing.name.as_str());
        }
        self.shapes.get(&template.shape()).map(|s| s.as_str())
    }

    /// Claimed templates, in registration order
    pub fn claimed_paths(&self) -> Vec<&str> {
        self.resources.keys().map(|s| s.as_str()).collect()
    }

    /// Registered resource names, in registration order
    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.values().map(|r| r.name.as_str()).collect()
    }

    pub fn get(&self, template: &str) -> Option<&RegisteredResource> {
        self.resources.get(template)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Build a router with every registered resource mounted
    pub fn build_routes(&self) -> Router<AppState> {
        let mut router = Router::new();

        for resource in self.resources.values() {
            router = router.route(&resource.template.to_axum(), resource.router.clone());
        }

        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok() -> &'static str {
        "ok"
    }

    fn bind(registry: &mut ResourceRegistry, name: &str, path: &str) {
        let template = PathTemplate::parse(path).expect("valid template");
        registry.bind(
            name,
            template,
            vec![Method::GET],
            MethodRouter::new().get(ok),
        );
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = ResourceRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.claimed_paths().is_empty());
        assert!(!registry.contains_resource("anything"));
    }

    #[test]
    fn test_bind_records_name_and_path() {
        let mut registry = ResourceRegistry::new();
        bind(&mut registry, "index", "/");
        bind(&mut registry, "accounts", "/accounts");

        assert_eq!(registry.len(), 2);
        assert!(registry.contains_resource("index"));
        assert!(registry.is_claimed("/accounts"));
        assert_eq!(registry.claimed_paths(), vec!["/", "/accounts"]);
        assert_eq!(registry.resource_names(), vec!["index", "accounts"]);
        assert_eq!(
            registry.get("/accounts").map(|r| r.methods.clone()),
            Some(vec![Method::GET])
        );
    }

    #[test]
    fn test_claimant_of_matches_by_shape() {
        let mut registry = ResourceRegistry::new();
        bind(&mut registry, "account", "/account/<int:user_id>");

        let same_shape = PathTemplate::parse("/account/<string:cpf>").expect("valid");
        assert_eq!(registry.claimant_of(&same_shape), Some("account"));

        let other = PathTemplate::parse("/accounts/<int:user_id>").expect("valid");
        assert_eq!(registry.claimant_of(&other), None);
    }

    #[test]
    fn test_build_routes_does_not_panic() {
        let mut registry = ResourceRegistry::new();
        bind(&mut registry, "index", "/");
        bind(&mut registry, "form", "/forms/<string:form_t>/<int:form_id>");
        let _router: Router<AppState> = registry.build_routes();
    }
}
