//! Resource graph assembler
//!
//! Starting from an entry module, the assembler discovers the resources each
//! module exports, registers them, attaches the module's request hooks and
//! follows the dependency names the resources declare until the transitive
//! closure is mounted.
//!
//! Modules are walked depth first. A dependency that is still being walked
//! is a cycle; a dependency that was already fully walked is skipped, so two
//! resources may share a dependency.

use super::hooks::{AfterRequestHook, BeforeRequestHook, HookChain};
use super::registry::ResourceRegistry;
use crate::core::resource::{PathTemplate, Resource, ResourceModule};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Startup failure while assembling the application
///
/// Every variant is fatal: the application must not serve traffic.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("configuration error in {subject}: {reason}")]
    Configuration { subject: String, reason: String },

    #[error("duplicate registration: {0}")]
    DuplicateRegistration(Duplicate),

    #[error("dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },
}

/// What was registered twice
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Duplicate {
    #[error("module '{0}' is already in the catalog")]
    Module(String),

    #[error("resource '{0}' is already registered")]
    Resource(String),

    #[error("path '{path}' is already claimed by resource '{claimed_by}'")]
    Path { path: String, claimed_by: String },

    #[error("request hook '{0}' is already attached")]
    Hook(String),
}

impl AssemblyError {
    fn module(module: &str, reason: impl Into<String>) -> Self {
        AssemblyError::Configuration {
            subject: format!("module '{}'", module),
            reason: reason.into(),
        }
    }
}

/// Modules available to the assembler, by identifier
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    modules: IndexMap<String, Arc<dyn ResourceModule>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, failing if its identifier is taken
    pub fn insert(&mut self, module: Arc<dyn ResourceModule>) -> Result<(), AssemblyError> {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(AssemblyError::DuplicateRegistration(Duplicate::Module(name)));
        }
        self.modules.insert(name, module);
        Ok(())
    }

    /// Fluent form of [`insert`](Self::insert)
    pub fn with_module(
        mut self,
        module: impl ResourceModule + 'static,
    ) -> Result<Self, AssemblyError> {
        self.insert(Arc::new(module))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ResourceModule>> {
        self.modules.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Everything one module exports
pub struct Discovery {
    pub module: String,
    pub resources: Vec<Arc<dyn Resource>>,
    pub dependencies: BTreeSet<String>,
    pub before_hooks: Vec<Arc<dyn BeforeRequestHook>>,
    pub after_hooks: Vec<Arc<dyn AfterRequestHook>>,
}

impl Discovery {
    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name()).collect()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.path()).collect()
    }
}

/// Outcome of a successful assembly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Modules in the order they were walked
    pub modules: Vec<String>,
    /// Claimed path templates in registration order
    pub paths: Vec<String>,
}

/// Read the resources, dependency names and hooks exported by `module`
///
/// Fails with a configuration error when the module is unknown, when a
/// resource's path template is malformed, when a resource serves no verb
/// or when it declares an empty dependency name.
pub fn discover(catalog: &ModuleCatalog, module: &str) -> Result<Discovery, AssemblyError> {
    let source = catalog
        .get(module)
        .ok_or_else(|| AssemblyError::module(module, "no such module in the catalog"))?;

    let resources = source.resources();
    let mut dependencies = BTreeSet::new();

    for resource in &resources {
        PathTemplate::parse(resource.path()).map_err(|reason| {
            AssemblyError::module(module, format!("resource '{}': {}", resource.name(), reason))
        })?;

        if resource.handlers().is_empty() {
            return Err(AssemblyError::module(
                module,
                format!(
                    "resource '{}' at '{}' serves no HTTP verb",
                    resource.name(),
                    resource.path()
                ),
            ));
        }

        for dependency in resource.dependencies() {
            if dependency.trim().is_empty() {
                return Err(AssemblyError::module(
                    module,
                    format!("resource '{}' declares an empty dependency", resource.name()),
                ));
            }
            dependencies.insert(dependency);
        }
    }

    Ok(Discovery {
        module: module.to_string(),
        resources,
        dependencies,
        before_hooks: source.before_request_hooks(),
        after_hooks: source.after_request_hooks(),
    })
}

/// Bind `resources` into `registry`
///
/// Stops at the first resource that is already registered or whose path is
/// already claimed.
pub fn register(
    registry: &mut ResourceRegistry,
    resources: &[Arc<dyn Resource>],
) -> Result<(), AssemblyError> {
    for resource in resources {
        let name = resource.name();
        let template =
            PathTemplate::parse(resource.path()).map_err(|reason| AssemblyError::Configuration {
                subject: format!("resource '{}'", name),
                reason,
            })?;

        if registry.contains_resource(name) {
            return Err(AssemblyError::DuplicateRegistration(Duplicate::Resource(
                name.to_string(),
            )));
        }

        if let Some(claimed_by) = registry.claimant_of(&template) {
            return Err(AssemblyError::DuplicateRegistration(Duplicate::Path {
                path: template.as_str().to_string(),
                claimed_by: claimed_by.to_string(),
            }));
        }

        let handlers = resource.handlers();
        let methods = handlers.methods().to_vec();
        registry.bind(name, template, methods, handlers.into_router());
    }

    Ok(())
}

/// Mount the transitive closure of `entry` into `registry` and `hooks`
pub fn assemble(
    catalog: &ModuleCatalog,
    registry: &mut ResourceRegistry,
    hooks: &mut HookChain,
    entry: &str,
) -> Result<AssemblyReport, AssemblyError> {
    let mut walk = Walk {
        catalog,
        registry,
        hooks,
        states: HashMap::new(),
        stack: Vec::new(),
        visited: Vec::new(),
    };
    walk.visit(entry)?;

    let report = AssemblyReport {
        modules: walk.visited,
        paths: registry_paths(walk.registry),
    };
    tracing::info!(
        modules = ?report.modules,
        resources = report.paths.len(),
        "application assembled"
    );
    Ok(report)
}

fn registry_paths(registry: &ResourceRegistry) -> Vec<String> {
    registry
        .claimed_paths()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

struct Walk<'a> {
    catalog: &'a ModuleCatalog,
    registry: &'a mut ResourceRegistry,
    hooks: &'a mut HookChain,
    states: HashMap<String, VisitState>,
    stack: Vec<String>,
    visited: Vec<String>,
}

impl Walk<'_> {
    fn visit(&mut self, module: &str) -> Result<(), AssemblyError> {
        tracing::debug!(module, "assembling module");
        self.states
            .insert(module.to_string(), VisitState::InProgress);
        self.stack.push(module.to_string());

        let discovery = discover(self.catalog, module)?;
        register(&mut *self.registry, &discovery.resources)?;
        self.attach_hooks(&discovery)?;
        self.visited.push(module.to_string());

        for dependency in &discovery.dependencies {
            match self.states.get(dependency).copied() {
                Some(VisitState::InProgress) => {
                    let start = self
                        .stack
                        .iter()
                        .position(|m| m == dependency)
                        .unwrap_or(0);
                    let mut cycle = self.stack[start..].to_vec();
                    cycle.push(dependency.clone());
                    return Err(AssemblyError::DependencyCycle { cycle });
                }
                Some(VisitState::Done) => {
                    tracing::debug!(module, dependency, "dependency already assembled");
                }
                None => self.visit(dependency)?,
            }
        }

        self.stack.pop();
        self.states.insert(module.to_string(), VisitState::Done);
        Ok(())
    }

    fn attach_hooks(&mut self, discovery: &Discovery) -> Result<(), AssemblyError> {
        for hook in &discovery.before_hooks {
            if !self.hooks.attach_before(hook.clone()) {
                return Err(AssemblyError::DuplicateRegistration(Duplicate::Hook(
                    hook.name().to_string(),
                )));
            }
        }
        for hook in &discovery.after_hooks {
            if !self.hooks.attach_after(hook.clone()) {
                return Err(AssemblyError::DuplicateRegistration(Duplicate::Hook(
                    hook.name().to_string(),
                )));
            }
        }
        Ok(())
    }
}
