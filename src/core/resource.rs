//! Resource descriptors and the modules that export them
//!
//! A [`Resource`] is one routable endpoint: a path template, the set of
//! modules it depends on and the HTTP verbs it serves. A
//! [`ResourceModule`] is a named table of resources (plus optional request
//! lifecycle hooks) that the assembler walks at startup.

use crate::server::hooks::{AfterRequestHook, BeforeRequestHook};
use crate::server::host::AppState;
use axum::handler::Handler;
use axum::http::Method;
use axum::routing::MethodRouter;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

/// A routable endpoint declaration
///
/// Every resource must state its path and its dependencies; there is no
/// default for either. `name` identifies the resource inside one router and
/// defaults to the implementing type's name.
pub trait Resource: Send + Sync {
    /// Identity of this resource within an assembled router
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// URL path template, e.g. `/account/<int:user_id>`
    fn path(&self) -> &str;

    /// Identifiers of the modules whose resources this one needs
    fn dependencies(&self) -> BTreeSet<String>;

    /// HTTP verbs served by this resource
    fn handlers(&self) -> Handlers;
}

/// A named table of resources and request lifecycle hooks
pub trait ResourceModule: Send + Sync {
    /// Module identifier (e.g. "api.auth")
    fn name(&self) -> &str;

    /// Resources exported by this module
    fn resources(&self) -> Vec<Arc<dyn Resource>>;

    /// Hooks run before every request handled by the application
    fn before_request_hooks(&self) -> Vec<Arc<dyn BeforeRequestHook>> {
        Vec::new()
    }

    /// Hooks run after every request handled by the application
    fn after_request_hooks(&self) -> Vec<Arc<dyn AfterRequestHook>> {
        Vec::new()
    }
}

/// Verb table of a resource
///
/// Mirrors the chaining API of axum's `MethodRouter` while remembering which
/// verbs were bound, so a resource that serves nothing can be rejected.
pub struct Handlers {
    router: MethodRouter<AppState>,
    methods: Vec<Method>,
}

macro_rules! verb {
    ($fn_name:ident, $method:expr) => {
        pub fn $fn_name<H, T>(mut self, handler: H) -> Self
        where
            H: Handler<T, AppState>,
            T: 'static,
        {
            self.router = self.router.$fn_name(handler);
            self.methods.push($method);
            self
        }
    };
}

impl Handlers {
    pub fn new() -> Self {
        Self {
            router: MethodRouter::new(),
            methods: Vec::new(),
        }
    }

    verb!(get, Method::GET);
    verb!(post, Method::POST);
    verb!(put, Method::PUT);
    verb!(patch, Method::PATCH);
    verb!(delete, Method::DELETE);

    /// Verbs bound so far, in binding order
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn into_router(self) -> MethodRouter<AppState> {
        self.router
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("methods", &self.methods)
            .finish()
    }
}

/// Converter of a typed placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    Int,
    String,
}

/// One segment of a parsed path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param { name: String, converter: Converter },
}

/// A validated URL path template
///
/// Templates use `<converter:name>` placeholders (`int` or `string`; a
/// bare `<name>` is a string). They render to axum's `{name}` syntax for
/// routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(format!("path '{}' must start with '/'", raw));
        };

        let mut segments = Vec::new();
        let mut names = HashSet::new();

        if !rest.is_empty() {
            for part in rest.split('/') {
                if part.is_empty() {
                    return Err(format!("path '{}' contains an empty segment", raw));
                }
                let segment = parse_segment(part)
                    .map_err(|reason| format!("path '{}': {}", raw, reason))?;
                if let Segment::Param { name, .. } = &segment {
                    if !names.insert(name.clone()) {
                        return Err(format!(
                            "path '{}' repeats placeholder '{}'",
                            raw, name
                        ));
                    }
                }
                segments.push(segment);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template exactly as declared
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Path in axum 0.8 syntax: `/account/{user_id}`
    pub fn to_axum(&self) -> String {
        self.render(|name| format!("{{{}}}", name))
    }

    /// Path with placeholder names erased: `/account/{}`
    ///
    /// Two templates with the same shape match the same requests.
    pub fn shape(&self) -> String {
        self.render(|_| "{}".to_string())
    }

    fn render(&self, param: impl Fn(&str) -> String) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Param { name, .. } => out.push_str(&param(name)),
            }
        }
        out
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(part: &str) -> Result<Segment, String> {
    if let Some(inner) = part.strip_prefix('<') {
        let Some(inner) = inner.strip_suffix('>') else {
            return Err(format!("unterminated placeholder '{}'", part));
        };
        let (converter, name) = match inner.split_once(':') {
            Some(("int", name)) => (Converter::Int, name),
            Some(("string", name)) => (Converter::String, name),
            Some((other, _)) => return Err(format!("unknown converter '{}'", other)),
            None => (Converter::String, inner),
        };
        if !is_identifier(name) {
            return Err(format!("invalid placeholder name '{}'", name));
        }
        return Ok(Segment::Param {
            name: name.to_string(),
            converter,
        });
    }

    // axum reads a leading `:` or `*` as its own capture syntax
    if part.contains(['<', '>', '{', '}']) || part.starts_with([':', '*']) {
        return Err(format!("malformed segment '{}'", part));
    }
    Ok(Segment::Literal(part.to_string()))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
