//! Server module: assembling resource modules into an HTTP application
//!
//! - [`assembler`] walks the module graph from an entry module
//! - [`registry`] holds the resources bound during assembly
//! - [`hooks`] runs the modules' request lifecycle hooks
//! - [`builder`] and [`host`] turn the result into a served `Router`

pub mod assembler;
pub mod builder;
pub mod hooks;
pub mod host;
pub mod registry;

pub use assembler::{AssemblyError, AssemblyReport, Duplicate, ModuleCatalog, assemble};
pub use builder::ServerBuilder;
pub use hooks::{AfterRequestHook, BeforeRequestHook, HookChain};
pub use host::{AppState, ServerHost};
pub use registry::ResourceRegistry;
