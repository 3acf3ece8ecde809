//! Core types shared by every layer: errors, authentication context,
//! resource descriptors, storage traits and input validation

pub mod auth;
pub mod error;
pub mod resource;
pub mod service;
pub mod validation;

pub use auth::{Authenticated, RequestContext, Session, Unauthenticated};
pub use error::{ApiError, AuthError, RequestError, ResourceError, StorageError, ValidationError};
pub use resource::{Handlers, PathTemplate, Resource, ResourceModule};
pub use service::{AccountStore, FormStore};
