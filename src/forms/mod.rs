//! Clinical forms attached to patients

pub mod model;
pub mod service;

pub use model::{
    CreateBody, FormBody, FormFields, FormKind, FormRecord, StructureAndFunctionFields,
    StructureAndFunctionKind,
};
pub use service::FormService;
