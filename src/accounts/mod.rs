//! Users, sessions and patient search

pub mod model;
pub mod service;

pub use model::{NewUser, PatientFilter, Permission, SessionRecord, User, UserChanges};
pub use service::{
    AccountPatch, AccountService, AccountView, LoginOutcome, LoginRequest, LogoutRequest,
    PatientSummary, SignupRequest, parse_patient_filter,
};
