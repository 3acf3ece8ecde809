//! Input validation
//!
//! Field-level checks shared by the account and form services, serde helpers
//! for nullable fields, and the [`JsonBody`] extractor that turns malformed
//! bodies into typed API errors.

pub mod extractor;
pub mod nullable;
pub mod validators;

pub use extractor::{JsonBody, PathParams};
pub use validators::{is_digits, is_valid_cpf, is_valid_email, parse_iso_date, unmask_cpf};
