//! Patient search

use super::Hal;
use crate::core::auth::Authenticated;
use crate::core::error::ApiError;
use crate::core::resource::{Handlers, Resource, ResourceModule};
use crate::server::host::AppState;
use axum::extract::{Query, State};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub const MODULE: &str = "api.search";

pub struct SearchModule;

impl ResourceModule for SearchModule {
    fn name(&self) -> &str {
        MODULE
    }

    fn resources(&self) -> Vec<Arc<dyn Resource>> {
        vec![Arc::new(PatientSearch)]
    }
}

/// `/search/patients?cpf=..&display_name=..&email=..&phone=..`
pub struct PatientSearch;

impl Resource for PatientSearch {
    fn name(&self) -> &str {
        "patientsearch"
    }

    fn path(&self) -> &str {
        "/search/patients"
    }

    fn dependencies(&self) -> BTreeSet<String> {
        BTreeSet::from([super::auth::MODULE.to_string()])
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().get(search_patients)
    }
}

async fn search_patients(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Hal, ApiError> {
    let patients = state.accounts.search_patients(&session, &params).await?;
    tracing::debug!(hits = patients.len(), "patient search");
    Hal::new("/search/patients")
        .field("count", patients.len())
        .embed("patients", &patients)
}
