//! Form resources
//!
//! Request bodies are parsed into their typed fields only after the caller
//! and the target have been checked, so a caller without permission gets
//! 403 even for a malformed form.

use super::Hal;
use crate::core::auth::Authenticated;
use crate::core::error::ApiError;
use crate::core::resource::{Handlers, Resource, ResourceModule};
use crate::core::validation::{JsonBody, PathParams};
use crate::forms::model::{
    KineticFunctionalEvaluationFields, PatientInformationFields, SociodemographicEvaluationFields,
};
use crate::forms::{
    CreateBody, FormFields, FormKind, FormRecord, StructureAndFunctionFields,
    StructureAndFunctionKind,
};
use crate::server::host::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

pub const MODULE: &str = "api.forms";

const STRUCTURE_AND_FUNCTION: &str = "structureandfunction";

type RawFields = Map<String, Value>;

pub struct FormsModule;

impl ResourceModule for FormsModule {
    fn name(&self) -> &str {
        MODULE
    }

    fn resources(&self) -> Vec<Arc<dyn Resource>> {
        vec![
            Arc::new(FormsIndex),
            Arc::new(FormCollection::<PatientInformationFields>::new()),
            Arc::new(FormView::<PatientInformationFields>::new()),
            Arc::new(FormCollection::<SociodemographicEvaluationFields>::new()),
            Arc::new(FormView::<SociodemographicEvaluationFields>::new()),
            Arc::new(FormCollection::<KineticFunctionalEvaluationFields>::new()),
            Arc::new(FormView::<KineticFunctionalEvaluationFields>::new()),
            Arc::new(StructureAndFunctionCollection),
            Arc::new(StructureAndFunctionView),
        ]
    }
}

fn auth_dependency() -> BTreeSet<String> {
    BTreeSet::from([super::auth::MODULE.to_string()])
}

fn typed<T: DeserializeOwned>(fields: RawFields) -> Result<T, ApiError> {
    Ok(serde_json::from_value(Value::Object(fields))?)
}

fn created(self_href: String, record: &FormRecord) -> Hal {
    Hal::new(self_href)
        .status(StatusCode::CREATED)
        .field("form_id", record.id)
}

// =============================================================================
// Index
// =============================================================================

/// `/forms`: links to every form resource
pub struct FormsIndex;

impl Resource for FormsIndex {
    fn name(&self) -> &str {
        "formsindex"
    }

    fn path(&self) -> &str {
        "/forms"
    }

    fn dependencies(&self) -> BTreeSet<String> {
        auth_dependency()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().get(forms_index)
    }
}

async fn forms_index() -> Hal {
    let mut hal = Hal::new("/forms").curie("forms");
    for kind in [
        FormKind::PatientInformation,
        FormKind::SociodemographicEvaluation,
        FormKind::KineticFunctionalEvaluation,
    ] {
        let segment = kind.segment();
        hal = hal
            .templated(&format!("forms:{}", segment), format!("/forms/{}", segment))
            .templated(
                &format!("forms:{}view", segment),
                format!("/forms/{}/{{form_id}}", segment),
            );
    }
    hal.templated(
        "forms:structureandfunction",
        format!("/forms/{}/{{form_t}}", STRUCTURE_AND_FUNCTION),
    )
    .templated(
        "forms:structureandfunctionview",
        format!("/forms/{}/{{form_t}}/{{form_id}}", STRUCTURE_AND_FUNCTION),
    )
}

// =============================================================================
// Single-kind forms
// =============================================================================

/// `/forms/<kind>`: create a form of one kind
pub struct FormCollection<T> {
    name: String,
    path: String,
    fields: PhantomData<fn() -> T>,
}

impl<T: FormFields> FormCollection<T> {
    pub fn new() -> Self {
        let segment = T::KIND.segment();
        Self {
            path: format!("/forms/{}", segment),
            name: segment,
            fields: PhantomData,
        }
    }
}

impl<T: FormFields> Default for FormCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FormFields> Resource for FormCollection<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn dependencies(&self) -> BTreeSet<String> {
        auth_dependency()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().post(create_form::<T>)
    }
}

async fn create_form<T: FormFields>(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    JsonBody(request): JsonBody<CreateBody<RawFields>>,
) -> Result<Hal, ApiError> {
    let record = state
        .forms
        .create(&session, request, |fields| typed::<T>(fields)?.into_body())
        .await?;
    Ok(created(format!("/forms/{}", T::KIND.segment()), &record))
}

/// `/forms/<kind>/<int:form_id>`: read and update a form of one kind
pub struct FormView<T> {
    name: String,
    path: String,
    fields: PhantomData<fn() -> T>,
}

impl<T: FormFields> FormView<T> {
    pub fn new() -> Self {
        let segment = T::KIND.segment();
        Self {
            name: format!("{}view", segment),
            path: format!("/forms/{}/<int:form_id>", segment),
            fields: PhantomData,
        }
    }
}

impl<T: FormFields> Default for FormView<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FormFields> Resource for FormView<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn dependencies(&self) -> BTreeSet<String> {
        auth_dependency()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().get(get_form::<T>).patch(update_form::<T>)
    }
}

async fn get_form<T: FormFields>(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    PathParams(form_id): PathParams<i64>,
) -> Result<Hal, ApiError> {
    let record = state.forms.get(&session, T::KIND, form_id).await?;
    Hal::new(format!("/forms/{}/{}", T::KIND.segment(), form_id)).embed("form", &record)
}

async fn update_form<T: FormFields>(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    PathParams(form_id): PathParams<i64>,
    JsonBody(fields): JsonBody<RawFields>,
) -> Result<Hal, ApiError> {
    state
        .forms
        .update(&session, T::KIND, form_id, |body| typed::<T>(fields)?.apply(body))
        .await?;
    Ok(Hal::new(format!("/forms/{}/{}", T::KIND.segment(), form_id)).field("form_id", form_id))
}

// =============================================================================
// Structure and function forms
// =============================================================================

/// `/forms/structureandfunction/<string:form_t>`
pub struct StructureAndFunctionCollection;

impl Resource for StructureAndFunctionCollection {
    fn name(&self) -> &str {
        STRUCTURE_AND_FUNCTION
    }

    fn path(&self) -> &str {
        "/forms/structureandfunction/<string:form_t>"
    }

    fn dependencies(&self) -> BTreeSet<String> {
        auth_dependency()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().post(create_structure_and_function)
    }
}

async fn create_structure_and_function(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    PathParams(form_t): PathParams<String>,
    JsonBody(request): JsonBody<CreateBody<RawFields>>,
) -> Result<Hal, ApiError> {
    let kind = StructureAndFunctionKind::from_path(&form_t)?;
    let record = state
        .forms
        .create(&session, request, |fields| {
            typed::<StructureAndFunctionFields>(fields)?.into_form(kind)
        })
        .await?;
    Ok(created(
        format!("/forms/{}/{}", STRUCTURE_AND_FUNCTION, kind),
        &record,
    ))
}

/// `/forms/structureandfunction/<string:form_t>/<int:form_id>`
pub struct StructureAndFunctionView;

impl Resource for StructureAndFunctionView {
    fn name(&self) -> &str {
        "structureandfunctionview"
    }

    fn path(&self) -> &str {
        "/forms/structureandfunction/<string:form_t>/<int:form_id>"
    }

    fn dependencies(&self) -> BTreeSet<String> {
        auth_dependency()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new()
            .get(get_structure_and_function)
            .patch(update_structure_and_function)
    }
}

async fn get_structure_and_function(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    PathParams((form_t, form_id)): PathParams<(String, i64)>,
) -> Result<Hal, ApiError> {
    let kind = StructureAndFunctionKind::from_path(&form_t)?;
    let record = state.forms.get(&session, kind.form_kind(), form_id).await?;
    Hal::new(format!("/forms/{}/{}/{}", STRUCTURE_AND_FUNCTION, kind, form_id))
        .embed("form", &record)
}

async fn update_structure_and_function(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    PathParams((form_t, form_id)): PathParams<(String, i64)>,
    JsonBody(fields): JsonBody<RawFields>,
) -> Result<Hal, ApiError> {
    let kind = StructureAndFunctionKind::from_path(&form_t)?;
    state
        .forms
        .update(&session, kind.form_kind(), form_id, |body| {
            typed::<StructureAndFunctionFields>(fields)?.apply_to(body)
        })
        .await?;
    Ok(
        Hal::new(format!("/forms/{}/{}/{}", STRUCTURE_AND_FUNCTION, kind, form_id))
            .field("form_id", form_id),
    )
}
