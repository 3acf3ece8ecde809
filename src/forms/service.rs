//! Form operations with their permission checks

use super::model::{CreateBody, FormBody, FormKind, FormRecord};
use crate::core::auth::{CHANGE_FORM_DATA, CREATE_FORM, PATIENT_GROUP, READ_FORM_DATA, Session};
use crate::core::error::{ApiError, ResourceError, StorageError};
use crate::core::service::{AccountStore, FormStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct FormService {
    accounts: Arc<dyn AccountStore>,
    forms: Arc<dyn FormStore>,
}

impl FormService {
    pub fn new(accounts: Arc<dyn AccountStore>, forms: Arc<dyn FormStore>) -> Self {
        Self { accounts, forms }
    }

    /// Create a form for a patient
    ///
    /// The body is built only after the caller and the target user have been
    /// checked, so permission and target errors win over field errors.
    pub async fn create<T, F>(
        &self,
        session: &Session,
        request: CreateBody<T>,
        build: F,
    ) -> Result<FormRecord, ApiError>
    where
        F: FnOnce(T) -> Result<FormBody, ApiError>,
    {
        session.require([CREATE_FORM])?;

        let user_id = request.user_id()?;
        if self.accounts.get_user(user_id).await?.is_none() {
            return Err(ResourceError::UserNotFound { id: user_id }.into());
        }
        if !self.accounts.user_groups(user_id).await?.contains(PATIENT_GROUP) {
            return Err(ApiError::invalid("target user is not a patient"));
        }

        let body = build(request.fields)?;
        let kind = body.kind();

        let record = self
            .forms
            .create_form(user_id, body)
            .await
            .map_err(|err| match err {
                StorageError::IntegrityError { .. } => ResourceError::FormAlreadyExists.into(),
                other => ApiError::from(other),
            })?;

        tracing::info!(form_id = record.id, user_id, %kind, "form created");
        Ok(record)
    }

    /// Read a form of the given kind
    ///
    /// Patients read their own forms freely; anyone else needs
    /// `read_form_data`.
    pub async fn get(
        &self,
        session: &Session,
        kind: FormKind,
        id: i64,
    ) -> Result<FormRecord, ApiError> {
        let record = self.load(kind, id).await?;
        if record.user_id != session.user_id {
            session.require([READ_FORM_DATA])?;
        }
        Ok(record)
    }

    /// Apply a partial update to a form of the given kind
    pub async fn update<F>(
        &self,
        session: &Session,
        kind: FormKind,
        id: i64,
        apply: F,
    ) -> Result<FormRecord, ApiError>
    where
        F: FnOnce(&mut FormBody) -> Result<(), ApiError>,
    {
        session.require([CHANGE_FORM_DATA])?;

        let mut record = self.load(kind, id).await?;
        apply(&mut record.body)?;

        let record = self
            .forms
            .update_form(id, record.body)
            .await?
            .ok_or(ResourceError::FormNotFound { id })?;

        tracing::info!(form_id = id, changed_by = session.user_id, %kind, "form updated");
        Ok(record)
    }

    // A form of another kind is reported as missing
    async fn load(&self, kind: FormKind, id: i64) -> Result<FormRecord, ApiError> {
        self.forms
            .get_form(id)
            .await?
            .filter(|record| record.kind() == kind)
            .ok_or_else(|| ResourceError::FormNotFound { id }.into())
    }
}
