//! Storage traits for accounts and forms

use crate::accounts::model::{NewUser, PatientFilter, Permission, SessionRecord, User, UserChanges};
use crate::core::error::StorageError;
use crate::forms::model::{FormBody, FormKind, FormRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Storage of users, groups, permissions and sessions
///
/// Uniqueness violations (cpf, email, session token, unknown group or
/// permission references) are reported as [`StorageError::IntegrityError`];
/// the services translate them into API errors.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create a group; returns `false` when it already existed
    async fn create_group(&self, name: &str) -> Result<bool, StorageError>;

    async fn group_names(&self) -> Result<BTreeSet<String>, StorageError>;

    /// Create a permission; returns `false` when the codename already existed
    async fn create_permission(&self, permission: Permission) -> Result<bool, StorageError>;

    /// Grant a permission to every member of a group
    async fn grant(&self, group: &str, codename: &str) -> Result<(), StorageError>;

    /// Create a user and its group memberships
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError>;

    async fn find_user_by_cpf(&self, cpf: &str) -> Result<Option<User>, StorageError>;

    /// Apply changes and stamp `updated_at`; `None` when the user is missing
    async fn update_user(&self, id: i64, changes: UserChanges)
    -> Result<Option<User>, StorageError>;

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), StorageError>;

    async fn user_groups(&self, id: i64) -> Result<BTreeSet<String>, StorageError>;

    /// Union of the permissions granted to the user's groups
    async fn user_permissions(&self, id: i64) -> Result<BTreeSet<String>, StorageError>;

    /// Members of `group` matching `filter`, ordered by id
    async fn search_users(
        &self,
        group: &str,
        filter: &PatientFilter,
    ) -> Result<Vec<User>, StorageError>;

    async fn create_session(
        &self,
        user_id: i64,
        token: String,
        expire_date: DateTime<Utc>,
    ) -> Result<SessionRecord, StorageError>;

    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError>;

    /// Set the session's expire date, ending it
    async fn expire_session(&self, id: i64, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Stamp the session's last access
    async fn touch_session(&self, id: i64, at: DateTime<Utc>) -> Result<(), StorageError>;
}

/// Storage of clinical forms
///
/// Form ids come from one sequence shared by every kind.
#[async_trait]
pub trait FormStore: Send + Sync {
    /// Store a new form
    ///
    /// A second patient information form for the same user is an
    /// [`StorageError::IntegrityError`].
    async fn create_form(&self, user_id: i64, body: FormBody) -> Result<FormRecord, StorageError>;

    async fn get_form(&self, id: i64) -> Result<Option<FormRecord>, StorageError>;

    /// Replace the body and stamp `updated_at`; `None` when the form is missing
    async fn update_form(&self, id: i64, body: FormBody)
    -> Result<Option<FormRecord>, StorageError>;

    /// Kinds and ids of every form of a user, ordered by id
    async fn form_ids(&self, user_id: i64) -> Result<Vec<(FormKind, i64)>, StorageError>;
}
