//! In-memory implementation of the account and form stores

use crate::accounts::model::{NewUser, PatientFilter, Permission, SessionRecord, User, UserChanges};
use crate::core::error::StorageError;
use crate::core::service::{AccountStore, FormStore};
use crate::forms::model::{FormBody, FormKind, FormRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct AccountTables {
    next_user_id: i64,
    next_session_id: i64,
    users: BTreeMap<i64, User>,
    /// group name -> granted permission codenames
    groups: IndexMap<String, BTreeSet<String>>,
    permissions: IndexMap<String, Permission>,
    memberships: HashMap<i64, BTreeSet<String>>,
    sessions: HashMap<i64, SessionRecord>,
    tokens: HashMap<String, i64>,
}

impl AccountTables {
    fn cpf_taken(&self, cpf: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.cpf == cpf)
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.as_deref() == Some(email))
    }
}

#[derive(Default)]
struct FormTables {
    next_id: i64,
    forms: BTreeMap<i64, FormRecord>,
}

fn integrity(message: impl Into<String>) -> StorageError {
    StorageError::IntegrityError {
        message: message.into(),
    }
}

/// Store keeping every table in memory
///
/// Useful for tests, development and single-process deployments. Clones
/// share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    accounts: Arc<RwLock<AccountTables>>,
    forms: Arc<RwLock<FormTables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_accounts(&self) -> Result<RwLockReadGuard<'_, AccountTables>, StorageError> {
        self.accounts
            .read()
            .map_err(|e| StorageError::TransactionError {
                message: format!("Failed to acquire read lock: {}", e),
            })
    }

    fn write_accounts(&self) -> Result<RwLockWriteGuard<'_, AccountTables>, StorageError> {
        self.accounts
            .write()
            .map_err(|e| StorageError::TransactionError {
                message: format!("Failed to acquire write lock: {}", e),
            })
    }

    fn read_forms(&self) -> Result<RwLockReadGuard<'_, FormTables>, StorageError> {
        self.forms.read().map_err(|e| StorageError::TransactionError {
            message: format!("Failed to acquire read lock: {}", e),
        })
    }

    fn write_forms(&self) -> Result<RwLockWriteGuard<'_, FormTables>, StorageError> {
        self.forms.write().map_err(|e| StorageError::TransactionError {
            message: format!("Failed to acquire write lock: {}", e),
        })
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn create_group(&self, name: &str) -> Result<bool, StorageError> {
        let mut tables = self.write_accounts()?;
        if tables.groups.contains_key(name) {
            return Ok(false);
        }
        tables.groups.insert(name.to_string(), BTreeSet::new());
        Ok(true)
    }

    async fn group_names(&self) -> Result<BTreeSet<String>, StorageError> {
        let tables = self.read_accounts()?;
        Ok(tables.groups.keys().cloned().collect())
    }

    async fn create_permission(&self, permission: Permission) -> Result<bool, StorageError> {
        let mut tables = self.write_accounts()?;
        if tables.permissions.contains_key(&permission.codename) {
            return Ok(false);
        }
        tables
            .permissions
            .insert(permission.codename.clone(), permission);
        Ok(true)
    }

    async fn grant(&self, group: &str, codename: &str) -> Result<(), StorageError> {
        let mut tables = self.write_accounts()?;
        if !tables.permissions.contains_key(codename) {
            return Err(integrity(format!("unknown permission {}", codename)));
        }
        let granted = tables
            .groups
            .get_mut(group)
            .ok_or_else(|| integrity(format!("unknown group {}", group)))?;
        granted.insert(codename.to_string());
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let mut tables = self.write_accounts()?;

        if tables.cpf_taken(&user.cpf, None) {
            return Err(integrity("cpf already registered"));
        }
        if let Some(email) = &user.email {
            if tables.email_taken(email, None) {
                return Err(integrity("email already registered"));
            }
        }
        if let Some(unknown) = user.groups.iter().find(|g| !tables.groups.contains_key(*g)) {
            return Err(integrity(format!("unknown group {}", unknown)));
        }

        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            cpf: user.cpf,
            password_hash: user.password_hash,
            display_name: user.display_name,
            phone: user.phone,
            email: user.email,
            is_active: true,
            verified_at: None,
            deactivated_at: None,
            last_login: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        tables.users.insert(created.id, created.clone());
        tables.memberships.insert(created.id, user.groups);

        Ok(created)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        let tables = self.read_accounts()?;
        Ok(tables.users.get(&id).cloned())
    }

    async fn find_user_by_cpf(&self, cpf: &str) -> Result<Option<User>, StorageError> {
        let tables = self.read_accounts()?;
        Ok(tables.users.values().find(|u| u.cpf == cpf).cloned())
    }

    async fn update_user(
        &self,
        id: i64,
        changes: UserChanges,
    ) -> Result<Option<User>, StorageError> {
        let mut tables = self.write_accounts()?;

        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        if let Some(cpf) = &changes.cpf {
            if tables.cpf_taken(cpf, Some(id)) {
                return Err(integrity("cpf already registered"));
            }
        }
        if let Some(Some(email)) = &changes.email {
            if tables.email_taken(email, Some(id)) {
                return Err(integrity("email already registered"));
            }
        }

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(cpf) = changes.cpf {
            user.cpf = cpf;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(display_name) = changes.display_name {
            user.display_name = display_name;
        }
        if let Some(phone) = changes.phone {
            user.phone = phone;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        user.updated_at = Some(Utc::now());

        Ok(Some(user.clone()))
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut tables = self.write_accounts()?;
        if let Some(user) = tables.users.get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn user_groups(&self, id: i64) -> Result<BTreeSet<String>, StorageError> {
        let tables = self.read_accounts()?;
        Ok(tables.memberships.get(&id).cloned().unwrap_or_default())
    }

    async fn user_permissions(&self, id: i64) -> Result<BTreeSet<String>, StorageError> {
        let tables = self.read_accounts()?;
        let Some(groups) = tables.memberships.get(&id) else {
            return Ok(BTreeSet::new());
        };
        Ok(groups
            .iter()
            .filter_map(|g| tables.groups.get(g))
            .flatten()
            .cloned()
            .collect())
    }

    async fn search_users(
        &self,
        group: &str,
        filter: &PatientFilter,
    ) -> Result<Vec<User>, StorageError> {
        let tables = self.read_accounts()?;
        Ok(tables
            .users
            .values()
            .filter(|u| {
                tables
                    .memberships
                    .get(&u.id)
                    .is_some_and(|groups| groups.contains(group))
            })
            .filter(|u| filter.matches(u))
            .cloned()
            .collect())
    }

    async fn create_session(
        &self,
        user_id: i64,
        token: String,
        expire_date: DateTime<Utc>,
    ) -> Result<SessionRecord, StorageError> {
        let mut tables = self.write_accounts()?;

        if tables.tokens.contains_key(&token) {
            return Err(integrity("session token already issued"));
        }
        if !tables.users.contains_key(&user_id) {
            return Err(integrity(format!("unknown user {}", user_id)));
        }

        tables.next_session_id += 1;
        let session = SessionRecord {
            id: tables.next_session_id,
            user_id,
            token: token.clone(),
            last_access: None,
            expire_date,
            created_at: Utc::now(),
        };
        tables.tokens.insert(token, session.id);
        tables.sessions.insert(session.id, session.clone());

        Ok(session)
    }

    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError> {
        let tables = self.read_accounts()?;
        Ok(tables
            .tokens
            .get(token)
            .and_then(|id| tables.sessions.get(id))
            .cloned())
    }

    async fn expire_session(&self, id: i64, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut tables = self.write_accounts()?;
        let session = tables
            .sessions
            .get_mut(&id)
            .ok_or_else(|| integrity(format!("unknown session {}", id)))?;
        session.expire_date = at;
        Ok(())
    }

    async fn touch_session(&self, id: i64, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut tables = self.write_accounts()?;
        if let Some(session) = tables.sessions.get_mut(&id) {
            session.last_access = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl FormStore for InMemoryStore {
    async fn create_form(&self, user_id: i64, body: FormBody) -> Result<FormRecord, StorageError> {
        let mut tables = self.write_forms()?;

        if body.kind() == FormKind::PatientInformation
            && tables
                .forms
                .values()
                .any(|f| f.user_id == user_id && f.kind() == FormKind::PatientInformation)
        {
            return Err(integrity("patient information already exists"));
        }

        tables.next_id += 1;
        let record = FormRecord {
            id: tables.next_id,
            user_id,
            body,
            updated_at: None,
            created_at: Utc::now(),
        };
        tables.forms.insert(record.id, record.clone());

        Ok(record)
    }

    async fn get_form(&self, id: i64) -> Result<Option<FormRecord>, StorageError> {
        let tables = self.read_forms()?;
        Ok(tables.forms.get(&id).cloned())
    }

    async fn update_form(
        &self,
        id: i64,
        body: FormBody,
    ) -> Result<Option<FormRecord>, StorageError> {
        let mut tables = self.write_forms()?;
        let Some(record) = tables.forms.get_mut(&id) else {
            return Ok(None);
        };
        if record.kind() != body.kind() {
            return Err(integrity(format!(
                "form {} is a {}, not a {}",
                id,
                record.kind(),
                body.kind()
            )));
        }
        record.body = body;
        record.updated_at = Some(Utc::now());
        Ok(Some(record.clone()))
    }

    async fn form_ids(&self, user_id: i64) -> Result<Vec<(FormKind, i64)>, StorageError> {
        let tables = self.read_forms()?;
        Ok(tables
            .forms
            .values()
            .filter(|f| f.user_id == user_id)
            .map(|f| (f.kind(), f.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::model::{Measure, MeasureType, StructureAndFunction, StructureAndFunctionKind};
    use chrono::{Duration, NaiveDate};

    fn new_user(cpf: &str, email: Option<&str>, groups: &[&str]) -> NewUser {
        NewUser {
            cpf: cpf.to_string(),
            password_hash: "hash".to_string(),
            display_name: "Someone".to_string(),
            phone: "5511900000000".to_string(),
            email: email.map(str::to_string),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    async fn store_with_groups() -> InMemoryStore {
        let store = InMemoryStore::new();
        for group in ["admin", "patient"] {
            store.create_group(group).await.unwrap();
        }
        store
    }

    fn strength(date: (i32, u32, u32)) -> FormBody {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        FormBody::StructureAndFunction(StructureAndFunction::new(
            StructureAndFunctionKind::MuscleStrength,
            vec![Measure {
                measure_type: Some(MeasureType::LeftSide),
                sensory_type: None,
                target: Some("Bíceps".to_string()),
                value: "4".to_string(),
                date,
            }],
        ))
    }

    #[tokio::test]
    async fn test_groups_and_permissions() {
        let store = store_with_groups().await;
        assert!(!store.create_group("admin").await.unwrap());
        assert!(
            store
                .create_permission(Permission::new("create_patient", "Create patient", ""))
                .await
                .unwrap()
        );
        store.grant("admin", "create_patient").await.unwrap();

        assert!(matches!(
            store.grant("nobody", "create_patient").await,
            Err(StorageError::IntegrityError { .. })
        ));
        assert!(matches!(
            store.grant("admin", "fly").await,
            Err(StorageError::IntegrityError { .. })
        ));

        let user = store
            .create_user(new_user("52998224725", None, &["admin"]))
            .await
            .unwrap();
        let permissions = store.user_permissions(user.id).await.unwrap();
        assert!(permissions.contains("create_patient"));
        assert_eq!(
            store.user_groups(user.id).await.unwrap(),
            BTreeSet::from(["admin".to_string()])
        );
    }

    #[tokio::test]
    async fn test_unique_cpf_and_email() {
        let store = store_with_groups().await;
        store
            .create_user(new_user("52998224725", Some("a@b.c"), &["patient"]))
            .await
            .unwrap();

        let same_cpf = store
            .create_user(new_user("52998224725", None, &["patient"]))
            .await;
        assert!(matches!(same_cpf, Err(StorageError::IntegrityError { .. })));

        let same_email = store
            .create_user(new_user("11144477735", Some("a@b.c"), &["patient"]))
            .await;
        assert!(matches!(same_email, Err(StorageError::IntegrityError { .. })));

        let unknown_group = store
            .create_user(new_user("11144477735", None, &["ghost"]))
            .await;
        assert!(matches!(unknown_group, Err(StorageError::IntegrityError { .. })));
    }

    #[tokio::test]
    async fn test_update_user_checks_uniqueness_against_others_only() {
        let store = store_with_groups().await;
        let first = store
            .create_user(new_user("52998224725", Some("first@x.y"), &["patient"]))
            .await
            .unwrap();
        store
            .create_user(new_user("11144477735", Some("second@x.y"), &["patient"]))
            .await
            .unwrap();

        let own_email = UserChanges {
            email: Some(Some("first@x.y".to_string())),
            ..Default::default()
        };
        let updated = store
            .update_user(first.id, own_email)
            .await
            .unwrap()
            .expect("user exists");
        assert!(updated.updated_at.is_some());

        let clash = UserChanges {
            cpf: Some("11144477735".to_string()),
            ..Default::default()
        };
        assert!(store.update_user(first.id, clash).await.is_err());

        assert!(
            store
                .update_user(999, UserChanges::default())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_search_is_restricted_to_group() {
        let store = store_with_groups().await;
        store
            .create_user(new_user("52998224725", None, &["admin"]))
            .await
            .unwrap();
        let patient = store
            .create_user(new_user("11144477735", None, &["patient"]))
            .await
            .unwrap();

        let found = store
            .search_users("patient", &PatientFilter::default())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, patient.id);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = store_with_groups().await;
        let user = store
            .create_user(new_user("52998224725", None, &["patient"]))
            .await
            .unwrap();
        let expires = Utc::now() + Duration::days(1);

        let session = store
            .create_session(user.id, "t".repeat(128), expires)
            .await
            .unwrap();
        assert!(
            store
                .create_session(user.id, "t".repeat(128), expires)
                .await
                .is_err()
        );

        let now = Utc::now();
        store.touch_session(session.id, now).await.unwrap();
        store.expire_session(session.id, now).await.unwrap();

        let found = store
            .find_session(&"t".repeat(128))
            .await
            .unwrap()
            .expect("session stored");
        assert_eq!(found.last_access, Some(now));
        assert!(found.is_expired(now));
        assert!(store.find_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_form_ids_share_one_sequence() {
        let store = InMemoryStore::new();
        let first = store.create_form(1, strength((2020, 1, 1))).await.unwrap();
        let second = store.create_form(2, strength((2020, 1, 2))).await.unwrap();
        let third = store.create_form(1, strength((2020, 1, 3))).await.unwrap();
        assert_eq!((first.id, second.id, third.id), (1, 2, 3));

        assert_eq!(
            store.form_ids(1).await.unwrap(),
            vec![(FormKind::MuscleStrength, 1), (FormKind::MuscleStrength, 3)]
        );
    }

    #[tokio::test]
    async fn test_update_form_stamps_and_keeps_kind() {
        let store = InMemoryStore::new();
        let record = store.create_form(1, strength((2020, 1, 1))).await.unwrap();
        assert!(record.updated_at.is_none());

        let updated = store
            .update_form(record.id, strength((2021, 1, 1)))
            .await
            .unwrap()
            .expect("form exists");
        assert!(updated.updated_at.is_some());
        assert_eq!(updated.created_at, record.created_at);

        assert!(store.update_form(42, strength((2020, 1, 1))).await.unwrap().is_none());
    }
}
