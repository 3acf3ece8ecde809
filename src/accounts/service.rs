//! Account operations: login, sessions, signup, reads, updates and search

use super::model::{NewUser, PatientFilter, User, UserChanges};
use crate::config::SessionConfig;
use crate::core::auth::{
    PATIENT_GROUP, SEARCH_PATIENT, Session, change_data_permission, create_permission,
    read_data_permission,
};
use crate::core::error::{ApiError, AuthError, RequestError, ResourceError, StorageError};
use crate::core::service::{AccountStore, FormStore};
use crate::core::validation::nullable::{patch, present};
use crate::core::validation::validators::mask_cpf;
use crate::core::validation::{is_digits, is_valid_cpf, is_valid_email, unmask_cpf};
use crate::forms::model::FormKind;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use validator::Validate;

/// Random bytes behind a session token (hex encoded to 128 characters)
const TOKEN_BYTES: usize = 64;

const TOKEN_ATTEMPTS: usize = 3;

const SEARCH_KEYS: [&str; 4] = ["cpf", "display_name", "email", "phone"];

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub cpf: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    pub cpf: String,
    #[validate(length(min = 1, message = "password is empty"))]
    pub password: String,
    #[validate(length(min = 1, message = "display_name is empty"))]
    pub display_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub user_group_names: Vec<String>,
}

/// Partial account update; absent fields are left untouched
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AccountPatch {
    #[serde(default, deserialize_with = "present")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(min = 1, message = "password is empty"))]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(min = 1, message = "display_name is empty"))]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "patch")]
    pub email: Option<Option<String>>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub user_id: i64,
}

/// Form ids of one kind; patient information is a single id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormIds {
    One(i64),
    Many(Vec<i64>),
}

/// A user as returned by the account resource
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub id: i64,
    pub cpf: String,
    pub display_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub groups: Vec<String>,
    pub forms: IndexMap<&'static str, Option<FormIds>>,
    pub last_login: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientSummary {
    pub id: i64,
    pub cpf: String,
    pub display_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub groups: Vec<String>,
}

// =============================================================================
// Field checks
// =============================================================================

fn checked_cpf(cpf: &str) -> Result<String, ApiError> {
    let cpf = unmask_cpf(cpf);
    if is_valid_cpf(&cpf) {
        Ok(cpf)
    } else {
        Err(ApiError::invalid("invalid cpf"))
    }
}

fn check_phone(phone: &str) -> Result<(), ApiError> {
    if is_digits(phone) {
        Ok(())
    } else {
        Err(ApiError::invalid("invalid phone"))
    }
}

fn check_email(email: &str) -> Result<(), ApiError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ApiError::invalid("invalid email"))
    }
}

fn user_conflict(err: StorageError) -> ApiError {
    match err {
        StorageError::IntegrityError { .. } => ResourceError::UserAlreadyExists.into(),
        other => other.into(),
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Parse patient search query parameters
pub fn parse_patient_filter(params: &HashMap<String, String>) -> Result<PatientFilter, ApiError> {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    if let Some(unknown) = keys.iter().find(|k| !SEARCH_KEYS.contains(&k.as_str())) {
        return Err(RequestError::UnknownQueryParameter {
            name: unknown.to_string(),
        }
        .into());
    }

    let filter = PatientFilter {
        cpf: params.get("cpf").cloned(),
        display_name: params.get("display_name").cloned(),
        email: params.get("email").cloned(),
        phone: params.get("phone").cloned(),
    };

    if filter.cpf.as_deref().is_some_and(|p| !is_digits(p)) {
        return Err(ApiError::invalid("invalid cpf prefix"));
    }
    if filter.phone.as_deref().is_some_and(|p| !is_digits(p)) {
        return Err(ApiError::invalid("invalid phone prefix"));
    }

    Ok(filter)
}

// =============================================================================
// Service
// =============================================================================

/// Account operations on behalf of a caller
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    forms: Arc<dyn FormStore>,
    settings: SessionConfig,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        forms: Arc<dyn FormStore>,
        settings: SessionConfig,
    ) -> Self {
        Self {
            accounts,
            forms,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.accounts
    }

    /// Check credentials and open a session
    pub async fn login(&self, cpf: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let cpf = checked_cpf(cpf)?;

        let user = self
            .accounts
            .find_user_by_cpf(&cpf)
            .await?
            .ok_or(AuthError::UserDoesNotExist)?;

        if !bcrypt::verify(password, &user.password_hash)? {
            return Err(AuthError::WrongPassword.into());
        }

        let now = Utc::now();
        let expire_date = now + Duration::days(self.settings.lifetime_days);

        let mut attempt = 0;
        let session = loop {
            attempt += 1;
            match self
                .accounts
                .create_session(user.id, generate_token(), expire_date)
                .await
            {
                Ok(session) => break session,
                Err(StorageError::IntegrityError { .. }) if attempt < TOKEN_ATTEMPTS => {
                    tracing::warn!(user_id = user.id, "session token collision, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        };

        self.accounts.record_login(user.id, now).await?;
        tracing::info!(user_id = user.id, session_id = session.id, "session created");

        Ok(LoginOutcome {
            token: session.token,
            user_id: user.id,
        })
    }

    /// Turn a session token into the caller's [`Session`]
    pub async fn resolve_session(&self, token: &str) -> Result<Session, ApiError> {
        let record = self
            .accounts
            .find_session(token)
            .await?
            .ok_or(AuthError::InvalidSessionToken)?;

        if record.is_expired(Utc::now()) {
            return Err(AuthError::ExpiredToken.into());
        }

        Ok(Session {
            id: record.id,
            groups: self.accounts.user_groups(record.user_id).await?,
            permissions: self.accounts.user_permissions(record.user_id).await?,
            token: record.token,
            user_id: record.user_id,
            expire_date: record.expire_date,
        })
    }

    /// Stamp the last access of a session
    pub async fn touch(&self, session: &Session) -> Result<(), ApiError> {
        self.accounts
            .touch_session(session.id, Utc::now())
            .await
            .map_err(ApiError::from)
    }

    /// End the caller's own session; returns its user id
    pub async fn logout(&self, session: &Session, token: &str) -> Result<i64, ApiError> {
        let target = self
            .accounts
            .find_session(token)
            .await?
            .ok_or(AuthError::InvalidSessionToken)?;

        if target.id != session.id {
            return Err(AuthError::InvalidSession.into());
        }

        self.accounts.expire_session(target.id, Utc::now()).await?;
        tracing::info!(user_id = target.user_id, session_id = target.id, "session expired");

        Ok(target.user_id)
    }

    /// Create a user in the requested groups; returns the new id
    pub async fn signup(&self, session: &Session, request: SignupRequest) -> Result<i64, ApiError> {
        let cpf = checked_cpf(&request.cpf)?;
        check_phone(&request.phone)?;
        if let Some(email) = &request.email {
            check_email(email)?;
        }
        request.validate()?;

        let groups: BTreeSet<String> = request.user_group_names.iter().cloned().collect();
        let known = self.accounts.group_names().await?;
        if groups.len() != request.user_group_names.len() || !groups.is_subset(&known) {
            return Err(ApiError::invalid("invalid user_group_names"));
        }

        session.require(groups.iter().map(|g| create_permission(g)))?;

        let password_hash = bcrypt::hash(&request.password, self.settings.hash_cost)?;

        let user = self
            .accounts
            .create_user(NewUser {
                cpf,
                password_hash,
                display_name: request.display_name,
                phone: request.phone,
                email: request.email,
                groups,
            })
            .await
            .map_err(user_conflict)?;

        tracing::info!(user_id = user.id, created_by = session.user_id, "user created");
        Ok(user.id)
    }

    /// Read a user; reading one's own account needs no permission
    pub async fn get_account(
        &self,
        session: &Session,
        user_id: i64,
    ) -> Result<AccountView, ApiError> {
        let groups = self.accounts.user_groups(user_id).await?;

        if user_id != session.user_id {
            session.require(groups.iter().map(|g| read_data_permission(g)))?;
        }

        let user = self
            .accounts
            .get_user(user_id)
            .await?
            .ok_or(ResourceError::UserNotFound { id: user_id })?;

        let forms = self.form_ids(user_id).await?;
        Ok(Self::view(user, groups, forms))
    }

    /// Apply a partial update to a user
    pub async fn update_account(
        &self,
        session: &Session,
        user_id: i64,
        request: AccountPatch,
    ) -> Result<(), ApiError> {
        let cpf = request.cpf.as_deref().map(checked_cpf).transpose()?;
        if let Some(phone) = &request.phone {
            check_phone(phone)?;
        }
        if let Some(Some(email)) = &request.email {
            check_email(email)?;
        }
        request.validate()?;

        let groups = self.accounts.user_groups(user_id).await?;
        session.require(groups.iter().map(|g| change_data_permission(g)))?;

        let password_hash = match &request.password {
            Some(password) => Some(bcrypt::hash(password, self.settings.hash_cost)?),
            None => None,
        };

        let changes = UserChanges {
            cpf,
            password_hash,
            display_name: request.display_name,
            phone: request.phone,
            email: request.email,
        };

        self.accounts
            .update_user(user_id, changes)
            .await
            .map_err(user_conflict)?
            .ok_or(ResourceError::UserNotFound { id: user_id })?;

        tracing::info!(user_id, changed_by = session.user_id, "user updated");
        Ok(())
    }

    /// Patients matching the query parameters, ordered by id
    pub async fn search_patients(
        &self,
        session: &Session,
        params: &HashMap<String, String>,
    ) -> Result<Vec<PatientSummary>, ApiError> {
        session.require([SEARCH_PATIENT])?;
        let filter = parse_patient_filter(params)?;

        let users = self.accounts.search_users(PATIENT_GROUP, &filter).await?;
        let mut results = Vec::with_capacity(users.len());
        for user in users {
            let groups = self.accounts.user_groups(user.id).await?;
            results.push(PatientSummary {
                id: user.id,
                cpf: user.cpf,
                display_name: user.display_name,
                phone: user.phone,
                email: user.email,
                groups: groups.into_iter().collect(),
            });
        }
        Ok(results)
    }

    async fn form_ids(
        &self,
        user_id: i64,
    ) -> Result<IndexMap<&'static str, Option<FormIds>>, ApiError> {
        let stored = self.forms.form_ids(user_id).await?;

        Ok(FormKind::ALL
            .iter()
            .map(|kind| {
                let ids: Vec<i64> = stored
                    .iter()
                    .filter(|(k, _)| k == kind)
                    .map(|(_, id)| *id)
                    .collect();
                let entry = match (kind, ids.as_slice()) {
                    (_, []) => None,
                    (FormKind::PatientInformation, [id, ..]) => Some(FormIds::One(*id)),
                    _ => Some(FormIds::Many(ids)),
                };
                (kind.as_str(), entry)
            })
            .collect())
    }

    fn view(
        user: User,
        groups: BTreeSet<String>,
        forms: IndexMap<&'static str, Option<FormIds>>,
    ) -> AccountView {
        AccountView {
            id: user.id,
            cpf: mask_cpf(&user.cpf).unwrap_or(user.cpf),
            display_name: user.display_name,
            phone: user.phone,
            email: user.email,
            is_active: user.is_active,
            groups: groups.into_iter().collect(),
            forms,
            last_login: user.last_login,
            verified_at: user.verified_at,
            deactivated_at: user.deactivated_at,
            updated_at: user.updated_at,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::{InMemoryStore, seed_defaults};

    const ATTENDANT_CPF: &str = "11144477735";
    const PATIENT_CPF: &str = "52998224725";

    struct Fixture {
        service: AccountService,
        attendant: Session,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let mut config = AppConfig::default();
        config.session.hash_cost = 4;
        seed_defaults(&store, &config).await.unwrap();

        let store = Arc::new(store);
        let service = AccountService::new(store.clone(), store.clone(), config.session.clone());

        let hash = bcrypt::hash("attendant-pw", 4).unwrap();
        let attendant = store
            .create_user(NewUser {
                cpf: ATTENDANT_CPF.to_string(),
                password_hash: hash,
                display_name: "Attendant".to_string(),
                phone: "5511911111111".to_string(),
                email: Some("attendant@clinic.org".to_string()),
                groups: BTreeSet::from(["attendant".to_string()]),
            })
            .await
            .unwrap();

        let outcome = service.login(ATTENDANT_CPF, "attendant-pw").await.unwrap();
        assert_eq!(outcome.user_id, attendant.id);
        let attendant = service.resolve_session(&outcome.token).await.unwrap();

        Fixture { service, attendant }
    }

    fn patient_signup() -> SignupRequest {
        SignupRequest {
            cpf: "529.982.247-25".to_string(),
            password: "patient-pw".to_string(),
            display_name: "Maria Souza".to_string(),
            phone: "5511988887777".to_string(),
            email: Some("maria@mail.org".to_string()),
            user_group_names: vec!["patient".to_string()],
        }
    }

    // ── login and sessions ──

    #[tokio::test]
    async fn test_login_issues_hex_token() {
        let f = fixture().await;
        let outcome = f.service.login(ATTENDANT_CPF, "attendant-pw").await.unwrap();
        assert_eq!(outcome.token.len(), 128);
        assert!(outcome.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(outcome.token, f.attendant.token);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let f = fixture().await;
        assert_eq!(
            f.service.login("123", "x").await.unwrap_err().to_string(),
            "invalid cpf"
        );
        assert!(matches!(
            f.service.login(PATIENT_CPF, "x").await,
            Err(ApiError::Auth(AuthError::UserDoesNotExist))
        ));
        assert!(matches!(
            f.service.login(ATTENDANT_CPF, "wrong").await,
            Err(ApiError::Auth(AuthError::WrongPassword))
        ));
    }

    #[tokio::test]
    async fn test_resolved_session_carries_group_permissions() {
        let f = fixture().await;
        assert!(f.attendant.groups.contains("attendant"));
        assert!(f.attendant.has_permission("create_patient"));
        assert!(!f.attendant.has_permission("create_form"));
    }

    #[tokio::test]
    async fn test_unknown_and_expired_tokens() {
        let f = fixture().await;
        assert!(matches!(
            f.service.resolve_session("nope").await,
            Err(ApiError::Auth(AuthError::InvalidSessionToken))
        ));

        f.service.logout(&f.attendant, &f.attendant.token).await.unwrap();
        assert!(matches!(
            f.service.resolve_session(&f.attendant.token).await,
            Err(ApiError::Auth(AuthError::ExpiredToken))
        ));
    }

    #[tokio::test]
    async fn test_logout_of_another_session_is_rejected() {
        let f = fixture().await;
        let other = f.service.login(ATTENDANT_CPF, "attendant-pw").await.unwrap();
        assert!(matches!(
            f.service.logout(&f.attendant, &other.token).await,
            Err(ApiError::Auth(AuthError::InvalidSession))
        ));
    }

    // ── signup ──

    #[tokio::test]
    async fn test_signup_patient() {
        let f = fixture().await;
        let id = f.service.signup(&f.attendant, patient_signup()).await.unwrap();

        let view = f.service.get_account(&f.attendant, id).await.unwrap();
        assert_eq!(view.cpf, "529.982.247-25");
        assert_eq!(view.groups, vec!["patient".to_string()]);
        assert_eq!(view.forms.len(), 9);
        assert!(view.forms.values().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let f = fixture().await;

        let mut request = patient_signup();
        request.phone = "+55 11".to_string();
        assert_eq!(
            f.service.signup(&f.attendant, request).await.unwrap_err().to_string(),
            "invalid phone"
        );

        let mut request = patient_signup();
        request.email = Some("maria".to_string());
        assert_eq!(
            f.service.signup(&f.attendant, request).await.unwrap_err().to_string(),
            "invalid email"
        );

        let mut request = patient_signup();
        request.display_name = String::new();
        assert!(matches!(
            f.service.signup(&f.attendant, request).await,
            Err(ApiError::Validation(_))
        ));

        let mut request = patient_signup();
        request.user_group_names = vec!["patient".to_string(), "patient".to_string()];
        assert_eq!(
            f.service.signup(&f.attendant, request).await.unwrap_err().to_string(),
            "invalid user_group_names"
        );
    }

    #[tokio::test]
    async fn test_signup_requires_create_permission_per_group() {
        let f = fixture().await;
        let mut request = patient_signup();
        request.user_group_names = vec!["admin".to_string()];
        assert!(matches!(
            f.service.signup(&f.attendant, request).await,
            Err(ApiError::Auth(AuthError::NotEnoughPermission { .. }))
        ));
    }

    #[tokio::test]
    async fn test_signup_conflict() {
        let f = fixture().await;
        f.service.signup(&f.attendant, patient_signup()).await.unwrap();
        assert!(matches!(
            f.service.signup(&f.attendant, patient_signup()).await,
            Err(ApiError::Resource(ResourceError::UserAlreadyExists))
        ));
    }

    // ── reads and updates ──

    #[tokio::test]
    async fn test_own_account_is_always_readable() {
        let f = fixture().await;
        let view = f
            .service
            .get_account(&f.attendant, f.attendant.user_id)
            .await
            .unwrap();
        assert_eq!(view.id, f.attendant.user_id);
        assert!(view.last_login.is_some());
    }

    #[tokio::test]
    async fn test_missing_account() {
        let f = fixture().await;
        assert!(matches!(
            f.service.get_account(&f.attendant, 999).await,
            Err(ApiError::Resource(ResourceError::UserNotFound { id: 999 }))
        ));
    }

    #[tokio::test]
    async fn test_update_account() {
        let f = fixture().await;
        let id = f.service.signup(&f.attendant, patient_signup()).await.unwrap();

        let patch = AccountPatch {
            display_name: Some("Maria S.".to_string()),
            email: Some(None),
            ..Default::default()
        };
        f.service.update_account(&f.attendant, id, patch).await.unwrap();

        let view = f.service.get_account(&f.attendant, id).await.unwrap();
        assert_eq!(view.display_name, "Maria S.");
        assert_eq!(view.email, None);
        assert!(view.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_update_staff_account_needs_permission() {
        let f = fixture().await;
        let outcome = f.service.login(ATTENDANT_CPF, "attendant-pw").await.unwrap();
        let patch = AccountPatch {
            phone: Some("5511900000000".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.service
                .update_account(&f.attendant, outcome.user_id, patch)
                .await,
            Err(ApiError::Auth(AuthError::NotEnoughPermission { .. }))
        ));
    }

    // ── search ──

    #[test]
    fn test_parse_patient_filter() {
        let params = HashMap::from([
            ("cpf".to_string(), "529".to_string()),
            ("display_name".to_string(), "Maria".to_string()),
        ]);
        let filter = parse_patient_filter(&params).unwrap();
        assert_eq!(filter.cpf.as_deref(), Some("529"));
        assert_eq!(filter.display_name.as_deref(), Some("Maria"));

        let unknown = HashMap::from([("age".to_string(), "30".to_string())]);
        assert_eq!(
            parse_patient_filter(&unknown).unwrap_err().to_string(),
            "age is not a searchable field"
        );

        let bad_prefix = HashMap::from([("phone".to_string(), "55-11".to_string())]);
        assert_eq!(
            parse_patient_filter(&bad_prefix).unwrap_err().to_string(),
            "invalid phone prefix"
        );
    }

    #[tokio::test]
    async fn test_search_patients_only_returns_patients() {
        let f = fixture().await;
        let id = f.service.signup(&f.attendant, patient_signup()).await.unwrap();

        let everyone = f
            .service
            .search_patients(&f.attendant, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(everyone.len(), 1);
        assert_eq!(everyone[0].id, id);
        assert_eq!(everyone[0].cpf, PATIENT_CPF);

        let by_phone = HashMap::from([("phone".to_string(), "5521".to_string())]);
        assert!(
            f.service
                .search_patients(&f.attendant, &by_phone)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
