//! Account records: users, groups, permissions and sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A registered person (staff or patient)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    /// Unmasked, eleven digits
    pub cpf: String,
    /// bcrypt hash
    pub password_hash: String,
    pub display_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Values for a user about to be created
#[derive(Debug, Clone)]
pub struct NewUser {
    pub cpf: String,
    pub password_hash: String,
    pub display_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub groups: BTreeSet<String>,
}

/// Changes to apply to a user; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub cpf: Option<String>,
    pub password_hash: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<Option<String>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.cpf.is_none()
            && self.password_hash.is_none()
            && self.display_name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
    }
}

/// A named capability granted through groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub codename: String,
    pub name: String,
    pub description: String,
}

impl Permission {
    pub fn new(
        codename: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            codename: codename.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A stored login session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: i64,
    /// 128 hex characters
    pub token: String,
    pub last_access: Option<DateTime<Utc>>,
    pub expire_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_date <= now
    }
}

/// Patient search criteria
///
/// `cpf` and `phone` match by prefix, `display_name` and `email` by
/// substring. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientFilter {
    pub cpf: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl PatientFilter {
    pub fn matches(&self, user: &User) -> bool {
        self.cpf.as_deref().is_none_or(|p| user.cpf.starts_with(p))
            && self.phone.as_deref().is_none_or(|p| user.phone.starts_with(p))
            && self
                .display_name
                .as_deref()
                .is_none_or(|s| user.display_name.contains(s))
            && self
                .email
                .as_deref()
                .is_none_or(|s| user.email.as_deref().is_some_and(|e| e.contains(s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User {
            id: 1,
            cpf: "52998224725".to_string(),
            password_hash: String::new(),
            display_name: "Maria Souza".to_string(),
            phone: "5511988887777".to_string(),
            email: Some("maria@clinic.org".to_string()),
            is_active: true,
            verified_at: None,
            deactivated_at: None,
            last_login: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_empty_filter_matches_everyone() {
        assert!(PatientFilter::default().matches(&user()));
    }

    #[test]
    fn test_prefix_and_substring_matching() {
        let user = user();
        let by_cpf = PatientFilter {
            cpf: Some("529".to_string()),
            ..Default::default()
        };
        assert!(by_cpf.matches(&user));

        let cpf_infix = PatientFilter {
            cpf: Some("982".to_string()),
            ..Default::default()
        };
        assert!(!cpf_infix.matches(&user));

        let by_name = PatientFilter {
            display_name: Some("Souza".to_string()),
            ..Default::default()
        };
        assert!(by_name.matches(&user));

        let by_email = PatientFilter {
            email: Some("clinic".to_string()),
            ..Default::default()
        };
        assert!(by_email.matches(&user));
    }

    #[test]
    fn test_email_filter_skips_users_without_email() {
        let mut user = user();
        user.email = None;
        let filter = PatientFilter {
            email: Some("clinic".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&user));
    }

    #[test]
    fn test_session_expiry_is_inclusive() {
        let now = Utc::now();
        let session = SessionRecord {
            id: 1,
            user_id: 1,
            token: String::new(),
            last_access: None,
            expire_date: now,
            created_at: now - Duration::days(1),
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - Duration::seconds(1)));
    }
}
