//! Shared harness for the HTTP integration tests
//!
//! Builds the full application on an in-memory store seeded with the
//! default groups, permissions and an administrator.

#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use rehab::accounts::NewUser;
use rehab::config::AdminConfig;
use rehab::prelude::*;
use serde_json::{Value, json};
use std::collections::BTreeSet;

pub const ADMIN_CPF: &str = "529.982.247-25";
pub const ADMIN_PASSWORD: &str = "admin-pw";

pub const ATTENDANT_CPF: &str = "11144477735";
pub const PHYSIO_CPF: &str = "12345678909";
pub const PATIENT_CPF: &str = "98765432100";
pub const OTHER_PATIENT_CPF: &str = "39053344705";

pub const STAFF_PASSWORD: &str = "staff-pw";

pub struct Harness {
    pub server: TestServer,
    pub store: InMemoryStore,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.session.hash_cost = 4;
    config.admin = Some(AdminConfig {
        cpf: ADMIN_CPF.to_string(),
        password: ADMIN_PASSWORD.to_string(),
        display_name: "Administrator".to_string(),
        phone: "5581900000000".to_string(),
        email: Some("admin@clinic.org".to_string()),
    });
    config
}

pub async fn harness() -> Harness {
    let config = test_config();
    let store = InMemoryStore::new();
    seed_defaults(&store, &config)
        .await
        .expect("seeding succeeds");

    let app = ServerBuilder::new()
        .with_config(config)
        .with_store(store.clone())
        .with_catalog(default_catalog().expect("catalog builds"))
        .build()
        .expect("application builds");

    let server = TestServer::try_new(app).expect("Failed to create test server");
    Harness { server, store }
}

impl Harness {
    /// Insert a staff member straight into the store
    pub async fn staff(&self, cpf: &str, group: &str) -> i64 {
        let user = self
            .store
            .create_user(NewUser {
                cpf: cpf.to_string(),
                password_hash: bcrypt::hash(STAFF_PASSWORD, 4).expect("hash"),
                display_name: format!("{} member", group),
                phone: "5581911112222".to_string(),
                email: None,
                groups: BTreeSet::from([group.to_string()]),
            })
            .await
            .expect("staff created");
        user.id
    }

    pub async fn login(&self, cpf: &str, password: &str) -> (String, i64) {
        let response = self
            .server
            .post("/accounts/create_session")
            .json(&json!({ "cpf": cpf, "password": password }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        let token = body["token"].as_str().expect("token").to_string();
        let user_id = body["user_id"].as_i64().expect("user_id");
        (token, user_id)
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_CPF, ADMIN_PASSWORD).await.0
    }

    /// An attendant's token
    pub async fn attendant_token(&self) -> String {
        self.staff(ATTENDANT_CPF, "attendant").await;
        self.login(ATTENDANT_CPF, STAFF_PASSWORD).await.0
    }

    /// A physiotherapist's token
    pub async fn physio_token(&self) -> String {
        self.staff(PHYSIO_CPF, "physiotherapist").await;
        self.login(PHYSIO_CPF, STAFF_PASSWORD).await.0
    }

    /// Sign up a patient through the API, returning its id
    pub async fn signup_patient(&self, token: &str, cpf: &str, name: &str) -> i64 {
        let response = authed(self.server.post("/accounts"), token)
            .json(&json!({
                "cpf": cpf,
                "password": "patient-pw",
                "display_name": name,
                "phone": "5581988887777",
                "email": null,
                "user_group_names": ["patient"],
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        body["user_id"].as_i64().expect("user_id")
    }
}

/// Attach the session header to a request
pub fn authed(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("authentication"),
        HeaderValue::from_str(token).expect("token is a valid header value"),
    )
}

/// `code` and `message` of an error document
pub fn error_of(body: &Value) -> (&str, &str) {
    (
        body["code"].as_str().unwrap_or_default(),
        body["message"].as_str().unwrap_or_default(),
    )
}
