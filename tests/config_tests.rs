//! Loading configuration files and applying them to a fresh store

use rehab::core::auth::ADMIN_GROUP;
use rehab::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG_YAML: &str = r#"
server:
  bind: "0.0.0.0:9000"
session:
  lifetime_days: 7
  hash_cost: 4
admin:
  cpf: "529.982.247-25"
  password: "from-file"
  display_name: "Clinic Admin"
  phone: "5581900000000"
cors:
  allow_any_origin: true
"#;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn test_load_from_file() {
    let file = config_file(CONFIG_YAML);
    let config = AppConfig::from_yaml_file(file.path().to_str().expect("utf-8 path"))
        .expect("config loads");

    assert_eq!(config.server.bind, "0.0.0.0:9000");
    assert_eq!(config.server.entry_module, "api.app");
    assert_eq!(config.session.lifetime_days, 7);
    assert!(config.cors.allow_any_origin);
    assert_eq!(
        config.admin.as_ref().map(|a| a.display_name.as_str()),
        Some("Clinic Admin")
    );
}

#[test]
fn test_missing_file_is_error() {
    assert!(AppConfig::from_yaml_file("/definitely/not/here.yaml").is_err());
}

#[test]
fn test_env_variable_names_the_file() {
    let file = config_file(CONFIG_YAML);
    let var = "REHAB_CONFIG_TEST_ENV_FILE";

    // SAFETY: the variable name is unique to this test
    unsafe { std::env::set_var(var, file.path()) };
    let config = AppConfig::from_env_or_default(var).expect("config loads");
    unsafe { std::env::remove_var(var) };

    assert_eq!(config.session.hash_cost, 4);
    assert_eq!(
        AppConfig::from_env_or_default(var).expect("defaults"),
        AppConfig::default()
    );
}

#[test]
fn test_seeding_from_file_creates_admin_once() {
    let file = config_file(CONFIG_YAML);
    let config = AppConfig::from_yaml_file(file.path().to_str().expect("utf-8 path"))
        .expect("config loads");
    let store = InMemoryStore::new();

    tokio_test::block_on(async {
        seed_defaults(&store, &config).await.expect("first seed");
        seed_defaults(&store, &config).await.expect("second seed");

        let admin = store
            .find_user_by_cpf("52998224725")
            .await
            .expect("lookup")
            .expect("admin exists");
        assert_eq!(admin.display_name, "Clinic Admin");
        assert!(bcrypt::verify("from-file", &admin.password_hash).expect("verify"));

        let groups = store.user_groups(admin.id).await.expect("groups");
        assert!(groups.contains(ADMIN_GROUP));

        let matches = store
            .search_users(ADMIN_GROUP, &Default::default())
            .await
            .expect("search");
        assert_eq!(matches.len(), 1);
    });
}
