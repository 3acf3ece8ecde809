//! Default groups, permissions and administrator

use crate::accounts::model::{NewUser, Permission};
use crate::config::AppConfig;
use crate::core::auth::{
    ADMIN_GROUP, ATTENDANT_GROUP, CHANGE_FORM_DATA, CREATE_FORM, GROUPS, PATIENT_GROUP,
    PHYSIOTHERAPIST_GROUP, READ_FORM_DATA, SEARCH_PATIENT, change_data_permission,
    create_permission, read_data_permission,
};
use crate::core::service::AccountStore;
use crate::core::validation::unmask_cpf;
use anyhow::{Context, Result};
use std::collections::BTreeSet;

fn article(group: &str) -> &'static str {
    if group.starts_with(['a', 'e', 'i', 'o', 'u']) {
        "an"
    } else {
        "a"
    }
}

/// Every permission the service checks, with its display name and description
pub fn permission_catalogue() -> Vec<Permission> {
    let mut permissions = Vec::new();

    for group in GROUPS {
        permissions.push(Permission::new(
            create_permission(group),
            format!("Create {}", group),
            format!("Allows the creation of {} {} user", article(group), group),
        ));
        permissions.push(Permission::new(
            change_data_permission(group),
            format!("Change {} data", group),
            format!("Allows changes to {} user data", group),
        ));
        permissions.push(Permission::new(
            read_data_permission(group),
            format!("Read {} data", group),
            format!("Allows read in {} user data", group),
        ));
    }

    permissions.push(Permission::new(
        CREATE_FORM,
        "Create form",
        "Allows the creation of a form",
    ));
    permissions.push(Permission::new(
        CHANGE_FORM_DATA,
        "Change form data",
        "Allows changes to form data",
    ));
    permissions.push(Permission::new(
        READ_FORM_DATA,
        "Read form data",
        "Allows read in form data",
    ));
    permissions.push(Permission::new(
        SEARCH_PATIENT,
        "Search patient",
        "Allows the search for patients",
    ));

    permissions
}

/// Codenames granted to each group
pub fn default_grants() -> Vec<(&'static str, Vec<String>)> {
    let staff = [ADMIN_GROUP, ATTENDANT_GROUP, PHYSIOTHERAPIST_GROUP];

    let admin = staff
        .iter()
        .flat_map(|g| {
            [
                create_permission(g),
                change_data_permission(g),
                read_data_permission(g),
            ]
        })
        .collect();

    let attendant = vec![
        create_permission(PATIENT_GROUP),
        change_data_permission(PATIENT_GROUP),
        read_data_permission(PATIENT_GROUP),
        SEARCH_PATIENT.to_string(),
    ];

    let physiotherapist = vec![
        read_data_permission(PATIENT_GROUP),
        SEARCH_PATIENT.to_string(),
        CREATE_FORM.to_string(),
        CHANGE_FORM_DATA.to_string(),
        READ_FORM_DATA.to_string(),
    ];

    vec![
        (ADMIN_GROUP, admin),
        (ATTENDANT_GROUP, attendant),
        (PHYSIOTHERAPIST_GROUP, physiotherapist),
        (PATIENT_GROUP, Vec::new()),
    ]
}

/// Create the default groups, permissions and grants, then the configured
/// administrator when no user holds its cpf yet
///
/// Safe to run on a store that was already seeded.
pub async fn seed_defaults(store: &dyn AccountStore, config: &AppConfig) -> Result<()> {
    for group in GROUPS {
        if store.create_group(group).await? {
            tracing::debug!(group, "created group");
        }
    }

    for permission in permission_catalogue() {
        store.create_permission(permission).await?;
    }

    for (group, codenames) in default_grants() {
        for codename in codenames {
            store
                .grant(group, &codename)
                .await
                .with_context(|| format!("granting {} to {}", codename, group))?;
        }
    }

    let Some(admin) = &config.admin else {
        return Ok(());
    };

    let cpf = unmask_cpf(&admin.cpf);
    if store.find_user_by_cpf(&cpf).await?.is_some() {
        tracing::debug!("administrator already present");
        return Ok(());
    }

    let password_hash = bcrypt::hash(&admin.password, config.session.hash_cost)
        .context("hashing administrator password")?;

    let user = store
        .create_user(NewUser {
            cpf,
            password_hash,
            display_name: admin.display_name.clone(),
            phone: admin.phone.clone(),
            email: admin.email.clone(),
            groups: BTreeSet::from([ADMIN_GROUP.to_string()]),
        })
        .await?;

    tracing::info!(user_id = user.id, "created administrator");
    Ok(())
}
