//! Admin registry management commands.
//!
//! Registry changes happen out of band, through this CLI, never through the
//! panel itself. Every command signs in as the operator running it and
//! checks their own registry entry first; mutations additionally require
//! the `super_admin` role.
//!
//! # Environment Variables
//!
//! - `CLI_ADMIN_EMAIL` - email of the operator running the command
//! - `CLI_ADMIN_PASSWORD` - their password
//! - `FIREBASE_API_KEY`, `FIREBASE_PROJECT_ID` - Firebase project

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crypted_core::{AdminRecord, AdminRole, Email, PermissionSet, SubjectId};
use crypted_panel::config::{ConfigError, PanelConfig};
use crypted_panel::firebase::{FirebaseAuthClient, FirestoreClient};
use crypted_panel::services::guard::{
    AdminRegistry, IdentityProvider, ProviderError, StoreError,
};

/// Errors that can occur during admin registry operations.
#[derive(Debug, Error)]
pub enum AdminsError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sign-in with the operator credentials failed.
    #[error("Sign-in failed: {0}")]
    SignIn(#[from] ProviderError),

    /// The registry store rejected or failed the operation.
    #[error("Registry error: {0}")]
    Store(#[from] StoreError),

    /// The operator has no registry entry at all.
    #[error("The signed-in account has no admin registry entry")]
    NotRegistered,

    /// The operator's role may not modify the registry.
    #[error("Only super admins may modify the registry (signed in as {0})")]
    NotSuperAdmin(AdminRole),

    /// Invalid role argument.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin, moderator, analyst")]
    InvalidRole(String),

    /// Invalid email argument.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),
}

/// Signed-in registry handle plus the operator's own record.
struct Operator {
    registry: AdminRegistry<FirestoreClient>,
    record: AdminRecord,
}

/// Sign in with the operator credentials and load their registry entry.
async fn connect() -> Result<Operator, AdminsError> {
    dotenvy::dotenv().ok();

    let email = std::env::var("CLI_ADMIN_EMAIL")
        .map_err(|_| AdminsError::MissingEnvVar("CLI_ADMIN_EMAIL"))?;
    let password = std::env::var("CLI_ADMIN_PASSWORD")
        .map_err(|_| AdminsError::MissingEnvVar("CLI_ADMIN_PASSWORD"))?;

    let config = PanelConfig::from_env()?;
    let http = reqwest::Client::new();
    let auth = Arc::new(FirebaseAuthClient::new(
        http.clone(),
        config.firebase.api_key.clone(),
        config.firebase.auth_url.clone(),
        config.firebase.token_url.clone(),
    ));
    let store = Arc::new(FirestoreClient::new(
        http,
        Arc::clone(&auth),
        &config.firebase.firestore_url,
        &config.firebase.project_id,
    ));
    let registry = AdminRegistry::new(store, config.registry_collection.clone());

    let identity = auth.sign_in(&email, &password).await?;
    let record = registry
        .find(&identity.uid)
        .await?
        .ok_or(AdminsError::NotRegistered)?;

    tracing::info!("Signed in as {} ({})", record.email, record.role);
    Ok(Operator { registry, record })
}

fn require_super_admin(operator: &Operator) -> Result<(), AdminsError> {
    if operator.record.role.can_manage_registry() {
        Ok(())
    } else {
        Err(AdminsError::NotSuperAdmin(operator.record.role))
    }
}

/// Create or replace a registry entry.
pub async fn grant(
    uid: &str,
    email: &str,
    name: &str,
    role: &str,
    permissions: Vec<String>,
    all_permissions: bool,
) -> Result<(), AdminsError> {
    let role: AdminRole = role
        .parse()
        .map_err(|_| AdminsError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|e| AdminsError::InvalidEmail(e.to_string()))?;
    let permissions = if all_permissions {
        PermissionSet::All
    } else {
        PermissionSet::named(permissions)
    };

    let operator = connect().await?;
    require_super_admin(&operator)?;

    let uid = SubjectId::new(uid);

    // Replacing an existing entry keeps its history fields.
    let existing = operator.registry.find(&uid).await?;
    let (created_at, last_login) = existing
        .map_or((Utc::now(), None), |e| (e.created_at, e.last_login));

    let record = AdminRecord {
        uid,
        email,
        display_name: name.to_owned(),
        role,
        permissions,
        created_at,
        last_login,
    };
    operator.registry.put(&record).await?;

    println!(
        "Granted panel access: {} ({}) as {}",
        record.display_name, record.email, record.role
    );
    Ok(())
}

/// Delete a registry entry. Any live session for the subject is rejected at
/// its next resolution.
pub async fn revoke(uid: &str) -> Result<(), AdminsError> {
    let operator = connect().await?;
    require_super_admin(&operator)?;

    let uid = SubjectId::new(uid);
    operator.registry.remove(&uid).await?;

    println!("Revoked panel access for {}", uid.as_str());
    Ok(())
}

/// List registry entries, newest first.
pub async fn list(limit: u32) -> Result<(), AdminsError> {
    let operator = connect().await?;

    let records = operator.registry.list(limit).await?;
    if records.is_empty() {
        println!("Registry is empty");
        return Ok(());
    }

    for record in records {
        let last_login = record
            .last_login
            .map_or_else(|| "never".to_owned(), |t| t.to_rfc3339());
        println!(
            "{}  {}  {}  {}  last login: {}",
            record.uid.as_str(),
            record.email,
            record.role,
            record.display_name,
            last_login
        );
    }
    Ok(())
}
