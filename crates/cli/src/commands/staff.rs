//! Staff account commands.
//!
//! Passwords are read from `LIVESHOP_STAFF_PASSWORD`, never from arguments.

use liveshop_admin::db::{RepositoryError, StaffUserRepository};
use liveshop_admin::services::auth::{AuthError, hash_password};
use liveshop_core::{Email, StaffRole};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use super::{ConnectError, connect};

const PASSWORD_VAR: &str = "LIVESHOP_STAFF_PASSWORD";

#[derive(Debug, Error)]
pub enum StaffError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid role: {0}. Valid roles: admin, staff, viewer")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Staff user already exists with email: {0}")]
    UserExists(String),

    #[error("No staff user with email: {0}")]
    UnknownUser(String),

    #[error(transparent)]
    Password(#[from] AuthError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Repository(RepositoryError),
}

/// Create a staff account and return its ID.
pub async fn create(email: &str, name: &str, role: &str) -> Result<i32, StaffError> {
    dotenvy::dotenv().ok();

    let role: StaffRole = role
        .parse()
        .map_err(|_| StaffError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|_| StaffError::InvalidEmail(email.to_owned()))?;

    let password_hash = hashed_password_from_env()?;

    let pool = connect().await?;

    tracing::info!("Creating staff user: {} ({})", email, role);
    let user = StaffUserRepository::new(&pool)
        .create(&email, name, role, &password_hash)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => StaffError::UserExists(email.to_string()),
            other => StaffError::Repository(other),
        })?;

    tracing::info!("Staff user created. ID: {}", user.id);
    Ok(user.id.as_i32())
}

/// Log every staff account.
pub async fn list() -> Result<(), StaffError> {
    let pool = connect().await?;
    let users = StaffUserRepository::new(&pool)
        .list_all()
        .await
        .map_err(StaffError::Repository)?;

    for user in &users {
        tracing::info!(id = %user.id, email = %user.email, role = %user.role, "{}", user.name);
    }
    tracing::info!("{} staff users", users.len());
    Ok(())
}

/// Replace the password of the account with `email`.
pub async fn set_password(email: &str) -> Result<(), StaffError> {
    dotenvy::dotenv().ok();

    let email = Email::parse(email).map_err(|_| StaffError::InvalidEmail(email.to_owned()))?;
    let password_hash = hashed_password_from_env()?;

    let pool = connect().await?;
    let repo = StaffUserRepository::new(&pool);
    let (user, _) = repo
        .get_with_password_hash(&email)
        .await
        .map_err(StaffError::Repository)?
        .ok_or_else(|| StaffError::UnknownUser(email.to_string()))?;

    repo.set_password_hash(user.id, &password_hash)
        .await
        .map_err(StaffError::Repository)?;

    tracing::info!("Password updated for {}", email);
    Ok(())
}

fn hashed_password_from_env() -> Result<String, StaffError> {
    let password = std::env::var(PASSWORD_VAR)
        .map(SecretString::from)
        .map_err(|_| StaffError::MissingEnvVar(PASSWORD_VAR))?;
    Ok(hash_password(password.expose_secret())?)
}
