//! Account lifecycle shared by the public auth endpoints, root user
//! administration and the startup bootstrap.

use crate::{
    config::AppConfig,
    error::ApiError,
    models::{CreateUserRequest, NewUser, User},
    password,
    repository::Repository,
};

/// Canonical form of an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// create_account
///
/// Validates, hashes and stores a new account. Missing role flags default to a
/// plain admin. Fails with `UserExists` when the normalized email is taken.
pub async fn create_account(
    repo: &dyn Repository,
    request: CreateUserRequest,
) -> Result<User, ApiError> {
    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::UserExists);
    }

    let password_hash = password::hash_password(&request.password).await?;
    // A concurrent insert of the same email surfaces as `Conflict` -> `UserExists`.
    let user = repo
        .create_user(NewUser {
            email,
            password_hash,
            full_name: request.full_name.trim().to_string(),
            phone: request.phone,
            address: request.address,
            designation: request.designation,
            is_admin: request.is_admin.unwrap_or(true),
            is_super_admin: request.is_super_admin.unwrap_or(false),
        })
        .await?;

    tracing::info!(user_id = %user.id, is_super_admin = user.is_super_admin, "account created");
    Ok(user)
}

/// check_credentials
///
/// Resolves an account by email and password. Unknown email and wrong password
/// are indistinguishable to the caller.
pub async fn check_credentials(
    repo: &dyn Repository,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    let user = repo
        .find_user_by_email(&normalize_email(email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !password::verify_password(password, &user.password_hash).await? {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(ApiError::InvalidCredentials);
    }
    Ok(user)
}

/// ensure_root_account
///
/// Seeds the super-admin named by `ROOT_EMAIL`/`ROOT_PASSWORD` if it does not
/// exist yet. Returns the created account, or `None` when nothing was done.
pub async fn ensure_root_account(
    repo: &dyn Repository,
    config: &AppConfig,
) -> Result<Option<User>, ApiError> {
    let (Some(email), Some(password)) = (&config.root_email, &config.root_password) else {
        return Ok(None);
    };

    if repo.find_user_by_email(&normalize_email(email)).await?.is_some() {
        tracing::debug!("root account already present");
        return Ok(None);
    }

    let user = create_account(
        repo,
        CreateUserRequest {
            email: email.clone(),
            password: password.clone(),
            full_name: "Root".to_string(),
            is_admin: Some(true),
            is_super_admin: Some(true),
            ..CreateUserRequest::default()
        },
    )
    .await?;
    Ok(Some(user))
}
