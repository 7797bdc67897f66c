use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::{
    accounts,
    auth::{AuthUser, RootUser},
    error::ApiError,
    extract::{Json, Path},
    models::{
        ChangePasswordRequest, CreateUserRequest, MessageResponse, UpdateProfileRequest,
        UpdateUserRequest, User, UserPatch,
    },
    password,
    repository::RepositoryState,
};

fn user_not_found() -> ApiError {
    ApiError::not_found("User not found")
}

// --- Profile self-service ---

/// get_me
///
/// [Authenticated Route] The caller's own account.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(
    user: AuthUser,
    State(repo): State<RepositoryState>,
) -> Result<Json<User>, ApiError> {
    let account = repo.get_user(user.id).await?.ok_or_else(user_not_found)?;
    Ok(Json(account))
}

/// update_me
///
/// [Authenticated Route] Partial profile update. Email and role flags are not
/// editable here.
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Updated profile", body = User))
)]
pub async fn update_me(
    user: AuthUser,
    State(repo): State<RepositoryState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let patch = UserPatch {
        full_name: payload.full_name,
        phone: payload.phone,
        address: payload.address,
        designation: payload.designation,
        avatar: payload.avatar,
        bank_details: payload.bank_details,
        personal_details: payload.personal_details,
        ..UserPatch::default()
    };

    let account = repo
        .update_user(user.id, patch)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(account))
}

/// change_password
///
/// [Authenticated Route] Requires the current password.
#[utoipa::path(
    put,
    path = "/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Empty new password"),
        (status = 401, description = "Wrong current password")
    )
)]
pub async fn change_password(
    user: AuthUser,
    State(repo): State<RepositoryState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.new_password.is_empty() {
        return Err(ApiError::validation("New password is required"));
    }

    let account = repo.get_user(user.id).await?.ok_or_else(user_not_found)?;
    if !password::verify_password(&payload.current_password, &account.password_hash).await? {
        return Err(ApiError::InvalidCredentials);
    }

    let patch = UserPatch {
        password_hash: Some(password::hash_password(&payload.new_password).await?),
        ..UserPatch::default()
    };
    repo.update_user(user.id, patch)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = %user.id, "password changed");
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

// --- Root user administration ---

/// list_users
///
/// [Root Route] Every account, newest first.
#[utoipa::path(
    get,
    path = "/root/users",
    responses((status = 200, description = "All accounts", body = [User]))
)]
pub async fn list_users(
    _root: RootUser,
    State(repo): State<RepositoryState>,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(repo.list_users().await?))
}

/// create_user
///
/// [Root Route] Creates an account with explicit role flags.
#[utoipa::path(
    post,
    path = "/root/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 400, description = "Missing fields or user already exists")
    )
)]
pub async fn create_user(
    _root: RootUser,
    State(repo): State<RepositoryState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = accounts::create_account(repo.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// update_user
///
/// [Root Route] Partial update of any account, including role flags and a
/// password reset.
#[utoipa::path(
    put,
    path = "/root/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    _root: RootUser,
    State(repo): State<RepositoryState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let password_hash = match payload.password.as_deref() {
        Some("") => return Err(ApiError::validation("Password cannot be empty")),
        Some(raw) => Some(password::hash_password(raw).await?),
        None => None,
    };

    let patch = UserPatch {
        full_name: payload.full_name,
        phone: payload.phone,
        address: payload.address,
        designation: payload.designation,
        avatar: payload.avatar,
        bank_details: payload.bank_details,
        personal_details: payload.personal_details,
        password_hash,
        is_admin: payload.is_admin,
        is_super_admin: payload.is_super_admin,
    };

    let user = repo.update_user(id, patch).await?.ok_or_else(user_not_found)?;
    Ok(Json(user))
}

/// delete_user
///
/// [Root Route] Hard-deletes an account. ACL entries naming it are left in
/// place and simply match nobody.
#[utoipa::path(
    delete,
    path = "/root/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 400, description = "Cannot delete own account"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    RootUser(root): RootUser,
    State(repo): State<RepositoryState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    if id == root.id {
        return Err(ApiError::validation("You cannot delete your own account"));
    }

    if !repo.delete_user(id).await? {
        return Err(user_not_found());
    }

    tracing::info!(user_id = %id, deleted_by = %root.id, "account deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
