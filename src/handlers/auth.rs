use axum::{extract::State, http::StatusCode};

use crate::{
    AppState, accounts,
    auth::{self, TokenIssuer},
    error::ApiError,
    extract::Json,
    models::{CreateUserRequest, LoginRequest, LoginResponse, RegisterRequest},
};

/// register
///
/// [Public Route] Creates an admin account and signs it in.
///
/// Public registration never grants `isSuperAdmin`; super-admins are created by
/// the root bootstrap or through `/root/users`.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = LoginResponse),
        (status = 400, description = "Missing fields or user already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let user = accounts::create_account(
        state.repo.as_ref(),
        CreateUserRequest {
            email: payload.email,
            password: payload.password,
            full_name: payload.full_name,
            phone: payload.phone,
            address: payload.address,
            designation: payload.designation,
            is_admin: Some(true),
            is_super_admin: Some(false),
        },
    )
    .await?;

    let token = auth::issue_token(&user, TokenIssuer::Admin, &state.config)?;
    Ok((StatusCode::CREATED, Json(LoginResponse { token, user })))
}

/// login
///
/// [Public Route] Exchanges email and password for an admin-issuer token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user =
        accounts::check_credentials(state.repo.as_ref(), &payload.email, &payload.password)
            .await?;

    let token = auth::issue_token(&user, TokenIssuer::Admin, &state.config)?;
    tracing::info!(user_id = %user.id, "admin login");
    Ok(Json(LoginResponse { token, user }))
}

/// root_login
///
/// [Public Route] Exchanges super-admin credentials for a root-issuer token,
/// the only kind accepted under `/root`.
#[utoipa::path(
    post,
    path = "/root/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Not a super-admin")
    )
)]
pub async fn root_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user =
        accounts::check_credentials(state.repo.as_ref(), &payload.email, &payload.password)
            .await?;

    if !user.is_super_admin {
        tracing::warn!(user_id = %user.id, "root login refused for non super-admin");
        return Err(ApiError::Forbidden);
    }

    let token = auth::issue_token(&user, TokenIssuer::Root, &state.config)?;
    tracing::info!(user_id = %user.id, "root login");
    Ok(Json(LoginResponse { token, user }))
}
