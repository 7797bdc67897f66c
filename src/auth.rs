use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, error::ApiError, models::User, repository::RepositoryState};

/// Claims
///
/// The signed token payload. Role flags are a snapshot taken at login; the
/// extractor re-reads them from storage on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject: the account id.
    pub sub: Uuid,
    pub full_name: String,
    pub email: String,
    pub is_admin: bool,
    #[serde(default)]
    pub is_super_admin: bool,
    /// Issuer: `"admin"` or `"root"`, matching the key that signed the token.
    pub iss: String,
    pub iat: usize,
    pub exp: usize,
}

/// TokenIssuer
///
/// The two independent token issuers. Each signs with its own secret, so a token
/// minted by the admin login can never pass as a root token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenIssuer {
    Admin,
    Root,
}

impl TokenIssuer {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Root => "root",
        }
    }

    fn secret(self, config: &AppConfig) -> &str {
        match self {
            Self::Admin => &config.jwt_secret,
            Self::Root => &config.root_jwt_secret,
        }
    }
}

/// issue_token
///
/// Signs an HS256 token for `user` that expires after `config.token_ttl_hours`.
pub fn issue_token(
    user: &User,
    issuer: TokenIssuer,
    config: &AppConfig,
) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        full_name: user.full_name.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
        is_super_admin: user.is_super_admin,
        iss: issuer.name().to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp() as usize,
    };

    let key = EncodingKey::from_secret(issuer.secret(config).as_bytes());
    encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
}

/// verify_token
///
/// Checks signature, issuer and expiry. The root key is tried first, then the
/// admin key; a token must verify completely under one of them.
pub fn verify_token(token: &str, config: &AppConfig) -> Result<(Claims, TokenIssuer), ApiError> {
    for issuer in [TokenIssuer::Root, TokenIssuer::Admin] {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[issuer.name()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let key = DecodingKey::from_secret(issuer.secret(config).as_bytes());
        match decode::<Claims>(token, &key, &validation) {
            Ok(data) => return Ok((data.claims, issuer)),
            Err(e) => tracing::debug!("token rejected by {} issuer: {:?}", issuer.name(), e.kind()),
        }
    }
    Err(ApiError::Unauthorized)
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Role flags come from the
/// stored account, not from the token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
    pub is_super_admin: bool,
    /// Which login issued the presented token.
    pub issuer: TokenIssuer,
}

impl AuthUser {
    /// The ACL viewer for listing: `None` (unrestricted) for super-admins.
    pub fn acl_viewer(&self) -> Option<Uuid> {
        if self.is_super_admin { None } else { Some(self.id) }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Reuses an identity already resolved earlier in the same request.
/// 2. Extracts the `Bearer` token and verifies it against both issuers.
/// 3. Loads the account so deleted users and changed roles take effect immediately.
///
/// Rejection: 401 on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let (claims, issuer) = verify_token(token, &config)?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let auth_user = AuthUser {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            is_admin: user.is_admin,
            is_super_admin: user.is_super_admin,
            issuer,
        };
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}

/// AdminUser
///
/// An authenticated caller holding either role flag. Accounts with neither flag
/// can still obtain a token, but every authenticated route (`/me` included)
/// answers them 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !(user.is_admin || user.is_super_admin) {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

/// RootUser
///
/// A super-admin presenting a token from the root issuer. Guards every `/root` route.
#[derive(Debug, Clone)]
pub struct RootUser(pub AuthUser);

impl<S> FromRequestParts<S> for RootUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_super_admin || user.issuer != TokenIssuer::Root {
            return Err(ApiError::Forbidden);
        }
        Ok(RootUser(user))
    }
}
