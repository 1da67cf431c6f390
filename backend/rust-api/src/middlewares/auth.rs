use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::handlers::error::ApiError;
use crate::models::{User, UserRole};
use crate::services::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String, // user id
    pub email: String,
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

impl JwtClaims {
    pub fn for_user(user: &User, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            exp: (now + ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Failed to sign token")]
    Signing,
}

/// HS256 signer/verifier built once from the configured secret
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::Signing)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        use jsonwebtoken::errors::ErrorKind;

        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Requires a valid bearer token and stores its claims in request extensions
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let claims = state.jwt.validate_token(token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        ApiError::unauthorized("Could not validate credentials")
    })?;

    tracing::debug!(user_id = %claims.sub, role = claims.role.as_str(), "Authenticated request");

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

pub async fn admin_guard_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    role_guard(request, next, |role| *role == UserRole::Admin, "admin").await
}

/// Admins and teachers
pub async fn staff_guard_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    role_guard(request, next, UserRole::is_staff, "staff").await
}

async fn role_guard(
    request: Request,
    next: Next,
    allowed: impl Fn(&UserRole) -> bool,
    required: &str,
) -> Result<Response, ApiError> {
    let caller = request
        .extensions()
        .get::<JwtClaims>()
        .map(|claims| (claims.sub.clone(), claims.role));

    match caller {
        Some((_, role)) if allowed(&role) => Ok(next.run(request).await),
        Some((user_id, role)) => {
            tracing::warn!(
                %user_id,
                role = role.as_str(),
                "Access denied: {} role required",
                required
            );
            Err(ApiError::forbidden("Not enough permissions"))
        }
        None => Err(ApiError::unauthorized("Not authenticated")),
    }
}
