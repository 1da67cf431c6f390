use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use std::sync::Arc;

use crate::{
    extractors::ValidatedJson,
    handlers::error::ApiError,
    middlewares::auth::JwtClaims,
    models::user::{
        ChangePasswordRequest, LoginRequest, RegisterRequest, TokenResponse, UpdateProfileRequest,
        UserOut, UserProfile,
    },
    services::{auth_service::AuthService, AppState},
};

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(state.store.clone(), state.jwt.clone(), &state.config)
}

/// POST /api/v1/auth/register - Register a new learner or teacher
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Registering new user: {}", req.email);
    let response = auth_service(&state).register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login - Exchange credentials for a bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(auth_service(&state).login(req).await?))
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<UserOut>, ApiError> {
    let user = auth_service(&state).current_user(&claims.sub).await?;
    Ok(Json(UserOut::from(user)))
}

/// PUT /api/v1/auth/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<UserOut>, ApiError> {
    Ok(Json(
        auth_service(&state).update_profile(&claims.sub, req).await?,
    ))
}

/// GET /api/v1/auth/profile - Account plus quiz statistics
pub async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(auth_service(&state).profile(&claims.sub).await?))
}

/// POST /api/v1/auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth_service(&state).change_password(&claims.sub, req).await?;
    Ok(Json(json!({ "message": "Password updated successfully" })))
}
