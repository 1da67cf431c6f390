use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    handlers::error::ApiError,
    models::user::{ListUsersQuery, UpdateUserStatusRequest, UserListResponse, UserOut},
    services::{auth_service::AuthService, AppState},
};

const DEFAULT_PAGE_SIZE: u64 = 100;
const MAX_PAGE_SIZE: u64 = 100;

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(state.store.clone(), state.jwt.clone(), &state.config)
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let users = auth_service(&state)
        .list_users(query.skip.unwrap_or(0), limit as i64)
        .await?;
    Ok(Json(users))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserOut>, ApiError> {
    Ok(Json(auth_service(&state).get_user(&id).await?))
}

/// PUT /api/v1/users/{id}/status - Activate or deactivate an account
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateUserStatusRequest>,
) -> Result<Json<UserOut>, ApiError> {
    let user = auth_service(&state).set_active(&id, req.is_active).await?;
    tracing::info!(user_id = %id, is_active = req.is_active, "User status changed");
    Ok(Json(user))
}
