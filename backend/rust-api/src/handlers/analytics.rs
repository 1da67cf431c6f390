use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    handlers::error::ApiError,
    middlewares::auth::JwtClaims,
    models::analytics::{AdminAnalytics, LearnerAnalytics},
    services::{analytics_service::AnalyticsService, auth_service::AuthService, AppState},
};

/// GET /api/v1/analytics/me
pub async fn my_analytics(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<LearnerAnalytics>, ApiError> {
    let analytics = AnalyticsService::new(state.store.clone())
        .learner_analytics(&claims.sub)
        .await?;
    Ok(Json(analytics))
}

/// GET /api/v1/analytics/users/{id}
pub async fn learner_analytics(
    State(state): State<Arc<AppState>>,
    Path(learner_id): Path<String>,
) -> Result<Json<LearnerAnalytics>, ApiError> {
    // 404 for unknown accounts rather than an empty report
    AuthService::new(state.store.clone(), state.jwt.clone(), &state.config)
        .get_user(&learner_id)
        .await?;
    let analytics = AnalyticsService::new(state.store.clone())
        .learner_analytics(&learner_id)
        .await?;
    Ok(Json(analytics))
}

/// GET /api/v1/analytics/admin
pub async fn admin_analytics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AdminAnalytics>, ApiError> {
    Ok(Json(
        AnalyticsService::new(state.store.clone())
            .admin_analytics()
            .await?,
    ))
}
