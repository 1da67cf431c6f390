use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::{
    extractors::ValidatedJson,
    handlers::error::ApiError,
    middlewares::auth::JwtClaims,
    models::{
        adaptive::{
            NextDifficultyQuery, NextDifficultyResponse, PerformanceQuery, RecommendationQuery,
        },
        quiz::{HistoryQuery, QuizResult, StartQuizRequest, SubmitQuizRequest, SubmitQuizResponse},
        Difficulty, PerformanceHistory, Recommendation,
    },
    services::{adaptive_service::AdaptiveService, quiz_service::QuizService, AppState},
};

const DEFAULT_RECOMMENDATIONS: u32 = 5;

fn quiz_service(state: &AppState) -> QuizService {
    QuizService::new(state.store.clone(), state.config.quiz.clone())
}

fn adaptive_service(state: &AppState) -> AdaptiveService {
    AdaptiveService::new(state.store.clone())
}

/// POST /api/v1/quiz/start
pub async fn start_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<StartQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let started = quiz_service(&state).start(&claims.sub, req).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// POST /api/v1/quiz/{id}/submit
pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
    ValidatedJson(req): ValidatedJson<SubmitQuizRequest>,
) -> Result<Json<SubmitQuizResponse>, ApiError> {
    Ok(Json(
        quiz_service(&state)
            .submit(&claims.sub, &quiz_id, req)
            .await?,
    ))
}

/// GET /api/v1/quiz/{id}
pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
) -> Result<Json<QuizResult>, ApiError> {
    Ok(Json(quiz_service(&state).get(&claims.sub, &quiz_id).await?))
}

/// GET /api/v1/quiz/history?limit
pub async fn quiz_history(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<QuizResult>>, ApiError> {
    Ok(Json(
        quiz_service(&state)
            .history(&claims.sub, query.limit)
            .await?,
    ))
}

/// GET /api/v1/quiz/recommendations?topic&count
pub async fn recommendations(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<Recommendation>, ApiError> {
    let count = query
        .count
        .unwrap_or(DEFAULT_RECOMMENDATIONS)
        .min(state.config.quiz.max_questions);
    let count =
        NonZeroU32::new(count).ok_or_else(|| ApiError::bad_request("count must be at least 1"))?;
    Ok(Json(
        adaptive_service(&state)
            .recommend(&claims.sub, &query.topic, count)
            .await?,
    ))
}

/// GET /api/v1/quiz/next-difficulty?topic&current
pub async fn next_difficulty(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<NextDifficultyQuery>,
) -> Result<Json<NextDifficultyResponse>, ApiError> {
    let current = query.current.unwrap_or(Difficulty::Medium);
    let next = adaptive_service(&state)
        .next_difficulty(&claims.sub, &query.topic, current)
        .await?;
    Ok(Json(NextDifficultyResponse {
        topic: query.topic,
        current,
        next,
    }))
}

/// GET /api/v1/quiz/performance?topic
pub async fn performance(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<PerformanceQuery>,
) -> Result<Json<PerformanceHistory>, ApiError> {
    Ok(Json(
        adaptive_service(&state)
            .performance_history(&claims.sub, &query.topic)
            .await?,
    ))
}
