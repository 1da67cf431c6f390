use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    extractors::ValidatedJson,
    handlers::error::ApiError,
    middlewares::auth::JwtClaims,
    models::{
        question::{
            CreateQuestionRequest, ListQuestionsQuery, QuestionCountResponse, TagsQuery,
            UpdateQuestionRequest,
        },
        Difficulty, Question, StudentQuestion, UserRole,
    },
    services::{question_service::QuestionService, AppState},
};

fn question_service(state: &AppState) -> QuestionService {
    QuestionService::new(state.store.clone())
}

/// POST /api/v1/questions
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(author = %claims.sub, topic = %req.topic, "Creating question");
    let created = question_service(&state).create(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/questions?skip&limit&topic&difficulty
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuestionsQuery>,
) -> Result<Json<Vec<Question>>, ApiError> {
    Ok(Json(question_service(&state).list(query).await?))
}

/// GET /api/v1/questions/stats/count
pub async fn count_questions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QuestionCountResponse>, ApiError> {
    let total = question_service(&state).count().await?;
    Ok(Json(QuestionCountResponse { total }))
}

/// GET /api/v1/questions/difficulty/{difficulty}
pub async fn questions_by_difficulty(
    State(state): State<Arc<AppState>>,
    Path(difficulty): Path<Difficulty>,
) -> Result<Json<Vec<Question>>, ApiError> {
    Ok(Json(question_service(&state).by_difficulty(difficulty).await?))
}

/// GET /api/v1/questions/tags?tags=a,b
pub async fn questions_by_tags(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TagsQuery>,
) -> Result<Json<Vec<Question>>, ApiError> {
    Ok(Json(question_service(&state).by_tags(query.tag_list()).await?))
}

/// GET /api/v1/questions/{id} - Full question including the answer
pub async fn get_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Question>, ApiError> {
    Ok(Json(question_service(&state).get(&id).await?))
}

/// GET /api/v1/questions/{id}/student
pub async fn get_student_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StudentQuestion>, ApiError> {
    Ok(Json(question_service(&state).get_for_student(&id).await?))
}

/// PUT /api/v1/questions/{id}
pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateQuestionRequest>,
) -> Result<Json<Question>, ApiError> {
    Ok(Json(question_service(&state).update(&id, req).await?))
}

/// DELETE /api/v1/questions/{id} - Admin only, even though the route is staff-guarded
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if claims.role != UserRole::Admin {
        return Err(ApiError::forbidden("Not enough permissions"));
    }
    question_service(&state).delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
