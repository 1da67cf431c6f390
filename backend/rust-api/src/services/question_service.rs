use crate::models::question::{
    CreateQuestionRequest, CreateQuestionResponse, ListQuestionsQuery, UpdateQuestionRequest,
};
use crate::models::{Difficulty, Question, StudentQuestion};
use crate::services::{ServiceError, ServiceResult};
use crate::storage::{QuestionFilter, QuizStore};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 100;

pub struct QuestionService {
    store: Arc<dyn QuizStore>,
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("Question not found".to_string())
}

impl QuestionService {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, req: CreateQuestionRequest) -> ServiceResult<CreateQuestionResponse> {
        let question = Question {
            id: Uuid::new_v4().to_string(),
            title: req.title.trim().to_string(),
            content: req.content,
            question_type: req.question_type,
            topic: req.topic.trim().to_string(),
            difficulty: req.difficulty,
            options: req.options,
            correct_answer: req.correct_answer,
            explanation: req.explanation,
            points: req.points.unwrap_or(1),
            tags: req.tags.unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: None,
        };
        self.store.insert_question(&question).await?;

        tracing::info!(
            question_id = %question.id,
            topic = %question.topic,
            difficulty = %question.difficulty,
            "Question created"
        );

        Ok(CreateQuestionResponse {
            message: "Question created successfully".to_string(),
            question_id: question.id,
            title: question.title,
        })
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Question> {
        self.store.get_question(id).await?.ok_or_else(not_found)
    }

    /// Learner-facing view: no answer, no explanation
    pub async fn get_for_student(&self, id: &str) -> ServiceResult<StudentQuestion> {
        Ok(StudentQuestion::from(&self.get(id).await?))
    }

    pub async fn list(&self, query: ListQuestionsQuery) -> ServiceResult<Vec<Question>> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let filter = QuestionFilter {
            topic: query.topic,
            difficulty: query.difficulty,
            any_tags: None,
        };
        Ok(self
            .store
            .list_questions(&filter, query.skip.unwrap_or(0), limit as i64)
            .await?)
    }

    /// Partial update; a request with no fields is rejected
    pub async fn update(&self, id: &str, req: UpdateQuestionRequest) -> ServiceResult<Question> {
        if req.is_empty() {
            return Err(ServiceError::BadRequest("No fields to update".to_string()));
        }
        let mut question = self.get(id).await?;
        req.apply_to(&mut question);
        self.store.update_question(&question).await?;
        tracing::info!(question_id = %question.id, "Question updated");
        Ok(question)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        if !self.store.delete_question(id).await? {
            return Err(not_found());
        }
        tracing::info!(question_id = %id, "Question deleted");
        Ok(())
    }

    pub async fn count(&self) -> ServiceResult<u64> {
        Ok(self.store.count_questions(&QuestionFilter::default()).await?)
    }

    pub async fn by_difficulty(&self, difficulty: Difficulty) -> ServiceResult<Vec<Question>> {
        let filter = QuestionFilter {
            difficulty: Some(difficulty),
            ..Default::default()
        };
        self.all_matching(&filter).await
    }

    /// Questions carrying any of `tags`
    pub async fn by_tags(&self, tags: Vec<String>) -> ServiceResult<Vec<Question>> {
        if tags.is_empty() {
            return Err(ServiceError::BadRequest("At least one tag is required".to_string()));
        }
        let filter = QuestionFilter {
            any_tags: Some(tags),
            ..Default::default()
        };
        self.all_matching(&filter).await
    }

    async fn all_matching(&self, filter: &QuestionFilter) -> ServiceResult<Vec<Question>> {
        let total = self.store.count_questions(filter).await?;
        Ok(self
            .store
            .list_questions(filter, 0, total.max(1) as i64)
            .await?)
    }
}
