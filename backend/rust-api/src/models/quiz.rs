use super::question::{Difficulty, StudentQuestion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    InProgress,
    Completed,
}

/// One quiz taken by a learner ("quiz_attempts" collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: String,
    pub learner_id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_ids: Vec<String>,
    pub status: QuizStatus,
    /// Questions were picked by the recommender rather than a fixed difficulty
    #[serde(default)]
    pub adaptive: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub correct_count: u32,
    pub total_questions: u32,
    /// Seconds
    #[serde(default)]
    pub time_taken: Option<u32>,
}

impl QuizAttempt {
    pub fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.total_questions as f64
        }
    }
}

/// Single graded answer ("user_answers" collection). Never updated after insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRecord {
    pub id: String,
    pub learner_id: String,
    pub quiz_id: String,
    pub question_id: String,
    pub selected_option: String,
    pub is_correct: bool,
    #[serde(default)]
    pub time_taken: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartQuizRequest {
    #[validate(length(min = 1, max = 100, message = "Topic must be 1-100 characters"))]
    pub topic: String,

    /// Omitted: the recommender picks difficulty and questions
    pub difficulty: Option<Difficulty>,

    pub num_questions: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartQuizResponse {
    pub quiz_id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub adaptive: bool,
    pub questions: Vec<StudentQuestion>,
    pub time_limit_minutes: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuizAnswer {
    #[validate(length(min = 1, message = "question_id is required"))]
    pub question_id: String,
    pub selected_option: String,
    pub time_taken: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    #[validate(length(min = 1, message = "At least one answer is required"), nested)]
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResult {
    pub question_id: String,
    pub selected_option: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub points: u32,
    pub explanation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: String,
    pub learner_id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub status: QuizStatus,
    pub score: u32,
    pub correct_count: u32,
    pub total_questions: u32,
    pub accuracy: f64,
    pub time_taken: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<&QuizAttempt> for QuizResult {
    fn from(attempt: &QuizAttempt) -> Self {
        QuizResult {
            id: attempt.id.clone(),
            learner_id: attempt.learner_id.clone(),
            topic: attempt.topic.clone(),
            difficulty: attempt.difficulty,
            status: attempt.status,
            score: attempt.score,
            correct_count: attempt.correct_count,
            total_questions: attempt.total_questions,
            accuracy: attempt.accuracy(),
            time_taken: attempt.time_taken,
            started_at: attempt.started_at,
            ended_at: attempt.ended_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQuizResponse {
    pub result: QuizResult,
    pub answers: Vec<AnswerResult>,
    pub next_difficulty: Difficulty,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
}
