use super::question::Difficulty;
use super::quiz::QuizResult;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicPerformance {
    pub topic: String,
    pub total_questions: u64,
    pub correct_answers: u64,
    pub accuracy: f64,
    /// Mean seconds per answer, over answers that recorded a time
    pub avg_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DifficultyPerformance {
    pub difficulty: Difficulty,
    pub total_questions: u64,
    pub correct_answers: u64,
    pub accuracy: f64,
    pub avg_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentActivity {
    pub question_id: String,
    pub question_content: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub is_correct: bool,
    pub time_taken: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// Accuracy of one topic on one calendar day (UTC)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyPerformance {
    pub date: NaiveDate,
    pub topic: String,
    pub total_questions: u64,
    pub correct_answers: u64,
    pub accuracy: f64,
    pub avg_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementTrends {
    pub daily_performance: Vec<DailyPerformance>,
    pub overall_trend: Trend,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LearnerAnalytics {
    pub learner_id: String,
    pub total_quizzes: u64,
    pub total_questions_answered: u64,
    pub average_score: f64,
    pub accuracy_rate: f64,
    pub topic_performance: Vec<TopicPerformance>,
    pub difficulty_performance: Vec<DifficultyPerformance>,
    pub recent_activity: Vec<RecentActivity>,
    pub improvement_trends: ImprovementTrends,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopularTopic {
    pub topic: String,
    pub total_attempts: u64,
    pub avg_accuracy: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminAnalytics {
    pub total_users: u64,
    pub total_questions: u64,
    pub total_quiz_attempts: u64,
    pub average_platform_score: f64,
    pub popular_topics: Vec<PopularTopic>,
    pub recent_quizzes: Vec<QuizResult>,
    pub active_users: u64,
}
