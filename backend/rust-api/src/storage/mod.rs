//! Persistence behind a single trait so services never see a collection handle.
//!
//! Two backends: [`mongo::MongoStore`] for deployments and
//! [`json_file::JsonFileStore`] for local runs and tests.

use crate::models::{AnswerRecord, Difficulty, Question, QuizAttempt, User};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod json_file;
pub mod mongo;

pub use json_file::JsonFileStore;
pub use mongo::MongoStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("bson deserialization error: {0}")]
    BsonDe(#[from] mongodb::bson::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Answer joined with the question it answers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedAnswer {
    pub answer: AnswerRecord,
    pub question: Question,
}

/// Filter for [`QuizStore::joined_answers`]. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct AnswerQuery {
    pub learner_id: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl AnswerQuery {
    pub fn for_learner(learner_id: impl Into<String>) -> Self {
        Self {
            learner_id: Some(learner_id.into()),
            ..Default::default()
        }
    }

    pub fn all_learners() -> Self {
        Self::default()
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// In-memory equivalent of the Mongo pipeline's two `$match` stages
    pub fn matches(&self, answer: &AnswerRecord, question: &Question) -> bool {
        self.learner_id
            .as_deref()
            .is_none_or(|id| answer.learner_id == id)
            && self.since.is_none_or(|since| answer.timestamp >= since)
            && self.topic.as_deref().is_none_or(|t| question.topic == t)
            && self.difficulty.is_none_or(|d| question.difficulty == d)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// Matches questions carrying any of these tags
    pub any_tags: Option<Vec<String>>,
}

impl QuestionFilter {
    pub fn matches(&self, question: &Question) -> bool {
        self.topic.as_deref().is_none_or(|t| question.topic == t)
            && self.difficulty.is_none_or(|d| question.difficulty == d)
            && self
                .any_tags
                .as_ref()
                .is_none_or(|tags| question.tags.iter().any(|tag| tags.contains(tag)))
    }
}

/// Attempts are returned newest first (by `started_at`)
#[derive(Debug, Clone, Default)]
pub struct AttemptQuery {
    pub learner_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerTally {
    pub total: u64,
    pub correct: u64,
}

impl AnswerTally {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// What [`QuizStore::answer_groups`] groups answers on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerGrouping {
    Topic,
    Difficulty,
    /// UTC calendar day of the answer, then question topic
    DayAndTopic,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupKey {
    Topic(String),
    Difficulty(Difficulty),
    DayAndTopic(NaiveDate, String),
}

/// Totals for one group of joined answers
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerGroup {
    pub key: GroupKey,
    pub total: u64,
    pub correct: u64,
    /// Mean `time_taken` over the answers that recorded one
    pub avg_time: Option<f64>,
}

impl AnswerGroup {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[derive(Default)]
struct Bucket {
    total: u64,
    correct: u64,
    time_sum: u64,
    timed: u64,
}

/// Groups already-joined answers in memory, ascending by key
pub fn group_answers<'a>(
    answers: impl IntoIterator<Item = &'a JoinedAnswer>,
    grouping: AnswerGrouping,
) -> Vec<AnswerGroup> {
    let mut buckets: BTreeMap<GroupKey, Bucket> = BTreeMap::new();
    for joined in answers {
        let key = match grouping {
            AnswerGrouping::Topic => GroupKey::Topic(joined.question.topic.clone()),
            AnswerGrouping::Difficulty => GroupKey::Difficulty(joined.question.difficulty),
            AnswerGrouping::DayAndTopic => GroupKey::DayAndTopic(
                joined.answer.timestamp.date_naive(),
                joined.question.topic.clone(),
            ),
        };
        let bucket = buckets.entry(key).or_default();
        bucket.total += 1;
        if joined.answer.is_correct {
            bucket.correct += 1;
        }
        if let Some(t) = joined.answer.time_taken {
            bucket.time_sum += u64::from(t);
            bucket.timed += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(key, b)| AnswerGroup {
            key,
            total: b.total,
            correct: b.correct,
            avg_time: (b.timed > 0).then(|| b.time_sum as f64 / b.timed as f64),
        })
        .collect()
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    // users
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    async fn list_users(&self, skip: u64, limit: i64) -> StoreResult<Vec<User>>;
    async fn count_users(&self) -> StoreResult<u64>;

    // questions
    async fn insert_question(&self, question: &Question) -> StoreResult<()>;
    async fn get_question(&self, id: &str) -> StoreResult<Option<Question>>;
    /// Questions with the given ids, in no particular order. Unknown ids are skipped.
    async fn get_questions(&self, ids: &[String]) -> StoreResult<Vec<Question>>;
    async fn update_question(&self, question: &Question) -> StoreResult<()>;
    async fn delete_question(&self, id: &str) -> StoreResult<bool>;
    /// Store (insertion) order
    async fn list_questions(
        &self,
        filter: &QuestionFilter,
        skip: u64,
        limit: i64,
    ) -> StoreResult<Vec<Question>>;
    async fn count_questions(&self, filter: &QuestionFilter) -> StoreResult<u64>;

    // quiz attempts
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()>;
    async fn get_attempt(&self, id: &str) -> StoreResult<Option<QuizAttempt>>;
    async fn update_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()>;
    async fn list_attempts(&self, query: &AttemptQuery) -> StoreResult<Vec<QuizAttempt>>;
    async fn count_attempts(&self, learner_id: Option<&str>) -> StoreResult<u64>;
    /// Mean score over completed attempts, 0.0 when there are none
    async fn average_score(&self, learner_id: Option<&str>) -> StoreResult<f64>;

    // answers
    async fn insert_answers(&self, answers: &[AnswerRecord]) -> StoreResult<()>;
    async fn answer_tally(&self, learner_id: Option<&str>) -> StoreResult<AnswerTally>;
    /// Answers joined to their question, filtered, newest first.
    /// Answers whose question no longer exists are dropped.
    async fn joined_answers(&self, query: &AnswerQuery) -> StoreResult<Vec<JoinedAnswer>>;
    /// Per-group totals over the answers `query` selects, ascending by key.
    /// `query.limit` does not apply here.
    async fn answer_groups(
        &self,
        query: &AnswerQuery,
        grouping: AnswerGrouping,
    ) -> StoreResult<Vec<AnswerGroup>>;
    /// Distinct learners with at least one answer at or after `since`
    async fn active_learners_since(&self, since: DateTime<Utc>) -> StoreResult<u64>;
}
