use super::{
    AnswerGroup, AnswerGrouping, AnswerQuery, AnswerTally, AttemptQuery, GroupKey, JoinedAnswer,
    QuestionFilter, QuizStore, StoreResult,
};
use crate::models::{
    AnswerRecord, Difficulty, Question, QuestionType, QuizAttempt, QuizStatus, User, UserRole,
};
use crate::utils::time::{
    bson_datetime_as_chrono, bson_datetime_as_chrono_option, chrono_to_bson,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    options::{FindOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const USERS: &str = "users";
const QUESTIONS: &str = "questions";
const ATTEMPTS: &str = "quiz_attempts";
const ANSWERS: &str = "user_answers";

// Documents mirror the domain models with `_id` keys and BSON dates so that
// `$sort` and `$gte` on timestamps compare chronologically.

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    email: String,
    password_hash: String,
    role: UserRole,
    is_active: bool,
    #[serde(with = "bson_datetime_as_chrono")]
    created_at: DateTime<Utc>,
    #[serde(default, with = "bson_datetime_as_chrono_option")]
    updated_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        UserDocument {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.id,
            name: doc.name,
            email: doc.email,
            password_hash: doc.password_hash,
            role: doc.role,
            is_active: doc.is_active,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct QuestionDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    content: String,
    question_type: QuestionType,
    topic: String,
    difficulty: Difficulty,
    #[serde(default)]
    options: Option<Vec<String>>,
    correct_answer: String,
    #[serde(default)]
    explanation: Option<String>,
    points: u32,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(with = "bson_datetime_as_chrono")]
    created_at: DateTime<Utc>,
    #[serde(default, with = "bson_datetime_as_chrono_option")]
    updated_at: Option<DateTime<Utc>>,
}

impl From<&Question> for QuestionDocument {
    fn from(q: &Question) -> Self {
        QuestionDocument {
            id: q.id.clone(),
            title: q.title.clone(),
            content: q.content.clone(),
            question_type: q.question_type,
            topic: q.topic.clone(),
            difficulty: q.difficulty,
            options: q.options.clone(),
            correct_answer: q.correct_answer.clone(),
            explanation: q.explanation.clone(),
            points: q.points,
            tags: q.tags.clone(),
            created_at: q.created_at,
            updated_at: q.updated_at,
        }
    }
}

impl From<QuestionDocument> for Question {
    fn from(doc: QuestionDocument) -> Self {
        Question {
            id: doc.id,
            title: doc.title,
            content: doc.content,
            question_type: doc.question_type,
            topic: doc.topic,
            difficulty: doc.difficulty,
            options: doc.options,
            correct_answer: doc.correct_answer,
            explanation: doc.explanation,
            points: doc.points,
            tags: doc.tags,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AttemptDocument {
    #[serde(rename = "_id")]
    id: String,
    learner_id: String,
    topic: String,
    difficulty: Difficulty,
    question_ids: Vec<String>,
    status: QuizStatus,
    adaptive: bool,
    #[serde(with = "bson_datetime_as_chrono")]
    started_at: DateTime<Utc>,
    #[serde(default, with = "bson_datetime_as_chrono_option")]
    ended_at: Option<DateTime<Utc>>,
    score: u32,
    correct_count: u32,
    total_questions: u32,
    #[serde(default)]
    time_taken: Option<u32>,
}

impl From<&QuizAttempt> for AttemptDocument {
    fn from(a: &QuizAttempt) -> Self {
        AttemptDocument {
            id: a.id.clone(),
            learner_id: a.learner_id.clone(),
            topic: a.topic.clone(),
            difficulty: a.difficulty,
            question_ids: a.question_ids.clone(),
            status: a.status,
            adaptive: a.adaptive,
            started_at: a.started_at,
            ended_at: a.ended_at,
            score: a.score,
            correct_count: a.correct_count,
            total_questions: a.total_questions,
            time_taken: a.time_taken,
        }
    }
}

impl From<AttemptDocument> for QuizAttempt {
    fn from(doc: AttemptDocument) -> Self {
        QuizAttempt {
            id: doc.id,
            learner_id: doc.learner_id,
            topic: doc.topic,
            difficulty: doc.difficulty,
            question_ids: doc.question_ids,
            status: doc.status,
            adaptive: doc.adaptive,
            started_at: doc.started_at,
            ended_at: doc.ended_at,
            score: doc.score,
            correct_count: doc.correct_count,
            total_questions: doc.total_questions,
            time_taken: doc.time_taken,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AnswerDocument {
    #[serde(rename = "_id")]
    id: String,
    learner_id: String,
    quiz_id: String,
    question_id: String,
    selected_option: String,
    is_correct: bool,
    #[serde(default)]
    time_taken: Option<u32>,
    #[serde(with = "bson_datetime_as_chrono")]
    timestamp: DateTime<Utc>,
}

impl From<&AnswerRecord> for AnswerDocument {
    fn from(a: &AnswerRecord) -> Self {
        AnswerDocument {
            id: a.id.clone(),
            learner_id: a.learner_id.clone(),
            quiz_id: a.quiz_id.clone(),
            question_id: a.question_id.clone(),
            selected_option: a.selected_option.clone(),
            is_correct: a.is_correct,
            time_taken: a.time_taken,
            timestamp: a.timestamp,
        }
    }
}

impl From<AnswerDocument> for AnswerRecord {
    fn from(doc: AnswerDocument) -> Self {
        AnswerRecord {
            id: doc.id,
            learner_id: doc.learner_id,
            quiz_id: doc.quiz_id,
            question_id: doc.question_id,
            selected_option: doc.selected_option,
            is_correct: doc.is_correct,
            time_taken: doc.time_taken,
            timestamp: doc.timestamp,
        }
    }
}

/// Shape produced by the `$replaceRoot` stage of the join pipeline
#[derive(Debug, Deserialize)]
struct JoinedAnswerDocument {
    answer: AnswerDocument,
    question: QuestionDocument,
}

/// One row of the `$group` stage in [`answer_groups_pipeline`]
#[derive(Debug, Deserialize)]
struct GroupDocument<K> {
    #[serde(rename = "_id")]
    key: K,
    total: u64,
    correct: u64,
    #[serde(default)]
    avg_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DayTopicKey {
    date: NaiveDate,
    topic: String,
}

/// MongoDB-backed store
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let store = Self::new(client.database(database));
        store.ensure_indexes().await?;
        tracing::info!(database = %database, "MongoDB store ready");
        Ok(store)
    }

    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn users(&self) -> Collection<UserDocument> {
        self.db.collection(USERS)
    }

    fn questions(&self) -> Collection<QuestionDocument> {
        self.db.collection(QUESTIONS)
    }

    fn attempts(&self) -> Collection<AttemptDocument> {
        self.db.collection(ATTEMPTS)
    }

    fn answers(&self) -> Collection<AnswerDocument> {
        self.db.collection(ANSWERS)
    }

    /// Idempotent; Mongo ignores indexes that already exist with the same spec
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;

        for keys in [
            doc! { "topic": 1 },
            doc! { "difficulty": 1 },
            doc! { "topic": 1, "difficulty": 1 },
        ] {
            self.questions()
                .create_index(IndexModel::builder().keys(keys).build())
                .await?;
        }

        self.answers()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "learner_id": 1, "timestamp": -1 })
                    .build(),
            )
            .await?;
        self.attempts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "learner_id": 1, "started_at": -1 })
                    .build(),
            )
            .await?;

        tracing::debug!("MongoDB indexes ensured");
        Ok(())
    }

    async fn grouped<K>(
        &self,
        pipeline: Vec<Document>,
        into_key: fn(K) -> GroupKey,
    ) -> StoreResult<Vec<AnswerGroup>>
    where
        K: DeserializeOwned + Send,
    {
        let mut cursor = self.answers().aggregate(pipeline).await?;
        let mut groups = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let row: GroupDocument<K> = bson::from_document(doc)?;
            groups.push(AnswerGroup {
                key: into_key(row.key),
                total: row.total,
                correct: row.correct,
                avg_time: row.avg_time,
            });
        }
        Ok(groups)
    }
}

fn learner_filter(learner_id: Option<&str>) -> Document {
    match learner_id {
        Some(id) => doc! { "learner_id": id },
        None => Document::new(),
    }
}

fn question_filter(filter: &QuestionFilter) -> Document {
    let mut doc = Document::new();
    if let Some(topic) = &filter.topic {
        doc.insert("topic", topic.as_str());
    }
    if let Some(difficulty) = filter.difficulty {
        doc.insert("difficulty", difficulty.as_str());
    }
    if let Some(tags) = &filter.any_tags {
        doc.insert("tags", doc! { "$in": tags.clone() });
    }
    doc
}

/// `$match` on answer fields, `$lookup` of the question, then `$match` on question fields
fn answer_join_stages(query: &AnswerQuery) -> Vec<Document> {
    let mut answer_match = Document::new();
    if let Some(learner_id) = &query.learner_id {
        answer_match.insert("learner_id", learner_id.as_str());
    }
    if let Some(since) = query.since {
        answer_match.insert("timestamp", doc! { "$gte": chrono_to_bson(since) });
    }

    let mut question_match = Document::new();
    if let Some(topic) = &query.topic {
        question_match.insert("question.topic", topic.as_str());
    }
    if let Some(difficulty) = query.difficulty {
        question_match.insert("question.difficulty", difficulty.as_str());
    }

    let mut pipeline = Vec::new();
    if !answer_match.is_empty() {
        pipeline.push(doc! { "$match": answer_match });
    }
    pipeline.extend([
        doc! {
            "$lookup": {
                "from": QUESTIONS,
                "localField": "question_id",
                "foreignField": "_id",
                "as": "question"
            }
        },
        doc! { "$unwind": "$question" },
    ]);
    if !question_match.is_empty() {
        pipeline.push(doc! { "$match": question_match });
    }
    pipeline
}

/// Join stages followed by `$sort`/`$limit`/`$replaceRoot`
fn joined_answers_pipeline(query: &AnswerQuery) -> Vec<Document> {
    let mut pipeline = answer_join_stages(query);
    pipeline.push(doc! { "$sort": { "timestamp": -1, "_id": 1 } });
    if let Some(limit) = query.limit {
        pipeline.push(doc! { "$limit": limit });
    }
    pipeline.push(doc! {
        "$replaceRoot": { "newRoot": { "answer": "$$ROOT", "question": "$question" } }
    });
    pipeline
}

/// Join stages followed by one `$group` on the requested key
fn answer_groups_pipeline(query: &AnswerQuery, grouping: AnswerGrouping) -> Vec<Document> {
    let key = match grouping {
        AnswerGrouping::Topic => Bson::from("$question.topic"),
        AnswerGrouping::Difficulty => Bson::from("$question.difficulty"),
        AnswerGrouping::DayAndTopic => Bson::from(doc! {
            "date": { "$dateToString": { "format": "%Y-%m-%d", "date": "$timestamp" } },
            "topic": "$question.topic"
        }),
    };

    let mut pipeline = answer_join_stages(query);
    pipeline.push(doc! {
        "$group": {
            "_id": key,
            "total": { "$sum": 1 },
            "correct": { "$sum": { "$cond": ["$is_correct", 1, 0] } },
            "avg_time": { "$avg": "$time_taken" }
        }
    });
    pipeline
}

/// `$sum` yields Int32 or Int64 depending on magnitude
fn read_count(doc: &Document, key: &str) -> u64 {
    match doc.get(key) {
        Some(Bson::Int32(v)) => *v as u64,
        Some(Bson::Int64(v)) => *v as u64,
        Some(Bson::Double(v)) => *v as u64,
        _ => 0,
    }
}

#[async_trait]
impl QuizStore for MongoStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.users().insert_one(UserDocument::from(user)).await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let found = self.users().find_one(doc! { "email": email }).await?;
        Ok(found.map(User::from))
    }

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let found = self.users().find_one(doc! { "_id": id }).await?;
        Ok(found.map(User::from))
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.users()
            .replace_one(doc! { "_id": &user.id }, UserDocument::from(user))
            .await?;
        Ok(())
    }

    async fn list_users(&self, skip: u64, limit: i64) -> StoreResult<Vec<User>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .skip(skip)
            .limit(limit)
            .build();
        let docs: Vec<UserDocument> = self
            .users()
            .find(doc! {})
            .with_options(options)
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(User::from).collect())
    }

    async fn count_users(&self) -> StoreResult<u64> {
        Ok(self.users().count_documents(doc! {}).await?)
    }

    async fn insert_question(&self, question: &Question) -> StoreResult<()> {
        self.questions()
            .insert_one(QuestionDocument::from(question))
            .await?;
        Ok(())
    }

    async fn get_question(&self, id: &str) -> StoreResult<Option<Question>> {
        let found = self.questions().find_one(doc! { "_id": id }).await?;
        Ok(found.map(Question::from))
    }

    async fn get_questions(&self, ids: &[String]) -> StoreResult<Vec<Question>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let docs: Vec<QuestionDocument> = self
            .questions()
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(Question::from).collect())
    }

    async fn update_question(&self, question: &Question) -> StoreResult<()> {
        self.questions()
            .replace_one(doc! { "_id": &question.id }, QuestionDocument::from(question))
            .await?;
        Ok(())
    }

    async fn delete_question(&self, id: &str) -> StoreResult<bool> {
        let result = self.questions().delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn list_questions(
        &self,
        filter: &QuestionFilter,
        skip: u64,
        limit: i64,
    ) -> StoreResult<Vec<Question>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .skip(skip)
            .limit(limit)
            .build();
        let docs: Vec<QuestionDocument> = self
            .questions()
            .find(question_filter(filter))
            .with_options(options)
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(Question::from).collect())
    }

    async fn count_questions(&self, filter: &QuestionFilter) -> StoreResult<u64> {
        Ok(self
            .questions()
            .count_documents(question_filter(filter))
            .await?)
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        self.attempts()
            .insert_one(AttemptDocument::from(attempt))
            .await?;
        Ok(())
    }

    async fn get_attempt(&self, id: &str) -> StoreResult<Option<QuizAttempt>> {
        let found = self.attempts().find_one(doc! { "_id": id }).await?;
        Ok(found.map(QuizAttempt::from))
    }

    async fn update_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        self.attempts()
            .replace_one(doc! { "_id": &attempt.id }, AttemptDocument::from(attempt))
            .await?;
        Ok(())
    }

    async fn list_attempts(&self, query: &AttemptQuery) -> StoreResult<Vec<QuizAttempt>> {
        let options = FindOptions::builder()
            .sort(doc! { "started_at": -1 })
            .limit(query.limit)
            .build();
        let docs: Vec<AttemptDocument> = self
            .attempts()
            .find(learner_filter(query.learner_id.as_deref()))
            .with_options(options)
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(QuizAttempt::from).collect())
    }

    async fn count_attempts(&self, learner_id: Option<&str>) -> StoreResult<u64> {
        Ok(self
            .attempts()
            .count_documents(learner_filter(learner_id))
            .await?)
    }

    async fn average_score(&self, learner_id: Option<&str>) -> StoreResult<f64> {
        let mut filter = learner_filter(learner_id);
        filter.insert("status", "completed");
        let pipeline = vec![
            doc! { "$match": filter },
            doc! { "$group": { "_id": Bson::Null, "avg_score": { "$avg": "$score" } } },
        ];

        let mut cursor = self.attempts().aggregate(pipeline).await?;
        match cursor.try_next().await? {
            Some(doc) => Ok(doc.get_f64("avg_score").unwrap_or(0.0)),
            None => Ok(0.0),
        }
    }

    async fn insert_answers(&self, answers: &[AnswerRecord]) -> StoreResult<()> {
        if answers.is_empty() {
            return Ok(());
        }
        let docs: Vec<AnswerDocument> = answers.iter().map(AnswerDocument::from).collect();
        self.answers().insert_many(docs).await?;
        Ok(())
    }

    async fn answer_tally(&self, learner_id: Option<&str>) -> StoreResult<AnswerTally> {
        let pipeline = vec![
            doc! { "$match": learner_filter(learner_id) },
            doc! {
                "$group": {
                    "_id": Bson::Null,
                    "total": { "$sum": 1 },
                    "correct": { "$sum": { "$cond": ["$is_correct", 1, 0] } }
                }
            },
        ];

        let mut cursor = self.answers().aggregate(pipeline).await?;
        Ok(match cursor.try_next().await? {
            Some(doc) => AnswerTally {
                total: read_count(&doc, "total"),
                correct: read_count(&doc, "correct"),
            },
            None => AnswerTally::default(),
        })
    }

    async fn joined_answers(&self, query: &AnswerQuery) -> StoreResult<Vec<JoinedAnswer>> {
        let mut cursor = self
            .answers()
            .aggregate(joined_answers_pipeline(query))
            .await?;

        let mut joined = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let row: JoinedAnswerDocument = bson::from_document(doc)?;
            joined.push(JoinedAnswer {
                answer: row.answer.into(),
                question: row.question.into(),
            });
        }
        Ok(joined)
    }

    async fn answer_groups(
        &self,
        query: &AnswerQuery,
        grouping: AnswerGrouping,
    ) -> StoreResult<Vec<AnswerGroup>> {
        let pipeline = answer_groups_pipeline(query, grouping);
        let mut groups = match grouping {
            AnswerGrouping::Topic => self.grouped::<String>(pipeline, GroupKey::Topic).await?,
            AnswerGrouping::Difficulty => {
                self.grouped::<Difficulty>(pipeline, GroupKey::Difficulty)
                    .await?
            }
            AnswerGrouping::DayAndTopic => {
                self.grouped(pipeline, |k: DayTopicKey| {
                    GroupKey::DayAndTopic(k.date, k.topic)
                })
                .await?
            }
        };
        // difficulty names do not sort by rank, so order by key here
        groups.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(groups)
    }

    async fn active_learners_since(&self, since: DateTime<Utc>) -> StoreResult<u64> {
        let pipeline = vec![
            doc! { "$match": { "timestamp": { "$gte": chrono_to_bson(since) } } },
            doc! { "$group": { "_id": "$learner_id" } },
            doc! { "$count": "active_users" },
        ];

        let mut cursor = self.answers().aggregate(pipeline).await?;
        Ok(match cursor.try_next().await? {
            Some(doc) => read_count(&doc, "active_users"),
            None => 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_matches_answers_before_lookup_and_questions_after() {
        let query = AnswerQuery::for_learner("u1")
            .topic("math")
            .difficulty(Difficulty::Easy)
            .limit(5);
        let pipeline = joined_answers_pipeline(&query);

        let stages: Vec<&str> = pipeline
            .iter()
            .filter_map(|stage| stage.keys().next().map(String::as_str))
            .collect();
        assert_eq!(
            stages,
            vec!["$match", "$lookup", "$unwind", "$match", "$sort", "$limit", "$replaceRoot"]
        );
        assert_eq!(
            pipeline[3].get_document("$match").unwrap(),
            &doc! { "question.topic": "math", "question.difficulty": "easy" }
        );
        assert_eq!(pipeline[5].get_i64("$limit").unwrap(), 5);
    }

    #[test]
    fn pipeline_without_filters_has_no_match_stages() {
        let pipeline = joined_answers_pipeline(&AnswerQuery::all_learners());
        assert!(pipeline.iter().all(|stage| !stage.contains_key("$match")));
        assert!(pipeline.iter().all(|stage| !stage.contains_key("$limit")));
    }

    #[test]
    fn group_pipeline_buckets_by_day_and_topic_after_the_join() {
        let since = Utc::now();
        let query = AnswerQuery::for_learner("u1").since(since).limit(3);
        let pipeline = answer_groups_pipeline(&query, AnswerGrouping::DayAndTopic);

        let stages: Vec<&str> = pipeline
            .iter()
            .filter_map(|stage| stage.keys().next().map(String::as_str))
            .collect();
        assert_eq!(stages, vec!["$match", "$lookup", "$unwind", "$group"]);
        assert_eq!(
            pipeline[0].get_document("$match").unwrap(),
            &doc! { "learner_id": "u1", "timestamp": { "$gte": chrono_to_bson(since) } }
        );

        let group = pipeline[3].get_document("$group").unwrap();
        assert_eq!(
            group.get_document("_id").unwrap(),
            &doc! {
                "date": { "$dateToString": { "format": "%Y-%m-%d", "date": "$timestamp" } },
                "topic": "$question.topic"
            }
        );
        assert_eq!(
            group.get_document("avg_time").unwrap(),
            &doc! { "$avg": "$time_taken" }
        );
    }

    #[test]
    fn topic_groups_over_all_learners_skip_the_answer_match() {
        let pipeline = answer_groups_pipeline(&AnswerQuery::all_learners(), AnswerGrouping::Topic);
        assert!(pipeline[0].contains_key("$lookup"));
        let group = pipeline.last().unwrap().get_document("$group").unwrap();
        assert_eq!(group.get_str("_id").unwrap(), "$question.topic");
    }

    #[test]
    fn group_rows_decode_any_count_width_and_missing_times() {
        let row: GroupDocument<Difficulty> = bson::from_document(doc! {
            "_id": "hard", "total": 3_i32, "correct": 2_i64, "avg_time": Bson::Null
        })
        .unwrap();
        assert_eq!(row.key, Difficulty::Hard);
        assert_eq!((row.total, row.correct), (3, 2));
        assert_eq!(row.avg_time, None);

        let row: GroupDocument<DayTopicKey> = bson::from_document(doc! {
            "_id": { "date": "2024-03-05", "topic": "math" },
            "total": 4_i32, "correct": 1_i32, "avg_time": 12.5
        })
        .unwrap();
        assert_eq!(row.key.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(row.avg_time, Some(12.5));
    }

    #[test]
    fn question_filter_uses_in_for_tags() {
        let filter = QuestionFilter {
            topic: Some("math".to_string()),
            difficulty: None,
            any_tags: Some(vec!["algebra".to_string()]),
        };
        assert_eq!(
            question_filter(&filter),
            doc! { "topic": "math", "tags": { "$in": ["algebra"] } }
        );
    }

    #[test]
    fn counts_accept_any_integer_width() {
        let doc = doc! { "a": 3_i32, "b": 4_i64, "c": 2.0 };
        assert_eq!(read_count(&doc, "a"), 3);
        assert_eq!(read_count(&doc, "b"), 4);
        assert_eq!(read_count(&doc, "c"), 2);
        assert_eq!(read_count(&doc, "missing"), 0);
    }
}
