use super::{
    group_answers, AnswerGroup, AnswerGrouping, AnswerQuery, AnswerTally, AttemptQuery,
    JoinedAnswer, QuestionFilter, QuizStore, StoreResult,
};
use crate::models::{AnswerRecord, Question, QuizAttempt, QuizStatus, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const USERS_FILE: &str = "users.json";
const QUESTIONS_FILE: &str = "questions.json";
const ATTEMPTS_FILE: &str = "quiz_attempts.json";
const ANSWERS_FILE: &str = "user_answers.json";

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    questions: Vec<Question>,
    attempts: Vec<QuizAttempt>,
    answers: Vec<AnswerRecord>,
}

/// Flat-file store: one JSON array per collection, rewritten on every mutation.
///
/// Writers hold the lock while the file is replaced, so the on-disk state
/// always matches some sequence of completed mutations. A mutation reaches
/// memory only after its file was written.
pub struct JsonFileStore {
    dir: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl JsonFileStore {
    /// Opens (creating if needed) the data directory and loads every collection file
    pub async fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let tables = Tables {
            users: load_collection(&dir, USERS_FILE).await?,
            questions: load_collection(&dir, QUESTIONS_FILE).await?,
            attempts: load_collection(&dir, ATTEMPTS_FILE).await?,
            answers: load_collection(&dir, ANSWERS_FILE).await?,
        };

        tracing::info!(
            dir = %dir.display(),
            users = tables.users.len(),
            questions = tables.questions.len(),
            attempts = tables.attempts.len(),
            answers = tables.answers.len(),
            "JSON store loaded"
        );

        Ok(Self {
            dir: Some(dir),
            tables: RwLock::new(tables),
        })
    }

    /// Store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            tables: RwLock::new(Tables::default()),
        }
    }

    async fn persist<T: Serialize>(&self, file: &str, rows: &[T]) -> StoreResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(rows)?;
        let target = dir.join(file);
        let tmp = dir.join(format!("{file}.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }

    /// Runs `change` on a copy of `rows`, writes the copy and then swaps it in
    async fn commit<T, R>(
        &self,
        file: &str,
        rows: &mut Vec<T>,
        change: impl FnOnce(&mut Vec<T>) -> R,
    ) -> StoreResult<R>
    where
        T: Clone + Serialize,
    {
        let mut candidate = rows.clone();
        let outcome = change(&mut candidate);
        if let Err(e) = self.persist(file, &candidate).await {
            tracing::error!(file, error = %e, "JSON store write failed, change discarded");
            return Err(e);
        }
        *rows = candidate;
        Ok(outcome)
    }
}

fn replace_by_id<T: Clone>(rows: &mut [T], row: &T, id: impl Fn(&T) -> &str) {
    let key = id(row);
    if let Some(existing) = rows.iter_mut().find(|r| id(&**r) == key) {
        *existing = row.clone();
    }
}

async fn load_collection<T: DeserializeOwned>(dir: &Path, file: &str) -> StoreResult<Vec<T>> {
    let path = dir.join(file);
    match tokio::fs::read(&path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn page<T: Clone>(rows: impl Iterator<Item = T>, skip: u64, limit: i64) -> Vec<T> {
    let limit = usize::try_from(limit).unwrap_or(0);
    rows.skip(skip as usize).take(limit).collect()
}

/// Answers `query` selects, joined to their question, in store order
fn join_answers(tables: &Tables, query: &AnswerQuery) -> Vec<JoinedAnswer> {
    let questions: HashMap<&str, &Question> = tables
        .questions
        .iter()
        .map(|q| (q.id.as_str(), q))
        .collect();

    tables
        .answers
        .iter()
        .filter_map(|answer| {
            let question = questions.get(answer.question_id.as_str())?;
            query.matches(answer, question).then(|| JoinedAnswer {
                answer: answer.clone(),
                question: (*question).clone(),
            })
        })
        .collect()
}

fn newest_attempts_first(attempts: &mut [QuizAttempt]) {
    attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
}

#[async_trait]
impl QuizStore for JsonFileStore {
    fn backend_name(&self) -> &'static str {
        "json"
    }

    async fn ping(&self) -> StoreResult<()> {
        if let Some(dir) = &self.dir {
            tokio::fs::metadata(dir).await?;
        }
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        self.commit(USERS_FILE, &mut tables.users, |users| users.push(user.clone()))
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        self.commit(USERS_FILE, &mut tables.users, |users| {
            replace_by_id(users, user, |u| &u.id)
        })
        .await
    }

    async fn list_users(&self, skip: u64, limit: i64) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(page(tables.users.iter().cloned(), skip, limit))
    }

    async fn count_users(&self) -> StoreResult<u64> {
        Ok(self.tables.read().await.users.len() as u64)
    }

    async fn insert_question(&self, question: &Question) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        self.commit(QUESTIONS_FILE, &mut tables.questions, |questions| {
            questions.push(question.clone())
        })
        .await
    }

    async fn get_question(&self, id: &str) -> StoreResult<Option<Question>> {
        let tables = self.tables.read().await;
        Ok(tables.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn get_questions(&self, ids: &[String]) -> StoreResult<Vec<Question>> {
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .iter()
            .filter(|q| ids.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn update_question(&self, question: &Question) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        self.commit(QUESTIONS_FILE, &mut tables.questions, |questions| {
            replace_by_id(questions, question, |q| &q.id)
        })
        .await
    }

    async fn delete_question(&self, id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.questions.iter().any(|q| q.id == id) {
            return Ok(false);
        }
        self.commit(QUESTIONS_FILE, &mut tables.questions, |questions| {
            questions.retain(|q| q.id != id)
        })
        .await?;
        Ok(true)
    }

    async fn list_questions(
        &self,
        filter: &QuestionFilter,
        skip: u64,
        limit: i64,
    ) -> StoreResult<Vec<Question>> {
        let tables = self.tables.read().await;
        Ok(page(
            tables.questions.iter().filter(|q| filter.matches(q)).cloned(),
            skip,
            limit,
        ))
    }

    async fn count_questions(&self, filter: &QuestionFilter) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.questions.iter().filter(|q| filter.matches(q)).count() as u64)
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        self.commit(ATTEMPTS_FILE, &mut tables.attempts, |attempts| {
            attempts.push(attempt.clone())
        })
        .await
    }

    async fn get_attempt(&self, id: &str) -> StoreResult<Option<QuizAttempt>> {
        let tables = self.tables.read().await;
        Ok(tables.attempts.iter().find(|a| a.id == id).cloned())
    }

    async fn update_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        self.commit(ATTEMPTS_FILE, &mut tables.attempts, |attempts| {
            replace_by_id(attempts, attempt, |a| &a.id)
        })
        .await
    }

    async fn list_attempts(&self, query: &AttemptQuery) -> StoreResult<Vec<QuizAttempt>> {
        let tables = self.tables.read().await;
        let mut attempts: Vec<QuizAttempt> = tables
            .attempts
            .iter()
            .filter(|a| {
                query
                    .learner_id
                    .as_deref()
                    .is_none_or(|id| a.learner_id == id)
            })
            .cloned()
            .collect();
        newest_attempts_first(&mut attempts);
        if let Some(limit) = query.limit {
            attempts.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(attempts)
    }

    async fn count_attempts(&self, learner_id: Option<&str>) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .iter()
            .filter(|a| learner_id.is_none_or(|id| a.learner_id == id))
            .count() as u64)
    }

    async fn average_score(&self, learner_id: Option<&str>) -> StoreResult<f64> {
        let tables = self.tables.read().await;
        let scores: Vec<f64> = tables
            .attempts
            .iter()
            .filter(|a| a.status == QuizStatus::Completed)
            .filter(|a| learner_id.is_none_or(|id| a.learner_id == id))
            .map(|a| a.score as f64)
            .collect();
        if scores.is_empty() {
            return Ok(0.0);
        }
        Ok(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    async fn insert_answers(&self, answers: &[AnswerRecord]) -> StoreResult<()> {
        if answers.is_empty() {
            return Ok(());
        }
        let mut tables = self.tables.write().await;
        self.commit(ANSWERS_FILE, &mut tables.answers, |rows| {
            rows.extend_from_slice(answers)
        })
        .await
    }

    async fn answer_tally(&self, learner_id: Option<&str>) -> StoreResult<AnswerTally> {
        let tables = self.tables.read().await;
        Ok(tables
            .answers
            .iter()
            .filter(|a| learner_id.is_none_or(|id| a.learner_id == id))
            .fold(AnswerTally::default(), |mut tally, a| {
                tally.total += 1;
                if a.is_correct {
                    tally.correct += 1;
                }
                tally
            }))
    }

    async fn joined_answers(&self, query: &AnswerQuery) -> StoreResult<Vec<JoinedAnswer>> {
        let tables = self.tables.read().await;
        let mut joined = join_answers(&tables, query);

        // stable sort keeps insertion order between equal timestamps
        joined.sort_by(|a, b| b.answer.timestamp.cmp(&a.answer.timestamp));
        if let Some(limit) = query.limit {
            joined.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(joined)
    }

    async fn answer_groups(
        &self,
        query: &AnswerQuery,
        grouping: AnswerGrouping,
    ) -> StoreResult<Vec<AnswerGroup>> {
        let tables = self.tables.read().await;
        Ok(group_answers(&join_answers(&tables, query), grouping))
    }

    async fn active_learners_since(&self, since: DateTime<Utc>) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        let learners: HashSet<&str> = tables
            .answers
            .iter()
            .filter(|a| a.timestamp >= since)
            .map(|a| a.learner_id.as_str())
            .collect();
        Ok(learners.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, QuestionType, UserRole};
    use crate::storage::GroupKey;
    use chrono::Duration;

    fn question(id: &str, topic: &str, difficulty: Difficulty, tags: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            title: format!("Question {id}"),
            content: format!("Content for question {id}"),
            question_type: QuestionType::ShortAnswer,
            topic: topic.to_string(),
            difficulty,
            options: None,
            correct_answer: "42".to_string(),
            explanation: None,
            points: 1,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn answer(id: &str, learner: &str, question_id: &str, correct: bool, age_secs: i64) -> AnswerRecord {
        AnswerRecord {
            id: id.to_string(),
            learner_id: learner.to_string(),
            quiz_id: "quiz".to_string(),
            question_id: question_id.to_string(),
            selected_option: "x".to_string(),
            is_correct: correct,
            time_taken: Some(10),
            timestamp: Utc::now() - Duration::seconds(age_secs),
        }
    }

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: UserRole::Student,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.insert_user(&user("u1", "a@example.com")).await.unwrap();
            store
                .insert_question(&question("q1", "math", Difficulty::Easy, &[]))
                .await
                .unwrap();
        }
        assert!(dir.path().join(USERS_FILE).exists());
        assert!(!dir.path().join(format!("{USERS_FILE}.tmp")).exists());

        let reopened = JsonFileStore::open(dir.path()).await.unwrap();
        let found = reopened.find_user_by_email("a@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));
        assert_eq!(
            reopened.count_questions(&QuestionFilter::default()).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        std::fs::remove_dir_all(dir.path()).unwrap();

        let q1 = question("q1", "math", Difficulty::Easy, &[]);
        assert!(store.insert_question(&q1).await.is_err());
        assert!(store.get_question("q1").await.unwrap().is_none());
        assert!(store
            .insert_answers(&[answer("a1", "u1", "q1", true, 5)])
            .await
            .is_err());
        assert_eq!(store.answer_tally(None).await.unwrap().total, 0);

        // a retry once the directory is back writes the row exactly once
        std::fs::create_dir_all(dir.path()).unwrap();
        store.insert_question(&q1).await.unwrap();
        assert_eq!(
            store.count_questions(&QuestionFilter::default()).await.unwrap(),
            1
        );
        let reopened = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(reopened.get_question("q1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn joined_answers_filters_on_question_fields_and_sorts_newest_first() {
        let store = JsonFileStore::in_memory();
        store
            .insert_question(&question("m1", "math", Difficulty::Easy, &[]))
            .await
            .unwrap();
        store
            .insert_question(&question("m2", "math", Difficulty::Hard, &[]))
            .await
            .unwrap();
        store
            .insert_question(&question("s1", "science", Difficulty::Easy, &[]))
            .await
            .unwrap();
        store
            .insert_answers(&[
                answer("a1", "u1", "m1", true, 30),
                answer("a2", "u1", "s1", true, 20),
                answer("a3", "u1", "m2", false, 10),
                answer("a4", "u2", "m1", true, 5),
                answer("a5", "u1", "deleted", true, 1),
            ])
            .await
            .unwrap();

        let math = store
            .joined_answers(&AnswerQuery::for_learner("u1").topic("math"))
            .await
            .unwrap();
        let ids: Vec<&str> = math.iter().map(|j| j.answer.id.as_str()).collect();
        assert_eq!(ids, vec!["a3", "a1"]);

        let easy_math = store
            .joined_answers(
                &AnswerQuery::for_learner("u1")
                    .topic("math")
                    .difficulty(Difficulty::Easy),
            )
            .await
            .unwrap();
        assert_eq!(easy_math.len(), 1);
        assert_eq!(easy_math[0].question.id, "m1");

        let limited = store
            .joined_answers(&AnswerQuery::all_learners().limit(2))
            .await
            .unwrap();
        let ids: Vec<&str> = limited.iter().map(|j| j.answer.id.as_str()).collect();
        assert_eq!(ids, vec!["a4", "a3"]);
    }

    #[tokio::test]
    async fn answer_groups_apply_the_query_before_grouping() {
        let store = JsonFileStore::in_memory();
        store
            .insert_question(&question("m1", "math", Difficulty::Easy, &[]))
            .await
            .unwrap();
        store
            .insert_question(&question("s1", "science", Difficulty::Hard, &[]))
            .await
            .unwrap();
        store
            .insert_answers(&[
                answer("a1", "u1", "m1", true, 60),
                answer("a2", "u1", "m1", false, 60),
                answer("a3", "u1", "s1", true, 3600 * 24 * 40),
                answer("a4", "u2", "s1", true, 60),
                answer("a5", "u1", "deleted", true, 60),
            ])
            .await
            .unwrap();

        let month = AnswerQuery::for_learner("u1").since(Utc::now() - Duration::days(30));
        let groups = store
            .answer_groups(&month, AnswerGrouping::Topic)
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, GroupKey::Topic("math".to_string()));
        assert_eq!((groups[0].total, groups[0].correct), (2, 1));
        assert_eq!(groups[0].avg_time, Some(10.0));

        let everyone = store
            .answer_groups(&AnswerQuery::all_learners(), AnswerGrouping::Difficulty)
            .await
            .unwrap();
        let totals: Vec<(GroupKey, u64)> =
            everyone.into_iter().map(|g| (g.key, g.total)).collect();
        assert_eq!(
            totals,
            vec![
                (GroupKey::Difficulty(Difficulty::Easy), 2),
                (GroupKey::Difficulty(Difficulty::Hard), 2),
            ]
        );
    }

    #[tokio::test]
    async fn question_filter_and_paging() {
        let store = JsonFileStore::in_memory();
        for (i, tags) in [&["algebra"][..], &["geometry"], &["algebra", "basic"]]
            .iter()
            .enumerate()
        {
            store
                .insert_question(&question(&format!("q{i}"), "math", Difficulty::Medium, tags))
                .await
                .unwrap();
        }

        let algebra = QuestionFilter {
            any_tags: Some(vec!["algebra".to_string()]),
            ..Default::default()
        };
        assert_eq!(store.count_questions(&algebra).await.unwrap(), 2);

        let second_page = store
            .list_questions(&QuestionFilter::default(), 1, 1)
            .await
            .unwrap();
        assert_eq!(second_page[0].id, "q1");

        assert!(store.delete_question("q1").await.unwrap());
        assert!(!store.delete_question("q1").await.unwrap());
    }

    #[tokio::test]
    async fn tally_and_active_learners() {
        let store = JsonFileStore::in_memory();
        store
            .insert_answers(&[
                answer("a1", "u1", "q", true, 60),
                answer("a2", "u1", "q", false, 60),
                answer("a3", "u2", "q", true, 3600 * 24 * 10),
            ])
            .await
            .unwrap();

        let tally = store.answer_tally(Some("u1")).await.unwrap();
        assert_eq!(tally, AnswerTally { total: 2, correct: 1 });
        assert_eq!(tally.accuracy(), 0.5);

        let week_ago = Utc::now() - Duration::days(7);
        assert_eq!(store.active_learners_since(week_ago).await.unwrap(), 1);
    }
}
