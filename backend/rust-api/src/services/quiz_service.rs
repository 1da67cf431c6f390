use crate::config::QuizSettings;
use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, QUIZZES_TOTAL};
use crate::models::quiz::{
    AnswerResult, QuizResult, StartQuizRequest, StartQuizResponse, SubmitQuizRequest,
    SubmitQuizResponse,
};
use crate::models::{AnswerRecord, Question, QuizAttempt, QuizStatus, StudentQuestion};
use crate::services::adaptive_service::AdaptiveService;
use crate::services::{ServiceError, ServiceResult};
use crate::storage::{AttemptQuery, QuestionFilter, QuizStore};
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_HISTORY_LIMIT: u64 = 20;
pub const MAX_HISTORY_LIMIT: u64 = 100;
/// Gap between the stamps of consecutive answers in one submission.
/// BSON dates hold milliseconds, so this cannot go lower.
const ANSWER_STAMP_STEP_MS: i64 = 1;

pub struct QuizService {
    store: Arc<dyn QuizStore>,
    settings: QuizSettings,
}

impl QuizService {
    pub fn new(store: Arc<dyn QuizStore>, settings: QuizSettings) -> Self {
        Self { store, settings }
    }

    fn adaptive(&self) -> AdaptiveService {
        AdaptiveService::new(self.store.clone())
    }

    /// Creates an in-progress attempt. Without a difficulty the recommender
    /// chooses both the difficulty and the questions.
    pub async fn start(
        &self,
        learner_id: &str,
        req: StartQuizRequest,
    ) -> ServiceResult<StartQuizResponse> {
        let topic = req.topic.trim().to_string();
        let count = NonZeroU32::new(
            req.num_questions
                .unwrap_or(self.settings.default_questions)
                .clamp(1, self.settings.max_questions.max(1)),
        )
        .unwrap_or(NonZeroU32::MIN);

        let (difficulty, questions, adaptive) = match req.difficulty {
            Some(difficulty) => {
                let filter = QuestionFilter {
                    topic: Some(topic.clone()),
                    difficulty: Some(difficulty),
                    any_tags: None,
                };
                let questions = self
                    .store
                    .list_questions(&filter, 0, i64::from(count.get()))
                    .await?;
                (difficulty, questions, false)
            }
            None => {
                let (difficulty, questions) = self
                    .adaptive()
                    .recommended_batch(learner_id, &topic, count)
                    .await?;
                (difficulty, questions, true)
            }
        };

        if questions.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "No {} questions available for topic '{}'",
                difficulty, topic
            )));
        }

        let attempt = QuizAttempt {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            topic: topic.clone(),
            difficulty,
            question_ids: questions.iter().map(|q| q.id.clone()).collect(),
            status: QuizStatus::InProgress,
            adaptive,
            started_at: Utc::now(),
            ended_at: None,
            score: 0,
            correct_count: 0,
            total_questions: questions.len() as u32,
            time_taken: None,
        };
        self.store.insert_attempt(&attempt).await?;

        QUIZZES_TOTAL.with_label_values(&["started"]).inc();
        tracing::info!(
            quiz_id = %attempt.id,
            learner_id,
            topic = %topic,
            difficulty = %difficulty,
            adaptive,
            questions = attempt.total_questions,
            "Quiz started"
        );

        Ok(StartQuizResponse {
            quiz_id: attempt.id,
            topic,
            difficulty,
            adaptive,
            questions: questions.iter().map(StudentQuestion::from).collect(),
            time_limit_minutes: self.settings.time_limit_minutes,
            started_at: attempt.started_at,
        })
    }

    /// Grades the answers, appends one answer record per answer and closes the attempt.
    ///
    /// Records are stamped strictly increasing in the order the answers were
    /// given, so the streak check reads the last answer as the newest.
    pub async fn submit(
        &self,
        learner_id: &str,
        quiz_id: &str,
        req: SubmitQuizRequest,
    ) -> ServiceResult<SubmitQuizResponse> {
        let mut attempt = self.owned_attempt(learner_id, quiz_id).await?;
        if attempt.status == QuizStatus::Completed {
            return Err(ServiceError::Conflict(
                "Quiz has already been submitted".to_string(),
            ));
        }

        let allowed: HashSet<&str> = attempt.question_ids.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        for answer in &req.answers {
            if !allowed.contains(answer.question_id.as_str()) {
                return Err(ServiceError::BadRequest(format!(
                    "Question {} is not part of this quiz",
                    answer.question_id
                )));
            }
            if !seen.insert(answer.question_id.as_str()) {
                return Err(ServiceError::BadRequest(format!(
                    "Question {} was answered more than once",
                    answer.question_id
                )));
            }
        }

        let questions: HashMap<String, Question> = self
            .store
            .get_questions(&attempt.question_ids)
            .await?
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect();

        let now = Utc::now();
        let mut records = Vec::with_capacity(req.answers.len());
        let mut results = Vec::with_capacity(req.answers.len());
        let mut score = 0;
        let mut correct_count = 0;
        let mut total_time: Option<u32> = None;

        for answer in &req.answers {
            // questions deleted since the quiz started cannot be graded
            let Some(question) = questions.get(&answer.question_id) else {
                tracing::warn!(
                    quiz_id,
                    question_id = %answer.question_id,
                    "Skipping answer for missing question"
                );
                continue;
            };

            let is_correct = question.is_correct(&answer.selected_option);
            if is_correct {
                score += question.points;
                correct_count += 1;
            }
            if let Some(t) = answer.time_taken {
                total_time = Some(total_time.unwrap_or(0) + t);
            }
            ANSWERS_SUBMITTED_TOTAL
                .with_label_values(&[if is_correct { "true" } else { "false" }])
                .inc();

            let timestamp =
                now + Duration::milliseconds(records.len() as i64 * ANSWER_STAMP_STEP_MS);
            records.push(AnswerRecord {
                id: Uuid::new_v4().to_string(),
                learner_id: learner_id.to_string(),
                quiz_id: attempt.id.clone(),
                question_id: question.id.clone(),
                selected_option: answer.selected_option.clone(),
                is_correct,
                time_taken: answer.time_taken,
                timestamp,
            });
            results.push(AnswerResult {
                question_id: question.id.clone(),
                selected_option: answer.selected_option.clone(),
                correct_answer: question.correct_answer.clone(),
                is_correct,
                points: if is_correct { question.points } else { 0 },
                explanation: question.explanation.clone(),
            });
        }

        self.store.insert_answers(&records).await?;

        let ended_at = records.last().map_or(now, |r| r.timestamp);
        attempt.status = QuizStatus::Completed;
        attempt.score = score;
        attempt.correct_count = correct_count;
        attempt.ended_at = Some(ended_at);
        attempt.time_taken = total_time
            .or_else(|| u32::try_from((ended_at - attempt.started_at).num_seconds()).ok());
        self.store.update_attempt(&attempt).await?;

        let next_difficulty = self
            .adaptive()
            .next_difficulty(learner_id, &attempt.topic, attempt.difficulty)
            .await?;

        QUIZZES_TOTAL.with_label_values(&["completed"]).inc();
        tracing::info!(
            quiz_id = %attempt.id,
            learner_id,
            score,
            correct_count,
            total = attempt.total_questions,
            next_difficulty = %next_difficulty,
            "Quiz submitted"
        );

        Ok(SubmitQuizResponse {
            result: QuizResult::from(&attempt),
            answers: results,
            next_difficulty,
        })
    }

    pub async fn get(&self, learner_id: &str, quiz_id: &str) -> ServiceResult<QuizResult> {
        let attempt = self.owned_attempt(learner_id, quiz_id).await?;
        Ok(QuizResult::from(&attempt))
    }

    /// Learner's attempts, newest first
    pub async fn history(&self, learner_id: &str, limit: Option<u64>) -> ServiceResult<Vec<QuizResult>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        let attempts = self
            .store
            .list_attempts(&AttemptQuery {
                learner_id: Some(learner_id.to_string()),
                limit: Some(limit as i64),
            })
            .await?;
        Ok(attempts.iter().map(QuizResult::from).collect())
    }

    /// Another learner's attempt is reported as missing
    async fn owned_attempt(&self, learner_id: &str, quiz_id: &str) -> ServiceResult<QuizAttempt> {
        self.store
            .get_attempt(quiz_id)
            .await?
            .filter(|attempt| attempt.learner_id == learner_id)
            .ok_or_else(|| ServiceError::NotFound("Quiz not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::QuizAnswer;
    use crate::models::{Difficulty, QuestionType};
    use crate::storage::{AnswerQuery, JsonFileStore};

    fn question(id: &str, difficulty: Difficulty, points: u32) -> Question {
        Question {
            id: id.to_string(),
            title: format!("Question {id}"),
            content: format!("Content of question {id}"),
            question_type: QuestionType::ShortAnswer,
            topic: "math".to_string(),
            difficulty,
            options: None,
            correct_answer: "Four".to_string(),
            explanation: Some("2 + 2".to_string()),
            points,
            tags: vec![],
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    async fn service_with(questions: &[Question]) -> (QuizService, Arc<dyn QuizStore>) {
        let store: Arc<dyn QuizStore> = Arc::new(JsonFileStore::in_memory());
        for q in questions {
            store.insert_question(q).await.unwrap();
        }
        (QuizService::new(store.clone(), QuizSettings::default()), store)
    }

    fn start_request(difficulty: Option<Difficulty>, num: Option<u32>) -> StartQuizRequest {
        StartQuizRequest {
            topic: "math".to_string(),
            difficulty,
            num_questions: num,
        }
    }

    fn answer(question_id: &str, selected: &str) -> QuizAnswer {
        QuizAnswer {
            question_id: question_id.to_string(),
            selected_option: selected.to_string(),
            time_taken: Some(12),
        }
    }

    #[tokio::test]
    async fn adaptive_start_uses_recommended_difficulty() {
        let (service, _) = service_with(&[
            question("e1", Difficulty::Easy, 1),
            question("m1", Difficulty::Medium, 2),
        ])
        .await;

        let started = service.start("u1", start_request(None, None)).await.unwrap();
        assert!(started.adaptive);
        assert_eq!(started.difficulty, Difficulty::Medium);
        assert_eq!(started.questions.len(), 1);
        assert_eq!(started.time_limit_minutes, 30);
    }

    #[tokio::test]
    async fn start_without_questions_is_not_found() {
        let (service, _) = service_with(&[question("e1", Difficulty::Easy, 1)]).await;
        let err = service
            .start("u1", start_request(Some(Difficulty::Hard), Some(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn submit_grades_scores_and_records_answers() {
        let (service, store) = service_with(&[
            question("q1", Difficulty::Easy, 2),
            question("q2", Difficulty::Easy, 3),
            question("q3", Difficulty::Easy, 5),
        ])
        .await;
        let started = service
            .start("u1", start_request(Some(Difficulty::Easy), Some(3)))
            .await
            .unwrap();

        let submitted = service
            .submit(
                "u1",
                &started.quiz_id,
                SubmitQuizRequest {
                    answers: vec![answer("q1", " four "), answer("q2", "five")],
                },
            )
            .await
            .unwrap();

        assert_eq!(submitted.result.score, 2);
        assert_eq!(submitted.result.correct_count, 1);
        assert_eq!(submitted.result.total_questions, 3);
        assert!((submitted.result.accuracy - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(submitted.result.time_taken, Some(24));
        assert_eq!(submitted.result.status, QuizStatus::Completed);
        assert_eq!(submitted.next_difficulty, Difficulty::Easy);

        let recorded = store
            .joined_answers(&AnswerQuery::for_learner("u1"))
            .await
            .unwrap();
        assert_eq!(recorded.len(), 2);

        let again = service
            .submit(
                "u1",
                &started.quiz_id,
                SubmitQuizRequest {
                    answers: vec![answer("q3", "Four")],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(again, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn answers_of_one_submission_keep_their_order() {
        let ids = ["q1", "q2", "q3", "q4", "q5"];
        let questions: Vec<Question> = ids
            .iter()
            .map(|id| question(id, Difficulty::Medium, 1))
            .collect();
        let (service, store) = service_with(&questions).await;
        let started = service
            .start("u1", start_request(Some(Difficulty::Medium), Some(5)))
            .await
            .unwrap();

        // wrong, wrong, right, right, right
        let answers = ids
            .iter()
            .enumerate()
            .map(|(i, id)| answer(id, if i < 2 { "Five" } else { "Four" }))
            .collect();
        let submitted = service
            .submit("u1", &started.quiz_id, SubmitQuizRequest { answers })
            .await
            .unwrap();

        let recorded = store
            .joined_answers(&AnswerQuery::for_learner("u1").limit(5))
            .await
            .unwrap();
        let newest_first: Vec<&str> = recorded.iter().map(|j| j.question.id.as_str()).collect();
        assert_eq!(newest_first, vec!["q5", "q4", "q3", "q2", "q1"]);
        assert!(recorded
            .windows(2)
            .all(|w| w[0].answer.timestamp > w[1].answer.timestamp));

        // read oldest first, the window opens with two misses
        assert_eq!(submitted.next_difficulty, Difficulty::Easy);
        assert_eq!(
            submitted.result.ended_at,
            Some(recorded[0].answer.timestamp)
        );
    }

    #[tokio::test]
    async fn foreign_questions_and_foreign_quizzes_are_rejected() {
        let (service, _) = service_with(&[question("q1", Difficulty::Easy, 1)]).await;
        let started = service
            .start("u1", start_request(Some(Difficulty::Easy), None))
            .await
            .unwrap();

        let bad = service
            .submit(
                "u1",
                &started.quiz_id,
                SubmitQuizRequest {
                    answers: vec![answer("other", "x")],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(bad, ServiceError::BadRequest(_)));

        let stranger = service.get("u2", &started.quiz_id).await.unwrap_err();
        assert!(matches!(stranger, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn history_lists_newest_first() {
        let (service, _) = service_with(&[question("q1", Difficulty::Easy, 1)]).await;
        let first = service
            .start("u1", start_request(Some(Difficulty::Easy), None))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = service
            .start("u1", start_request(Some(Difficulty::Easy), None))
            .await
            .unwrap();

        let history = service.history("u1", None).await.unwrap();
        let ids: Vec<&str> = history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![second.quiz_id.as_str(), first.quiz_id.as_str()]);
        assert!(service.history("u2", None).await.unwrap().is_empty());
    }
}
