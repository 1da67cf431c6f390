//! Adaptive difficulty: performance snapshots, streak-driven difficulty
//! transitions, and question recommendation built on both.

use crate::metrics::{DIFFICULTY_TRANSITIONS_TOTAL, RECOMMENDATIONS_TOTAL};
use crate::models::{
    Difficulty, PerformanceHistory, PerformanceSnapshot, Question, Recommendation, Transition,
};
use crate::services::ServiceResult;
use crate::storage::{AnswerQuery, QuestionFilter, QuizStore};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Answers considered for a performance snapshot
pub const HISTORY_WINDOW: i64 = 10;
/// Answers considered for streak detection
pub const STREAK_WINDOW: i64 = 5;
/// Below this many same-difficulty answers the difficulty is held
pub const MIN_STREAK_EVIDENCE: usize = 3;
pub const CORRECT_STREAK_TO_ESCALATE: usize = 3;
pub const INCORRECT_STREAK_TO_DEESCALATE: usize = 2;
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Buckets the mean difficulty score: < 1.5 easy, < 2.5 medium, else hard.
/// Empty input averages to medium.
pub fn average_difficulty(difficulties: impl IntoIterator<Item = Difficulty>) -> Difficulty {
    let (sum, n) = difficulties
        .into_iter()
        .fold((0u32, 0u32), |(sum, n), d| (sum + d.score() as u32, n + 1));
    if n == 0 {
        return Difficulty::Medium;
    }
    let avg = sum as f64 / n as f64;
    if avg < 1.5 {
        Difficulty::Easy
    } else if avg < 2.5 {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}

/// Decides the streak outcome for a window of answer outcomes given newest first.
///
/// Streaks are counted over the window in chronological order, oldest answer
/// first, and stop at the first break. A correct streak wins over an
/// incorrect one.
pub fn transition(outcomes_newest_first: &[bool]) -> Transition {
    if outcomes_newest_first.len() < MIN_STREAK_EVIDENCE {
        return Transition::InsufficientEvidence;
    }

    let run_of = |wanted: bool| {
        outcomes_newest_first
            .iter()
            .rev()
            .take_while(|&&correct| correct == wanted)
            .count()
    };

    if run_of(true) >= CORRECT_STREAK_TO_ESCALATE {
        Transition::Escalate
    } else if run_of(false) >= INCORRECT_STREAK_TO_DEESCALATE {
        Transition::DeEscalate
    } else {
        Transition::Hold
    }
}

pub struct AdaptiveService {
    store: Arc<dyn QuizStore>,
}

impl AdaptiveService {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    /// Snapshot of the learner's last answers on `topic`, or the neutral
    /// default when there are none.
    pub async fn performance_history(
        &self,
        learner_id: &str,
        topic: &str,
    ) -> ServiceResult<PerformanceHistory> {
        let recent = self
            .store
            .joined_answers(
                &AnswerQuery::for_learner(learner_id)
                    .topic(topic)
                    .limit(HISTORY_WINDOW),
            )
            .await?;

        if recent.is_empty() {
            return Ok(PerformanceHistory::NoHistory {
                difficulty: Difficulty::Medium,
                confidence: NEUTRAL_CONFIDENCE,
            });
        }

        let total_answered = recent.len() as u32;
        let correct_count = recent.iter().filter(|j| j.answer.is_correct).count() as u32;

        Ok(PerformanceHistory::Recent(PerformanceSnapshot {
            accuracy: correct_count as f64 / total_answered as f64,
            recent_difficulty: average_difficulty(recent.iter().map(|j| j.question.difficulty)),
            total_answered,
            correct_count,
        }))
    }

    /// Difficulty to serve next, given the learner's recent answers at `current`
    pub async fn next_difficulty(
        &self,
        learner_id: &str,
        topic: &str,
        current: Difficulty,
    ) -> ServiceResult<Difficulty> {
        let window = self
            .store
            .joined_answers(
                &AnswerQuery::for_learner(learner_id)
                    .topic(topic)
                    .difficulty(current)
                    .limit(STREAK_WINDOW),
            )
            .await?;

        let outcomes: Vec<bool> = window.iter().map(|j| j.answer.is_correct).collect();
        let decision = transition(&outcomes);
        let next = decision.apply(current);

        DIFFICULTY_TRANSITIONS_TOTAL
            .with_label_values(&[decision.as_str()])
            .inc();
        tracing::debug!(
            learner_id,
            topic,
            current = %current,
            next = %next,
            evidence = outcomes.len(),
            transition = decision.as_str(),
            "Difficulty decision"
        );

        Ok(next)
    }

    /// Recommended difficulty and up to `count` questions of that difficulty
    /// on `topic`, in store order. Never falls back to another difficulty.
    ///
    /// The snapshot's average difficulty (not the learner's last served
    /// difficulty) is what feeds the streak check. A zero count is only
    /// accepted by [`Self::recommend_questions`].
    pub async fn recommended_batch(
        &self,
        learner_id: &str,
        topic: &str,
        count: NonZeroU32,
    ) -> ServiceResult<(Difficulty, Vec<Question>)> {
        let history = self.performance_history(learner_id, topic).await?;
        let difficulty = self
            .next_difficulty(learner_id, topic, history.recent_difficulty())
            .await?;

        let questions = self
            .store
            .list_questions(
                &QuestionFilter {
                    topic: Some(topic.to_string()),
                    difficulty: Some(difficulty),
                    any_tags: None,
                },
                0,
                i64::from(count.get()),
            )
            .await?;

        RECOMMENDATIONS_TOTAL
            .with_label_values(&[difficulty.as_str()])
            .inc();
        tracing::info!(
            learner_id,
            topic,
            difficulty = %difficulty,
            requested = count.get(),
            returned = questions.len(),
            "Questions recommended"
        );

        Ok((difficulty, questions))
    }

    pub async fn recommend(
        &self,
        learner_id: &str,
        topic: &str,
        count: NonZeroU32,
    ) -> ServiceResult<Recommendation> {
        let (difficulty, questions) = self.recommended_batch(learner_id, topic, count).await?;
        Ok(Recommendation {
            topic: topic.to_string(),
            difficulty,
            question_ids: questions.into_iter().map(|q| q.id).collect(),
        })
    }

    /// Ids of recommended questions; empty without touching storage when `count` is 0
    pub async fn recommend_questions(
        &self,
        learner_id: &str,
        topic: &str,
        count: u32,
    ) -> ServiceResult<Vec<String>> {
        let Some(count) = NonZeroU32::new(count) else {
            return Ok(Vec::new());
        };
        Ok(self.recommend(learner_id, topic, count).await?.question_ids)
    }
}
