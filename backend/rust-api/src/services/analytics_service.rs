use crate::models::analytics::{
    AdminAnalytics, DailyPerformance, DifficultyPerformance, ImprovementTrends, LearnerAnalytics,
    PopularTopic, RecentActivity, TopicPerformance, Trend,
};
use crate::models::quiz::QuizResult;
use crate::services::ServiceResult;
use crate::storage::{
    AnswerGroup, AnswerGrouping, AnswerQuery, AttemptQuery, GroupKey, QuizStore,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

pub const RECENT_ACTIVITY_DAYS: i64 = 7;
pub const RECENT_ACTIVITY_LIMIT: i64 = 20;
pub const TREND_DAYS: i64 = 30;
/// Groups compared at each end of the trend window
pub const TREND_SAMPLE: usize = 7;
pub const TREND_THRESHOLD: f64 = 0.1;
pub const POPULAR_TOPICS_LIMIT: usize = 10;
pub const RECENT_QUIZZES_LIMIT: i64 = 10;
pub const ACTIVE_USER_DAYS: i64 = 7;

pub fn topic_performance(groups: Vec<AnswerGroup>) -> Vec<TopicPerformance> {
    groups
        .into_iter()
        .filter_map(|g| {
            let accuracy = g.accuracy();
            match g.key {
                GroupKey::Topic(topic) => Some(TopicPerformance {
                    topic,
                    total_questions: g.total,
                    correct_answers: g.correct,
                    accuracy,
                    avg_time: g.avg_time,
                }),
                _ => None,
            }
        })
        .collect()
}

pub fn difficulty_performance(groups: Vec<AnswerGroup>) -> Vec<DifficultyPerformance> {
    groups
        .into_iter()
        .filter_map(|g| match g.key {
            GroupKey::Difficulty(difficulty) => Some(DifficultyPerformance {
                difficulty,
                total_questions: g.total,
                correct_answers: g.correct,
                accuracy: g.accuracy(),
                avg_time: g.avg_time,
            }),
            _ => None,
        })
        .collect()
}

/// (date, topic) groups, kept in the ascending order the store returns
pub fn daily_performance(groups: Vec<AnswerGroup>) -> Vec<DailyPerformance> {
    groups
        .into_iter()
        .filter_map(|g| {
            let accuracy = g.accuracy();
            match g.key {
                GroupKey::DayAndTopic(date, topic) => Some(DailyPerformance {
                    date,
                    topic,
                    total_questions: g.total,
                    correct_answers: g.correct,
                    accuracy,
                    avg_time: g.avg_time,
                }),
                _ => None,
            }
        })
        .collect()
}

/// Mean accuracy of the last [`TREND_SAMPLE`] groups against the first ones
pub fn calculate_trend(daily: &[DailyPerformance]) -> Trend {
    if daily.len() < 2 {
        return Trend::InsufficientData;
    }
    let mean = |groups: &[DailyPerformance]| {
        groups.iter().map(|d| d.accuracy).sum::<f64>() / groups.len() as f64
    };
    let sample = TREND_SAMPLE.min(daily.len());
    let earliest = mean(&daily[..sample]);
    let latest = mean(&daily[daily.len() - sample..]);

    if latest > earliest + TREND_THRESHOLD {
        Trend::Improving
    } else if latest < earliest - TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Topic groups ranked by answer count
pub fn popular_topics(groups: Vec<AnswerGroup>) -> Vec<PopularTopic> {
    let mut topics: Vec<PopularTopic> = groups
        .into_iter()
        .filter_map(|g| {
            let avg_accuracy = g.accuracy();
            match g.key {
                GroupKey::Topic(topic) => Some(PopularTopic {
                    topic,
                    total_attempts: g.total,
                    avg_accuracy,
                }),
                _ => None,
            }
        })
        .collect();
    // stable sort keeps ties alphabetical
    topics.sort_by(|a, b| b.total_attempts.cmp(&a.total_attempts));
    topics.truncate(POPULAR_TOPICS_LIMIT);
    topics
}

pub struct AnalyticsService {
    store: Arc<dyn QuizStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    pub async fn learner_analytics(&self, learner_id: &str) -> ServiceResult<LearnerAnalytics> {
        let now = Utc::now();
        let total_quizzes = self.store.count_attempts(Some(learner_id)).await?;
        let average_score = self.store.average_score(Some(learner_id)).await?;
        let tally = self.store.answer_tally(Some(learner_id)).await?;

        let learner = AnswerQuery::for_learner(learner_id);
        let by_topic = self
            .store
            .answer_groups(&learner, AnswerGrouping::Topic)
            .await?;
        let by_difficulty = self
            .store
            .answer_groups(&learner, AnswerGrouping::Difficulty)
            .await?;

        let recent_activity = self
            .store
            .joined_answers(
                &AnswerQuery::for_learner(learner_id)
                    .since(now - Duration::days(RECENT_ACTIVITY_DAYS))
                    .limit(RECENT_ACTIVITY_LIMIT),
            )
            .await?
            .into_iter()
            .map(|j| RecentActivity {
                question_id: j.question.id,
                question_content: j.question.content,
                topic: j.question.topic,
                difficulty: j.question.difficulty,
                is_correct: j.answer.is_correct,
                time_taken: j.answer.time_taken,
                timestamp: j.answer.timestamp,
            })
            .collect();

        let daily = daily_performance(
            self.store
                .answer_groups(
                    &learner.since(now - Duration::days(TREND_DAYS)),
                    AnswerGrouping::DayAndTopic,
                )
                .await?,
        );
        let overall_trend = calculate_trend(&daily);

        tracing::debug!(
            learner_id,
            answers = tally.total,
            trend = ?overall_trend,
            "Learner analytics computed"
        );

        Ok(LearnerAnalytics {
            learner_id: learner_id.to_string(),
            total_quizzes,
            total_questions_answered: tally.total,
            average_score,
            accuracy_rate: tally.accuracy(),
            topic_performance: topic_performance(by_topic),
            difficulty_performance: difficulty_performance(by_difficulty),
            recent_activity,
            improvement_trends: ImprovementTrends {
                daily_performance: daily,
                overall_trend,
            },
        })
    }

    pub async fn admin_analytics(&self) -> ServiceResult<AdminAnalytics> {
        let total_users = self.store.count_users().await?;
        let total_questions = self
            .store
            .count_questions(&Default::default())
            .await?;
        let total_quiz_attempts = self.store.count_attempts(None).await?;
        let average_platform_score = self.store.average_score(None).await?;

        let topics = self
            .store
            .answer_groups(&AnswerQuery::all_learners(), AnswerGrouping::Topic)
            .await?;

        let recent_quizzes = self
            .store
            .list_attempts(&AttemptQuery {
                learner_id: None,
                limit: Some(RECENT_QUIZZES_LIMIT),
            })
            .await?
            .iter()
            .map(QuizResult::from)
            .collect();

        let active_users = self
            .store
            .active_learners_since(Utc::now() - Duration::days(ACTIVE_USER_DAYS))
            .await?;

        Ok(AdminAnalytics {
            total_users,
            total_questions,
            total_quiz_attempts,
            average_platform_score,
            popular_topics: popular_topics(topics),
            recent_quizzes,
            active_users,
        })
    }
}
