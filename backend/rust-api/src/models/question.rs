use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Ordered difficulty band of a question.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Numeric weight used when averaging recent difficulty (easy=1, medium=2, hard=3)
    pub fn score(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }

    /// One band up, saturating at hard
    pub fn harder(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium | Difficulty::Hard => Difficulty::Hard,
        }
    }

    /// One band down, saturating at easy
    pub fn easier(self) -> Self {
        match self {
            Difficulty::Hard => Difficulty::Medium,
            Difficulty::Medium | Difficulty::Easy => Difficulty::Easy,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

/// Question stored in the "questions" collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    pub title: String,
    pub content: String,
    pub question_type: QuestionType,
    pub topic: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    pub points: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Question {
    /// Answers are compared trimmed and case-insensitively ("Paris" == " paris").
    pub fn is_correct(&self, selected_option: &str) -> bool {
        self.correct_answer
            .trim()
            .eq_ignore_ascii_case(selected_option.trim())
    }
}

/// Question as served to learners: no correct answer, no explanation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentQuestion {
    pub id: String,
    pub title: String,
    pub content: String,
    pub question_type: QuestionType,
    pub topic: String,
    pub difficulty: Difficulty,
    pub options: Option<Vec<String>>,
    pub points: u32,
    pub tags: Vec<String>,
}

impl From<&Question> for StudentQuestion {
    fn from(question: &Question) -> Self {
        StudentQuestion {
            id: question.id.clone(),
            title: question.title.clone(),
            content: question.content.clone(),
            question_type: question.question_type,
            topic: question.topic.clone(),
            difficulty: question.difficulty,
            options: question.options.clone(),
            points: question.points,
            tags: question.tags.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 5, max = 500, message = "Title must be 5-500 characters"))]
    pub title: String,

    #[validate(length(min = 10, max = 2000, message = "Content must be 10-2000 characters"))]
    pub content: String,

    #[serde(default)]
    pub question_type: QuestionType,

    #[validate(length(min = 1, max = 100, message = "Topic must be 1-100 characters"))]
    pub topic: String,

    pub difficulty: Difficulty,

    pub options: Option<Vec<String>>,

    #[validate(length(min = 1, message = "Correct answer must not be empty"))]
    pub correct_answer: String,

    #[validate(length(max = 1000, message = "Explanation must be at most 1000 characters"))]
    pub explanation: Option<String>,

    #[validate(range(min = 1, max = 10, message = "Points must be between 1 and 10"))]
    pub points: Option<u32>,

    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 5, max = 500, message = "Title must be 5-500 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 10, max = 2000, message = "Content must be 10-2000 characters"))]
    pub content: Option<String>,

    pub question_type: Option<QuestionType>,

    #[validate(length(min = 1, max = 100, message = "Topic must be 1-100 characters"))]
    pub topic: Option<String>,

    pub difficulty: Option<Difficulty>,

    pub options: Option<Vec<String>>,

    #[validate(length(min = 1, message = "Correct answer must not be empty"))]
    pub correct_answer: Option<String>,

    #[validate(length(max = 1000, message = "Explanation must be at most 1000 characters"))]
    pub explanation: Option<String>,

    #[validate(range(min = 1, max = 10, message = "Points must be between 1 and 10"))]
    pub points: Option<u32>,

    pub tags: Option<Vec<String>>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.question_type.is_none()
            && self.topic.is_none()
            && self.difficulty.is_none()
            && self.options.is_none()
            && self.correct_answer.is_none()
            && self.explanation.is_none()
            && self.points.is_none()
            && self.tags.is_none()
    }

    /// Applies the present fields to `question`. Returns false when nothing was set.
    pub fn apply_to(self, question: &mut Question) -> bool {
        if self.is_empty() {
            return false;
        }
        if let Some(title) = self.title {
            question.title = title;
        }
        if let Some(content) = self.content {
            question.content = content;
        }
        if let Some(question_type) = self.question_type {
            question.question_type = question_type;
        }
        if let Some(topic) = self.topic {
            question.topic = topic;
        }
        if let Some(difficulty) = self.difficulty {
            question.difficulty = difficulty;
        }
        if let Some(options) = self.options {
            question.options = Some(options);
        }
        if let Some(correct_answer) = self.correct_answer {
            question.correct_answer = correct_answer;
        }
        if let Some(explanation) = self.explanation {
            question.explanation = Some(explanation);
        }
        if let Some(points) = self.points {
            question.points = points;
        }
        if let Some(tags) = self.tags {
            question.tags = tags;
        }
        question.updated_at = Some(Utc::now());
        true
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateQuestionResponse {
    pub message: String,
    pub question_id: String,
    pub title: String,
}

/// Query params for listing questions
#[derive(Debug, Default, Deserialize)]
pub struct ListQuestionsQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
}

/// `?tags=geography,europe`
#[derive(Debug, Deserialize)]
pub struct TagsQuery {
    pub tags: String,
}

impl TagsQuery {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionCountResponse {
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question() -> Question {
        Question {
            id: "q1".to_string(),
            title: "Capital of France".to_string(),
            content: "Which city is the capital of France?".to_string(),
            question_type: QuestionType::MultipleChoice,
            topic: "geography".to_string(),
            difficulty: Difficulty::Easy,
            options: Some(vec!["Paris".to_string(), "Berlin".to_string()]),
            correct_answer: "Paris".to_string(),
            explanation: None,
            points: 1,
            tags: vec![],
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn difficulty_steps_saturate_at_the_edges() {
        assert_eq!(Difficulty::Easy.harder(), Difficulty::Medium);
        assert_eq!(Difficulty::Medium.harder(), Difficulty::Hard);
        assert_eq!(Difficulty::Hard.harder(), Difficulty::Hard);
        assert_eq!(Difficulty::Hard.easier(), Difficulty::Medium);
        assert_eq!(Difficulty::Medium.easier(), Difficulty::Easy);
        assert_eq!(Difficulty::Easy.easier(), Difficulty::Easy);
    }

    #[test]
    fn difficulty_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Difficulty::Hard).unwrap(), "\"hard\"");
        let parsed: Difficulty = serde_json::from_str("\"easy\"").unwrap();
        assert_eq!(parsed, Difficulty::Easy);
        assert!(serde_json::from_str::<Difficulty>("\"extreme\"").is_err());
    }

    #[test]
    fn answer_check_ignores_case_and_whitespace() {
        let question = sample_question();
        assert!(question.is_correct("  paris "));
        assert!(!question.is_correct("Berlin"));
    }

    #[test]
    fn student_view_has_no_answer() {
        let view = StudentQuestion::from(&sample_question());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("correct_answer").is_none());
        assert!(json.get("explanation").is_none());
        assert_eq!(json["topic"], "geography");
    }

    #[test]
    fn empty_update_is_rejected() {
        let mut question = sample_question();
        assert!(!UpdateQuestionRequest::default().apply_to(&mut question));
        assert!(question.updated_at.is_none());

        let update = UpdateQuestionRequest {
            difficulty: Some(Difficulty::Hard),
            ..Default::default()
        };
        assert!(update.apply_to(&mut question));
        assert_eq!(question.difficulty, Difficulty::Hard);
        assert!(question.updated_at.is_some());
    }

    #[test]
    fn tags_query_splits_and_trims() {
        let query = TagsQuery {
            tags: "math, basic,,".to_string(),
        };
        assert_eq!(query.tag_list(), vec!["math", "basic"]);
    }
}
