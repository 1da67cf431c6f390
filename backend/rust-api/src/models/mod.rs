pub mod adaptive;
pub mod analytics;
pub mod question;
pub mod quiz;
pub mod user;

pub use adaptive::{PerformanceHistory, PerformanceSnapshot, Recommendation, Transition};
pub use question::{Difficulty, Question, QuestionType, StudentQuestion};
pub use quiz::{AnswerRecord, QuizAttempt, QuizStatus};
pub use user::{User, UserOut, UserRole};
