use super::question::Difficulty;
use serde::{Deserialize, Serialize};

/// Summary of a learner's recent answers on one topic. Derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceSnapshot {
    pub accuracy: f64,
    pub recent_difficulty: Difficulty,
    pub total_answered: u32,
    pub correct_count: u32,
}

/// Either a snapshot or the neutral default used when the learner has no
/// answers on the topic yet. The default serializes as
/// `{"difficulty":"medium","confidence":0.5}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PerformanceHistory {
    Recent(PerformanceSnapshot),
    NoHistory {
        difficulty: Difficulty,
        confidence: f64,
    },
}

impl PerformanceHistory {
    /// Difficulty the recommender starts from: the snapshot's average band,
    /// or the neutral default's difficulty.
    pub fn recent_difficulty(&self) -> Difficulty {
        match self {
            PerformanceHistory::Recent(snapshot) => snapshot.recent_difficulty,
            PerformanceHistory::NoHistory { difficulty, .. } => *difficulty,
        }
    }
}

/// Outcome of the streak check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Escalate,
    DeEscalate,
    Hold,
    InsufficientEvidence,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Escalate => "escalate",
            Transition::DeEscalate => "de_escalate",
            Transition::Hold => "hold",
            Transition::InsufficientEvidence => "insufficient_evidence",
        }
    }

    pub fn apply(self, current: Difficulty) -> Difficulty {
        match self {
            Transition::Escalate => current.harder(),
            Transition::DeEscalate => current.easier(),
            Transition::Hold | Transition::InsufficientEvidence => current,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub topic: String,
    pub count: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct NextDifficultyQuery {
    pub topic: String,
    pub current: Option<Difficulty>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextDifficultyResponse {
    pub topic: String,
    pub current: Difficulty,
    pub next: Difficulty,
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    pub topic: String,
}
