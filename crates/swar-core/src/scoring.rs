//! Session-level scoring: overall score, referral flag and display band.
//!
//! The flag threshold gates referral; the bands only pick narrative wording.
//! They are configured independently and never derived from each other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::ResponseRecord;

/// Lower bounds of the display bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bands {
    pub excellent: u8,
    pub good: u8,
    pub moderate: u8,
}

impl Default for Bands {
    fn default() -> Self {
        Self {
            excellent: 85,
            good: 70,
            moderate: 55,
        }
    }
}

/// Scoring thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Sessions scoring strictly below this are flagged for evaluation.
    pub flag_threshold: u8,
    pub bands: Bands,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            flag_threshold: 75,
            bands: Bands::default(),
        }
    }
}

/// Interpretation band shown next to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Excellent,
    Good,
    Moderate,
    FlaggedConcern,
}

impl Band {
    pub fn for_score(score: u8, bands: &Bands) -> Self {
        if score >= bands.excellent {
            Band::Excellent
        } else if score >= bands.good {
            Band::Good
        } else if score >= bands.moderate {
            Band::Moderate
        } else {
            Band::FlaggedConcern
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Excellent => write!(f, "excellent"),
            Band::Good => write!(f, "good"),
            Band::Moderate => write!(f, "moderate"),
            Band::FlaggedConcern => write!(f, "flagged concern"),
        }
    }
}

/// Result of scoring a frozen list of responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionScore {
    pub total_questions: usize,
    pub answered: usize,
    pub correct: usize,
    /// 0 to 100.
    pub score: u8,
    pub flagged: bool,
    pub band: Band,
}

/// Score a session.
///
/// `score = round(100 * correct / total)`, capped at 100 since regression
/// can re-ask a question. An empty bank scores 0.
pub fn finalize(
    responses: &[ResponseRecord],
    total_questions: usize,
    config: &ScoringConfig,
) -> SessionScore {
    let correct = responses.iter().filter(|r| r.is_correct).count();
    let score = if total_questions == 0 {
        0
    } else {
        (100.0 * correct as f64 / total_questions as f64)
            .round()
            .min(100.0) as u8
    };

    SessionScore {
        total_questions,
        answered: responses.len(),
        correct,
        score,
        flagged: score < config.flag_threshold,
        band: Band::for_score(score, &config.bands),
    }
}
