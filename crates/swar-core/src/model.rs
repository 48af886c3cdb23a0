//! Core data model types for swar.
//!
//! Questions and question banks are static content; response records are
//! produced once per submitted answer and never mutated afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{Outcome, Validation};

/// One of the two screening tracks. Histories and profiles are kept
/// separately per domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Dyslexia,
    Dyscalculia,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Dyslexia => write!(f, "dyslexia"),
            Domain::Dyscalculia => write!(f, "dyscalculia"),
        }
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dyslexia" | "reading" => Ok(Domain::Dyslexia),
            "dyscalculia" | "math" => Ok(Domain::Dyscalculia),
            other => Err(format!("unknown domain: {other}")),
        }
    }
}

/// The kind of exercise a question represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Phoneme,
    Word,
    Sentence,
    Number,
    Calculation,
}

impl QuestionKind {
    /// Numeric kinds bypass text similarity and are graded by tolerance.
    pub fn is_numeric(self) -> bool {
        matches!(self, QuestionKind::Number | QuestionKind::Calculation)
    }

    /// Numeric difficulty level used when tagging performance history.
    ///
    /// Sentences sit one level above the other kinds at every difficulty.
    pub fn difficulty_level(self, difficulty: Difficulty) -> u8 {
        let base = match difficulty {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        };
        match self {
            QuestionKind::Sentence => base + 1,
            _ => base,
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionKind::Phoneme => "phoneme",
            QuestionKind::Word => "word",
            QuestionKind::Sentence => "sentence",
            QuestionKind::Number => "number",
            QuestionKind::Calculation => "calculation",
        };
        f.write_str(s)
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "phoneme" => Ok(QuestionKind::Phoneme),
            "word" => Ok(QuestionKind::Word),
            "sentence" => Ok(QuestionKind::Sentence),
            "number" => Ok(QuestionKind::Number),
            "calculation" | "calc" => Ok(QuestionKind::Calculation),
            other => Err(format!("unknown question kind: {other}")),
        }
    }
}

/// Difficulty label exposed by the router for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// A single screening question. Authored once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier, unique within its bank.
    pub id: u32,
    /// Text shown or read to the student.
    pub prompt: String,
    /// The answer the student is expected to say.
    pub expected: String,
    /// Exercise kind; decides how the answer is graded.
    pub kind: QuestionKind,
}

/// An ordered list of questions for one (grade, domain) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    /// Unique identifier for this bank.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// School grade, 1 through 12.
    pub grade: u8,
    /// Screening track the bank belongs to.
    pub domain: Domain,
    /// Questions in presentation order.
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuestionBank {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// One submitted answer, graded. Owned by the session that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Identifier of the question answered.
    pub question_id: u32,
    /// Position of that question in the bank.
    pub question_index: usize,
    pub prompt: String,
    pub expected: String,
    pub kind: QuestionKind,
    /// Raw transcript from the speech collaborator.
    pub transcript: String,
    /// Time between presenting the question and the submission.
    pub elapsed_ms: u64,
    pub is_correct: bool,
    /// Grading confidence, 0 to 100.
    pub confidence: u8,
    /// Human-readable explanation of the verdict.
    pub reason: String,
    /// Stable category behind `reason`.
    pub outcome: Outcome,
    /// Difficulty label in force when the question was asked.
    pub difficulty: Difficulty,
    pub submitted_at: DateTime<Utc>,
}

impl ResponseRecord {
    /// Build a record from a question, the student's answer and its grading.
    pub fn new(
        question: &Question,
        question_index: usize,
        transcript: &str,
        elapsed_ms: u64,
        validation: Validation,
        difficulty: Difficulty,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            question_id: question.id,
            question_index,
            prompt: question.prompt.clone(),
            expected: question.expected.clone(),
            kind: question.kind,
            transcript: transcript.to_string(),
            elapsed_ms,
            is_correct: validation.is_correct,
            confidence: validation.confidence,
            reason: validation.reason,
            outcome: validation.outcome,
            difficulty,
            submitted_at,
        }
    }
}

/// The latest stored result of a past session, used to pick the next track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub domain: Domain,
    #[serde(default)]
    pub overall_score: Option<u8>,
    pub created_at: DateTime<Utc>,
}

/// Pick the domain to practise next.
///
/// With history in both domains the weaker one wins (ties go to dyslexia).
/// With history in one domain that domain is kept. Without history the
/// domains alternate by day of month.
pub fn choose_domain(sessions: &[SessionSummary], today: NaiveDate) -> Domain {
    let latest = |domain: Domain| {
        sessions
            .iter()
            .filter(|s| s.domain == domain)
            .max_by_key(|s| s.created_at)
    };

    match (latest(Domain::Dyslexia), latest(Domain::Dyscalculia)) {
        (Some(reading), Some(math)) => {
            if reading.overall_score.unwrap_or(0) <= math.overall_score.unwrap_or(0) {
                Domain::Dyslexia
            } else {
                Domain::Dyscalculia
            }
        }
        (Some(_), None) => Domain::Dyslexia,
        (None, Some(_)) => Domain::Dyscalculia,
        (None, None) => {
            if today.day() % 2 == 0 {
                Domain::Dyslexia
            } else {
                Domain::Dyscalculia
            }
        }
    }
}

/// Parse a free-form grade label ("Grade 4", "4th") into 1..=12.
///
/// Anything without a usable number falls back to grade 1.
pub fn parse_grade(text: &str) -> u8 {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u8>() {
        Ok(n) if (1..=12).contains(&n) => n,
        _ => 1,
    }
}
