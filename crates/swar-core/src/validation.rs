//! Answer validation.
//!
//! Text answers are graded by a blend of whole-string similarity and
//! key-word coverage; numeric answers by exact value or a 5% tolerance.
//! Validation never fails: malformed input yields an incorrect result with
//! a descriptive reason.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::QuestionKind;
use crate::similarity::{normalize, similarity_normalized};

/// Weight of whole-string similarity in the combined text score.
const SIMILARITY_WEIGHT: f64 = 0.6;
/// Weight of key-word coverage in the combined text score.
const KEY_WORD_WEIGHT: f64 = 0.4;
/// Minimum token similarity for a key word to count as present.
const KEY_WORD_MATCH: f64 = 70.0;
/// Key words are expected-answer tokens longer than this many characters.
const KEY_WORD_MIN_LEN: usize = 2;
/// Threshold for single words and answers of at most two tokens.
const STRICT_THRESHOLD: f64 = 80.0;
const DEFAULT_THRESHOLD: f64 = 70.0;
/// Lower bound of the "close but incorrect" band.
const CLOSE_THRESHOLD: f64 = 50.0;
/// Relative numeric error accepted as correct, in percent.
const NUMERIC_TOLERANCE_PCT: f64 = 5.0;
const TOLERANCE_CONFIDENCE: u8 = 95;

/// Stable category behind a validation reason.
///
/// Reporting collaborators key off these rather than the reason text,
/// which may be reworded or localized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Empty,
    ExactMatch,
    Match,
    CloseButIncorrect,
    Incorrect,
    NumericExact,
    WithinTolerance,
    NumericMismatch,
    MissingNumber,
    InvalidExpected,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Empty => "empty",
            Outcome::ExactMatch => "exact match",
            Outcome::Match => "match",
            Outcome::CloseButIncorrect => "close but incorrect",
            Outcome::Incorrect => "incorrect",
            Outcome::NumericExact => "exact number",
            Outcome::WithinTolerance => "within tolerance",
            Outcome::NumericMismatch => "wrong number",
            Outcome::MissingNumber => "missing number",
            Outcome::InvalidExpected => "invalid expected answer",
        };
        f.write_str(s)
    }
}

/// Display-only mastery label derived from grading confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mastery {
    Mastered,
    Developing,
    Emerging,
    NeedsHelp,
}

/// The verdict for one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub is_correct: bool,
    /// 0 to 100.
    pub confidence: u8,
    pub reason: String,
    pub outcome: Outcome,
}

impl Validation {
    fn new(is_correct: bool, confidence: u8, reason: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            is_correct,
            confidence,
            reason: reason.into(),
            outcome,
        }
    }

    pub fn mastery(&self) -> Mastery {
        match self.confidence {
            c if c >= 80 => Mastery::Mastered,
            c if c >= 60 => Mastery::Developing,
            _ => Mastery::Emerging,
        }
    }
}

/// Grade one response against the expected answer.
pub fn validate(response: &str, expected: &str, kind: QuestionKind) -> Validation {
    let response_norm = normalize(response);
    if response_norm.is_empty() {
        return Validation::new(false, 0, "No response provided", Outcome::Empty);
    }

    if kind.is_numeric() {
        return validate_numeric(response, expected);
    }

    let expected_norm = normalize(expected);
    if response_norm == expected_norm {
        return Validation::new(true, 100, "Exact match", Outcome::ExactMatch);
    }

    let similarity = similarity_normalized(&response_norm, &expected_norm);

    let expected_tokens: Vec<&str> = expected_norm.split_whitespace().collect();
    let response_tokens: Vec<&str> = response_norm.split_whitespace().collect();
    let key_words: Vec<&str> = expected_tokens
        .iter()
        .copied()
        .filter(|w| w.chars().count() > KEY_WORD_MIN_LEN)
        .collect();
    let matched = key_words
        .iter()
        .filter(|word| {
            response_tokens
                .iter()
                .any(|token| similarity_normalized(word, token) >= KEY_WORD_MATCH)
        })
        .count();
    let key_word_pct = if key_words.is_empty() {
        0.0
    } else {
        matched as f64 / key_words.len() as f64 * 100.0
    };

    let final_score = SIMILARITY_WEIGHT * similarity + KEY_WORD_WEIGHT * key_word_pct;
    let confidence = final_score.round().clamp(0.0, 100.0) as u8;

    let threshold = if kind == QuestionKind::Word || expected_tokens.len() <= 2 {
        STRICT_THRESHOLD
    } else {
        DEFAULT_THRESHOLD
    };

    if final_score >= threshold {
        Validation::new(
            true,
            confidence,
            format!(
                "{}% similar, {}/{} key words matched",
                similarity.round(),
                matched,
                key_words.len()
            ),
            Outcome::Match,
        )
    } else if final_score >= CLOSE_THRESHOLD {
        Validation::new(
            false,
            confidence,
            format!("Close but not quite - {}% similar", similarity.round()),
            Outcome::CloseButIncorrect,
        )
    } else {
        Validation::new(
            false,
            confidence,
            "Response does not match expected answer",
            Outcome::Incorrect,
        )
    }
}

/// Grade a numeric response by value.
pub fn validate_numeric(response: &str, expected: &str) -> Validation {
    let Some(got) = extract_number(response) else {
        return Validation::new(false, 0, "No number found in response", Outcome::MissingNumber);
    };
    let Some(want) = extract_number(expected) else {
        return Validation::new(false, 0, "Invalid expected answer", Outcome::InvalidExpected);
    };

    if got == want {
        return Validation::new(true, 100, "Correct numeric answer", Outcome::NumericExact);
    }

    // A zero expected value has no relative tolerance.
    if want != 0.0 {
        let percent_diff = (got - want).abs() / want.abs() * 100.0;
        if percent_diff < NUMERIC_TOLERANCE_PCT {
            return Validation::new(
                true,
                TOLERANCE_CONFIDENCE,
                "Answer within acceptable range",
                Outcome::WithinTolerance,
            );
        }
    }

    Validation::new(
        false,
        0,
        format!("Incorrect - expected {want}, got {got}"),
        Outcome::NumericMismatch,
    )
}

/// Extract the first signed decimal number from free text.
///
/// Matches an optional minus sign, one or more ASCII digits, an optional
/// decimal point and any further digits.
pub fn extract_number(text: &str) -> Option<f64> {
    let chars: Vec<char> = text.chars().collect();
    let start = (0..chars.len()).find(|&i| {
        chars[i].is_ascii_digit()
            || (chars[i] == '-' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()))
    })?;

    let mut end = start;
    if chars[end] == '-' {
        end += 1;
    }
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    if end < chars.len() && chars[end] == '.' {
        end += 1;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
    }

    let literal: String = chars[start..end].iter().collect();
    literal.trim_end_matches('.').parse::<f64>().ok()
}
