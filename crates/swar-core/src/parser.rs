//! TOML question bank parser.
//!
//! Loads question banks and scripted answer files, and validates banks.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::engine::ScriptedAnswer;
use crate::model::{Domain, Question, QuestionBank, QuestionKind};
use crate::validation::extract_number;

/// Intermediate TOML structure for question bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    grade: u8,
    domain: String,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: u32,
    prompt: String,
    expected: String,
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TomlAnswerFile {
    #[serde(default)]
    answers: Vec<TomlAnswer>,
}

#[derive(Debug, Deserialize)]
struct TomlAnswer {
    question: u32,
    #[serde(default)]
    transcript: String,
    #[serde(default = "default_elapsed")]
    elapsed_ms: u64,
}

fn default_elapsed() -> u64 {
    5000
}

/// Parse a single TOML file into a `QuestionBank`.
pub fn parse_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank file: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank` (useful for testing).
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let domain: Domain = parsed
        .bank
        .domain
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}", e))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let kind: QuestionKind = q
                .kind
                .parse()
                .map_err(|e: String| anyhow::anyhow!("question {}: {}", q.id, e))?;
            Ok(Question {
                id: q.id,
                prompt: q.prompt,
                expected: q.expected,
                kind,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionBank {
        id: parsed.bank.id,
        name: parsed.bank.name,
        grade: parsed.bank.grade,
        domain,
        questions,
    })
}

/// Recursively load all `.toml` question bank files from a directory.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// Parse a scripted answers file into a map of question id to answer.
///
/// ```toml
/// [[answers]]
/// question = 1
/// transcript = "cat"
/// elapsed_ms = 2400
/// ```
pub fn parse_answers(path: &Path) -> Result<HashMap<u32, ScriptedAnswer>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers file: {}", path.display()))?;
    parse_answers_str(&content, path)
}

pub fn parse_answers_str(content: &str, source_path: &Path) -> Result<HashMap<u32, ScriptedAnswer>> {
    let parsed: TomlAnswerFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let mut answers = HashMap::new();
    for a in parsed.answers {
        let previous = answers.insert(
            a.question,
            ScriptedAnswer {
                transcript: a.transcript,
                elapsed_ms: a.elapsed_ms,
            },
        );
        if previous.is_some() {
            tracing::warn!("{}: question {} answered twice, keeping the last answer", source_path.display(), a.question);
        }
    }
    Ok(answers)
}

/// A warning from question bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<u32>,
    /// Warning message.
    pub message: String,
}

/// Validate a question bank for common issues.
pub fn validate_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if bank.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "question bank has no questions".into(),
        });
    }

    if !(1..=12).contains(&bank.grade) {
        warnings.push(ValidationWarning {
            question_id: None,
            message: format!("grade {} is outside 1..=12", bank.grade),
        });
    }

    // Check for duplicate question IDs
    let mut seen_ids = std::collections::HashSet::new();
    for q in &bank.questions {
        if !seen_ids.insert(q.id) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: format!("duplicate question ID: {}", q.id),
            });
        }
    }

    for q in &bank.questions {
        if q.expected.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: "expected answer is empty".into(),
            });
        } else if q.kind.is_numeric() && extract_number(&q.expected).is_none() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: format!("{} question has no number in its expected answer", q.kind),
            });
        }
    }

    warnings
}
