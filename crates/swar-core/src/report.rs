//! Session reports with JSON persistence.
//!
//! A report is a pure function of the frozen response list, so building it
//! twice yields the same value, identifier included. Callers can retry a
//! failed save without re-grading anything.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::Refinement;
use crate::model::{Domain, QuestionKind, ResponseRecord};
use crate::performance::{analyze, PerformanceMetric};
use crate::scoring::{finalize, Band, ScoringConfig, SessionScore};
use crate::validation::Outcome;

const RUSHED_BELOW_MS: u64 = 3_000;
const OVERTHINKING_ABOVE_MS: u64 = 30_000;
/// Per-kind accuracy below this marks a weak area.
const WEAK_BELOW: f64 = 60.0;
/// Per-kind accuracy at or above this marks a strong area.
const STRONG_FROM: f64 = 80.0;

/// Timing view of one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAnalysis {
    pub response_time_ms: u64,
    pub rushed: bool,
    pub overthinking: bool,
}

impl TimeAnalysis {
    pub fn new(response_time_ms: u64) -> Self {
        Self {
            response_time_ms,
            rushed: response_time_ms < RUSHED_BELOW_MS,
            overthinking: response_time_ms > OVERTHINKING_ABOVE_MS,
        }
    }
}

/// The outcome of one completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Derived from the student, domain and responses.
    pub id: Uuid,
    pub student_id: String,
    pub domain: Domain,
    pub grade: u8,
    /// Submission time of the last response.
    pub created_at: DateTime<Utc>,
    pub total_questions: usize,
    pub answered: usize,
    pub correct: usize,
    /// 0 to 100.
    pub score: u8,
    /// Whether the session suggests referral for professional evaluation.
    pub flagged: bool,
    pub band: Band,
    /// Every response, in submission order.
    pub breakdown: Vec<ResponseRecord>,
    pub time_analysis: Vec<TimeAnalysis>,
    pub narrative: String,
    pub diagnostic: DiagnosticSummary,
    /// Advisory external grading, if any was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement: Option<Refinement>,
}

/// Deterministic report identifier.
fn report_id(student_id: &str, domain: Domain, grade: u8, total: usize, breakdown: &[ResponseRecord]) -> Uuid {
    let mut name = format!("{student_id}\u{1f}{domain}\u{1f}{grade}\u{1f}{total}");
    for r in breakdown {
        name.push_str(&format!(
            "\u{1e}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
            r.question_id,
            r.question_index,
            r.transcript,
            r.elapsed_ms,
            r.is_correct,
            r.submitted_at.to_rfc3339()
        ));
    }
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

fn kind_accuracy(breakdown: &[ResponseRecord]) -> BTreeMap<QuestionKind, f64> {
    let mut counts: BTreeMap<QuestionKind, (usize, usize)> = BTreeMap::new();
    for r in breakdown {
        let entry = counts.entry(r.kind).or_default();
        entry.1 += 1;
        if r.is_correct {
            entry.0 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(kind, (correct, total))| (kind, correct as f64 / total as f64 * 100.0))
        .collect()
}

/// A warning sign in a session's responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskIndicator {
    BelowReferralThreshold,
    /// Most of the last quarter of responses were wrong.
    Fatigue,
    /// More than half of the responses came in under 3 seconds.
    RushedAnswers,
    /// More than half of the responses took over 30 seconds.
    SlowAnswers,
    /// No responses, or at least a quarter of them empty.
    MissingResponses,
}

impl fmt::Display for RiskIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskIndicator::BelowReferralThreshold => "score below referral threshold",
            RiskIndicator::Fatigue => "fatigue late in the session",
            RiskIndicator::RushedAnswers => "rushed answers",
            RiskIndicator::SlowAnswers => "slow answers",
            RiskIndicator::MissingResponses => "missing responses",
        };
        f.write_str(s)
    }
}

/// Recommended next step after a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intervention {
    ProfessionalEvaluation,
    TargetedPractice,
    ContinueScreening,
    AdvanceLevel,
}

impl fmt::Display for Intervention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intervention::ProfessionalEvaluation => "professional evaluation",
            Intervention::TargetedPractice => "targeted practice",
            Intervention::ContinueScreening => "continue screening",
            Intervention::AdvanceLevel => "advance to the next level",
        };
        f.write_str(s)
    }
}

/// Strengths, weaknesses and warning signs of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSummary {
    /// Kinds answered correctly at least 80% of the time.
    pub strong_areas: Vec<QuestionKind>,
    /// Kinds answered correctly less than 60% of the time.
    pub weak_areas: Vec<QuestionKind>,
    pub risk_indicators: Vec<RiskIndicator>,
    pub recommended_intervention: Intervention,
    pub follow_up: Vec<String>,
}

impl DiagnosticSummary {
    pub fn new(
        domain: Domain,
        score: &SessionScore,
        breakdown: &[ResponseRecord],
        time_analysis: &[TimeAnalysis],
    ) -> Self {
        let accuracy = kind_accuracy(breakdown);
        let strong_areas: Vec<QuestionKind> = accuracy
            .iter()
            .filter(|(_, pct)| **pct >= STRONG_FROM)
            .map(|(kind, _)| *kind)
            .collect();
        let weak_areas: Vec<QuestionKind> = accuracy
            .iter()
            .filter(|(_, pct)| **pct < WEAK_BELOW)
            .map(|(kind, _)| *kind)
            .collect();

        let answered = breakdown.len();
        let rushed = time_analysis.iter().filter(|t| t.rushed).count();
        let slow = time_analysis.iter().filter(|t| t.overthinking).count();
        let empty = breakdown.iter().filter(|r| r.outcome == Outcome::Empty).count();
        let metrics: Vec<PerformanceMetric> = breakdown.iter().map(PerformanceMetric::from).collect();

        let mut risk_indicators = Vec::new();
        if score.flagged {
            risk_indicators.push(RiskIndicator::BelowReferralThreshold);
        }
        if analyze(&metrics).fatigue {
            risk_indicators.push(RiskIndicator::Fatigue);
        }
        if rushed * 2 > answered {
            risk_indicators.push(RiskIndicator::RushedAnswers);
        }
        if slow * 2 > answered {
            risk_indicators.push(RiskIndicator::SlowAnswers);
        }
        if answered == 0 || (empty > 0 && empty * 4 >= answered) {
            risk_indicators.push(RiskIndicator::MissingResponses);
        }

        let recommended_intervention = if answered == 0 {
            Intervention::ContinueScreening
        } else if score.flagged {
            Intervention::ProfessionalEvaluation
        } else if !weak_areas.is_empty() {
            Intervention::TargetedPractice
        } else if score.band == Band::Excellent {
            Intervention::AdvanceLevel
        } else {
            Intervention::ContinueScreening
        };

        let mut follow_up = Vec::new();
        if recommended_intervention == Intervention::ProfessionalEvaluation {
            follow_up.push(format!(
                "Share this report with a specialist for a full {domain} evaluation."
            ));
        }
        for kind in &weak_areas {
            follow_up.push(format!("Practise {kind} questions at an easier level."));
        }
        for risk in &risk_indicators {
            let step = match risk {
                RiskIndicator::BelowReferralThreshold => continue,
                RiskIndicator::Fatigue => "Keep sessions short and take breaks.",
                RiskIndicator::RushedAnswers => "Encourage the student to take their time before answering.",
                RiskIndicator::SlowAnswers => "Allow extra time and check that the prompts are understood.",
                RiskIndicator::MissingResponses => "Repeat the screening when the student is ready to answer aloud.",
            };
            follow_up.push(step.to_string());
        }
        if recommended_intervention == Intervention::AdvanceLevel {
            follow_up.push("Try the next grade's question bank.".to_string());
        }
        if follow_up.is_empty() {
            follow_up.push("Review progress in the next session.".to_string());
        }

        Self {
            strong_areas,
            weak_areas,
            risk_indicators,
            recommended_intervention,
            follow_up,
        }
    }
}

fn narrative(domain: Domain, score: &SessionScore, struggling: &[QuestionKind]) -> String {
    if score.answered == 0 {
        return format!("No responses were recorded in this {domain} screening session.");
    }

    let opening = match score.band {
        Band::Excellent => "Excellent performance",
        Band::Good => "Good performance",
        Band::Moderate => "Moderate performance",
        Band::FlaggedConcern => "Performance is a concern",
    };
    let mut text = format!(
        "{opening}: {} of {} questions correct ({}%).",
        score.correct, score.total_questions, score.score
    );
    if !struggling.is_empty() {
        let kinds: Vec<String> = struggling.iter().map(|k| k.to_string()).collect();
        text.push_str(&format!(" Needs more practice with: {}.", kinds.join(", ")));
    }
    if score.flagged {
        text.push_str(&format!(
            " The {domain} screening score is below the referral threshold; a professional evaluation is recommended."
        ));
    }
    text
}

impl SessionReport {
    /// Score a frozen response list and build the report.
    pub fn build(
        student_id: &str,
        domain: Domain,
        grade: u8,
        total_questions: usize,
        breakdown: Vec<ResponseRecord>,
        config: &ScoringConfig,
    ) -> Self {
        let score = finalize(&breakdown, total_questions, config);
        let created_at = breakdown
            .last()
            .map(|r| r.submitted_at)
            .unwrap_or_default();
        let time_analysis: Vec<TimeAnalysis> =
            breakdown.iter().map(|r| TimeAnalysis::new(r.elapsed_ms)).collect();
        let diagnostic = DiagnosticSummary::new(domain, &score, &breakdown, &time_analysis);
        let narrative = narrative(domain, &score, &diagnostic.weak_areas);

        Self {
            id: report_id(student_id, domain, grade, total_questions, &breakdown),
            student_id: student_id.to_string(),
            domain,
            grade,
            created_at,
            total_questions,
            answered: score.answered,
            correct: score.correct,
            score: score.score,
            flagged: score.flagged,
            band: score.band,
            breakdown,
            time_analysis,
            narrative,
            diagnostic,
            refinement: None,
        }
    }

    /// Build the report again from this report's own breakdown.
    ///
    /// The refinement is dropped; everything else must come out identical.
    pub fn rescore(&self, config: &ScoringConfig) -> Self {
        Self::build(
            &self.student_id,
            self.domain,
            self.grade,
            self.total_questions,
            self.breakdown.clone(),
            config,
        )
    }

    /// Attach advisory external grading. Score and flag are left untouched.
    pub fn with_refinement(mut self, refinement: Refinement) -> Self {
        self.refinement = Some(refinement);
        self
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Default file name for this report.
    ///
    /// Characters of the student id other than letters, digits, `-` and `_`
    /// become `_`, so the name never leaves the output directory.
    pub fn file_name(&self) -> String {
        let student: String = self
            .student_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}-{}-{}.json", student, self.domain, self.id)
    }
}
