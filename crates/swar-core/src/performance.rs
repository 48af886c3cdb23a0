//! Rolling performance model.
//!
//! Each (student, domain) pair has an append-only history of graded
//! responses. Everything else here, the learning pattern, the student
//! profile and the next-question prediction, is derived from that history
//! and can be rebuilt from it at any time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, Domain, QuestionKind, ResponseRecord};

/// Size of the window behind the recent accuracy figure.
pub const RECENT_WINDOW: usize = 10;
/// Trend changes need more than this many points between thirds.
const TREND_MARGIN: f64 = 10.0;
/// Fatigue is only judged on a last-quarter window of at least this size.
const FATIGUE_MIN_WINDOW: usize = 4;
/// Per-kind accuracy below this marks a struggling area.
const STRUGGLING_BELOW: f64 = 60.0;
/// Per-kind accuracy at or above this marks a strength.
const STRENGTH_FROM: f64 = 80.0;
const LEARNING_RATE_STEP: f64 = 0.1;
const LEARNING_RATE_RANGE: (f64, f64) = (0.5, 2.0);
const ADJUSTMENT_STEP: f64 = 0.5;
const ADJUSTMENT_RANGE: (f64, f64) = (-2.0, 2.0);
const ADJUST_UP_FROM: f64 = 85.0;
const ADJUST_DOWN_BELOW: f64 = 50.0;
const DEFAULT_RESPONSE_TIME_MS: f64 = 5000.0;

/// One entry of a performance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub question_id: u32,
    pub question_kind: QuestionKind,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: u64,
    pub is_correct: bool,
    pub confidence: u8,
    pub difficulty_level: u8,
}

impl From<&ResponseRecord> for PerformanceMetric {
    fn from(record: &ResponseRecord) -> Self {
        Self {
            question_id: record.question_id,
            question_kind: record.kind,
            timestamp: record.submitted_at,
            response_time_ms: record.elapsed_ms,
            is_correct: record.is_correct,
            confidence: record.confidence,
            difficulty_level: record.kind.difficulty_level(record.difficulty),
        }
    }
}

/// Direction of recent performance relative to earlier performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

/// Summary statistics over a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPattern {
    pub trend: Trend,
    /// Accuracy over the last [`RECENT_WINDOW`] entries.
    pub recent_accuracy: f64,
    /// Accuracy over the whole history.
    pub average_accuracy: f64,
    pub average_response_time_ms: f64,
    /// `100 - stddev` of the 0/100 correctness series, floored at 0.
    pub consistency: f64,
    pub fatigue: bool,
    /// Time between the first and last entry.
    pub session_duration_ms: i64,
}

fn accuracy(entries: &[PerformanceMetric]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    entries.iter().filter(|m| m.is_correct).count() as f64 / entries.len() as f64 * 100.0
}

/// Accuracy over the last ten entries, or 50 for an empty history.
pub fn recent_accuracy(history: &[PerformanceMetric]) -> f64 {
    if history.is_empty() {
        return 50.0;
    }
    let start = history.len().saturating_sub(RECENT_WINDOW);
    accuracy(&history[start..])
}

/// Derive the learning pattern of a history.
pub fn analyze(history: &[PerformanceMetric]) -> LearningPattern {
    if history.is_empty() {
        return LearningPattern {
            trend: Trend::Stable,
            recent_accuracy: 50.0,
            average_accuracy: 50.0,
            average_response_time_ms: DEFAULT_RESPONSE_TIME_MS,
            consistency: 50.0,
            fatigue: false,
            session_duration_ms: 0,
        };
    }

    let n = history.len();
    let third = n.div_ceil(3);
    let recent_third = &history[n - third..];
    let earlier_third = if n > third {
        &history[..third]
    } else {
        history
    };
    let recent = accuracy(recent_third);
    let earlier = accuracy(earlier_third);
    let trend = if recent > earlier + TREND_MARGIN {
        Trend::Improving
    } else if recent < earlier - TREND_MARGIN {
        Trend::Declining
    } else {
        Trend::Stable
    };

    let average_accuracy = accuracy(history);
    let average_response_time_ms =
        history.iter().map(|m| m.response_time_ms as f64).sum::<f64>() / n as f64;

    let variance = history
        .iter()
        .map(|m| {
            let diff = if m.is_correct { 100.0 } else { 0.0 } - average_accuracy;
            diff * diff
        })
        .sum::<f64>()
        / n as f64;
    let consistency = (100.0 - variance.sqrt()).max(0.0);

    let quarter = &history[n - n.div_ceil(4)..];
    let misses = quarter.iter().filter(|m| !m.is_correct).count();
    let fatigue = quarter.len() >= FATIGUE_MIN_WINDOW && misses as f64 > quarter.len() as f64 / 2.0;

    let session_duration_ms = (history[n - 1].timestamp - history[0].timestamp).num_milliseconds();

    LearningPattern {
        trend,
        recent_accuracy: recent_accuracy(history),
        average_accuracy,
        average_response_time_ms,
        consistency,
        fatigue,
        session_duration_ms,
    }
}

/// Derived view of a student in one domain.
///
/// A cache over the history: [`StudentProfile::rebuild`] reproduces it
/// exactly from the entries alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: String,
    pub domain: Domain,
    pub base_grade: u8,
    /// Estimated competency, 0 to 100.
    pub competency: f64,
    /// Multiplier in `[0.5, 2.0]`.
    pub learning_rate: f64,
    pub struggling: Vec<QuestionKind>,
    pub strengths: Vec<QuestionKind>,
    /// Cumulative grade adjustment in `[-2, 2]`.
    pub grade_adjustment: f64,
    /// Number of history entries folded into this profile.
    pub observed: usize,
}

impl StudentProfile {
    /// A neutral profile for a student without history.
    pub fn new(student_id: &str, domain: Domain, base_grade: u8) -> Self {
        Self {
            student_id: student_id.to_string(),
            domain,
            base_grade,
            competency: 50.0,
            learning_rate: 1.0,
            struggling: Vec::new(),
            strengths: Vec::new(),
            grade_adjustment: 0.0,
            observed: 0,
        }
    }

    /// Replay a whole history into a fresh profile.
    pub fn rebuild(
        student_id: &str,
        domain: Domain,
        base_grade: u8,
        history: &[PerformanceMetric],
    ) -> Self {
        let mut profile = Self::new(student_id, domain, base_grade);
        for end in 1..=history.len() {
            profile.observe(&history[..end]);
        }
        profile
    }

    /// Fold the newest entry of `history` into the profile.
    ///
    /// `history` must be the history this profile was built from with
    /// exactly one entry appended.
    pub fn observe(&mut self, history: &[PerformanceMetric]) {
        if history.is_empty() {
            return;
        }

        let recent = recent_accuracy(history);
        self.competency = recent;

        let (lr_min, lr_max) = LEARNING_RATE_RANGE;
        match analyze(history).trend {
            Trend::Improving => {
                self.learning_rate = (self.learning_rate + LEARNING_RATE_STEP).min(lr_max)
            }
            Trend::Declining => {
                self.learning_rate = (self.learning_rate - LEARNING_RATE_STEP).max(lr_min)
            }
            Trend::Stable => {}
        }

        let per_kind = accuracy_by_kind(history);
        self.struggling = per_kind
            .iter()
            .filter(|(_, acc)| **acc < STRUGGLING_BELOW)
            .map(|(kind, _)| *kind)
            .collect();
        self.strengths = per_kind
            .iter()
            .filter(|(_, acc)| **acc >= STRENGTH_FROM)
            .map(|(kind, _)| *kind)
            .collect();

        let (adj_min, adj_max) = ADJUSTMENT_RANGE;
        if recent >= ADJUST_UP_FROM {
            self.grade_adjustment = (self.grade_adjustment + ADJUSTMENT_STEP).min(adj_max);
        } else if recent < ADJUST_DOWN_BELOW {
            self.grade_adjustment = (self.grade_adjustment - ADJUSTMENT_STEP).max(adj_min);
        }

        self.observed = history.len();
    }
}

fn accuracy_by_kind(history: &[PerformanceMetric]) -> BTreeMap<QuestionKind, f64> {
    let mut counts: BTreeMap<QuestionKind, (usize, usize)> = BTreeMap::new();
    for m in history {
        let entry = counts.entry(m.question_kind).or_default();
        entry.1 += 1;
        if m.is_correct {
            entry.0 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(kind, (correct, total))| (kind, correct as f64 / total as f64 * 100.0))
        .collect()
}

/// Recommendation for the next question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub recommended_difficulty: Difficulty,
    /// 0 to 100.
    pub success_probability: f64,
    pub estimated_time_ms: u64,
    /// Grade level, clamped to 1..=12.
    pub recommended_grade: f64,
    /// 0 to 1.
    pub confidence: f64,
}

/// Predict difficulty and success chances for the next question.
pub fn predict(profile: &StudentProfile, history: &[PerformanceMetric]) -> Prediction {
    if history.is_empty() {
        return Prediction {
            recommended_difficulty: Difficulty::Medium,
            success_probability: 60.0,
            estimated_time_ms: DEFAULT_RESPONSE_TIME_MS as u64,
            recommended_grade: f64::from(profile.base_grade),
            confidence: 0.5,
        };
    }

    let pattern = analyze(history);
    let recent = pattern.recent_accuracy;

    let (mut difficulty, mut success, mut grade_delta): (Difficulty, f64, f64) = if recent >= 85.0 {
        (Difficulty::Hard, 75.0, 1.0)
    } else if recent >= 70.0 {
        (Difficulty::Medium, 70.0, 0.5)
    } else if recent >= 50.0 {
        (Difficulty::Easy, 60.0, 0.0)
    } else {
        (Difficulty::Easy, 45.0, -1.0)
    };

    match pattern.trend {
        Trend::Improving => {
            success += 10.0;
            grade_delta += profile.learning_rate;
        }
        Trend::Declining => {
            success -= 15.0;
            grade_delta -= 1.0;
        }
        Trend::Stable => {}
    }

    if pattern.fatigue {
        success -= 10.0;
        difficulty = Difficulty::Easy;
    }

    let multiplier = match difficulty {
        Difficulty::Easy => 0.7,
        Difficulty::Medium => 1.0,
        Difficulty::Hard => 1.5,
    };

    Prediction {
        recommended_difficulty: difficulty,
        success_probability: success.clamp(0.0, 100.0),
        estimated_time_ms: (pattern.average_response_time_ms * multiplier).round() as u64,
        recommended_grade: (f64::from(profile.base_grade) + grade_delta).clamp(1.0, 12.0),
        confidence: pattern.consistency / 100.0,
    }
}

/// Recommendations derived from a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub next_difficulty: Difficulty,
    pub intervention_needed: bool,
    pub focus_areas: Vec<QuestionKind>,
    pub reinforcement_areas: Vec<QuestionKind>,
    pub ready_for_next_grade: bool,
}

/// Full view of a student in one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAnalysis {
    pub profile: StudentProfile,
    pub pattern: LearningPattern,
    pub recommendations: Recommendations,
}

impl StudentAnalysis {
    pub fn new(profile: StudentProfile, history: &[PerformanceMetric]) -> Self {
        let competency = profile.competency;
        let next_difficulty = if competency >= 85.0 {
            Difficulty::Hard
        } else if competency >= 70.0 {
            Difficulty::Medium
        } else {
            Difficulty::Easy
        };
        let recommendations = Recommendations {
            next_difficulty,
            intervention_needed: competency < 50.0,
            focus_areas: profile.struggling.clone(),
            reinforcement_areas: profile.strengths.clone(),
            ready_for_next_grade: competency >= 80.0,
        };
        Self {
            pattern: analyze(history),
            profile,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn metric(i: usize, correct: bool, kind: QuestionKind) -> PerformanceMetric {
        PerformanceMetric {
            question_id: i as u32 + 1,
            question_kind: kind,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
                + Duration::seconds(10 * i as i64),
            response_time_ms: 4000,
            is_correct: correct,
            confidence: if correct { 100 } else { 0 },
            difficulty_level: 2,
        }
    }

    fn history(pattern: &[bool]) -> Vec<PerformanceMetric> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, &c)| metric(i, c, QuestionKind::Word))
            .collect()
    }

    #[test]
    fn empty_history_pattern_is_neutral() {
        let p = analyze(&[]);
        assert_eq!(p.trend, Trend::Stable);
        assert_eq!(p.average_accuracy, 50.0);
        assert_eq!(p.average_response_time_ms, 5000.0);
        assert!(!p.fatigue);
        assert_eq!(recent_accuracy(&[]), 50.0);
    }

    #[test]
    fn improving_and_declining_trends() {
        let h = history(&[false, false, false, true, true, true]);
        assert_eq!(analyze(&h).trend, Trend::Improving);

        let h = history(&[true, true, true, false, false, false]);
        assert_eq!(analyze(&h).trend, Trend::Declining);

        let h = history(&[true, false, true, false, true, false]);
        assert_eq!(analyze(&h).trend, Trend::Stable);
    }

    #[test]
    fn short_history_compares_against_itself() {
        // One entry: recent third and earlier third are the same slice.
        let h = history(&[false]);
        assert_eq!(analyze(&h).trend, Trend::Stable);
    }

    #[test]
    fn consistency_from_binary_series() {
        let all_right = history(&[true; 5]);
        assert_eq!(analyze(&all_right).consistency, 100.0);

        // Half right: stddev 50.
        let half = history(&[true, false, true, false]);
        assert_eq!(analyze(&half).consistency, 50.0);
    }

    #[test]
    fn fatigue_needs_a_window_of_four() {
        // 12 entries -> last quarter of 3: too small even if all wrong.
        let mut pattern = vec![true; 9];
        pattern.extend([false; 3]);
        assert!(!analyze(&history(&pattern)).fatigue);

        // 16 entries -> last quarter of 4, three misses.
        let mut pattern = vec![true; 12];
        pattern.extend([true, false, false, false]);
        assert!(analyze(&history(&pattern)).fatigue);

        // Two of four wrong is not more than half.
        let mut pattern = vec![true; 12];
        pattern.extend([true, true, false, false]);
        assert!(!analyze(&history(&pattern)).fatigue);
    }

    #[test]
    fn recent_accuracy_uses_last_ten() {
        let mut pattern = vec![false; 5];
        pattern.extend([true; 10]);
        assert_eq!(recent_accuracy(&history(&pattern)), 100.0);
        assert_eq!(recent_accuracy(&history(&[true, false])), 50.0);
    }

    #[test]
    fn session_duration_spans_history() {
        let h = history(&[true, true, true]);
        assert_eq!(analyze(&h).session_duration_ms, 20_000);
    }

    #[test]
    fn profile_tracks_areas_and_adjustment() {
        let mut h = Vec::new();
        let mut profile = StudentProfile::new("s1", Domain::Dyslexia, 3);
        for i in 0..5 {
            h.push(metric(i, true, QuestionKind::Word));
            profile.observe(&h);
        }
        for i in 5..8 {
            h.push(metric(i, false, QuestionKind::Sentence));
            profile.observe(&h);
        }

        assert_eq!(profile.strengths, vec![QuestionKind::Word]);
        assert_eq!(profile.struggling, vec![QuestionKind::Sentence]);
        assert_eq!(profile.competency, 62.5);
        assert_eq!(profile.observed, 8);
        assert!(profile.grade_adjustment > 0.0 && profile.grade_adjustment <= 2.0);
        assert!((0.5..=2.0).contains(&profile.learning_rate));
    }

    #[test]
    fn profile_nudges_follow_trend_and_recent_accuracy() {
        // One miss, six hits, then six misses.
        let mut pattern = vec![false];
        pattern.extend([true; 6]);
        pattern.extend([false; 6]);
        let h = history(&pattern);

        let expected_rate = [1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6, 1.6, 1.5, 1.4, 1.3, 1.2, 1.1];
        let expected_adjustment = [-0.5, -0.5, -0.5, -0.5, -0.5, -0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -0.5];

        let mut profile = StudentProfile::new("s1", Domain::Dyslexia, 2);
        for end in 1..=h.len() {
            profile.observe(&h[..end]);
            assert!(
                (profile.learning_rate - expected_rate[end - 1]).abs() < 1e-9,
                "learning rate after {end} entries: {}",
                profile.learning_rate
            );
            assert!(
                (profile.grade_adjustment - expected_adjustment[end - 1]).abs() < 1e-9,
                "grade adjustment after {end} entries: {}",
                profile.grade_adjustment
            );
        }
        assert_eq!(profile.competency, 40.0);
    }

    #[test]
    fn adjustment_and_learning_rate_are_clamped() {
        let h = history(&[false; 30]);
        let profile = StudentProfile::rebuild("s1", Domain::Dyscalculia, 2, &h);
        assert_eq!(profile.grade_adjustment, -2.0);
        assert_eq!(profile.competency, 0.0);
        assert!(profile.learning_rate >= 0.5);
    }

    #[test]
    fn rebuild_matches_incremental_updates() {
        let pattern = [true, false, false, true, true, true, false, true, true, true, true];
        let h = history(&pattern);
        let mut incremental = StudentProfile::new("s1", Domain::Dyslexia, 4);
        for end in 1..=h.len() {
            incremental.observe(&h[..end]);
        }
        let rebuilt = StudentProfile::rebuild("s1", Domain::Dyslexia, 4, &h);
        assert_eq!(incremental, rebuilt);
    }

    #[test]
    fn prediction_for_strong_student() {
        let h = history(&[true; 6]);
        let profile = StudentProfile::rebuild("s1", Domain::Dyslexia, 3, &h);
        let p = predict(&profile, &h);
        assert_eq!(p.recommended_difficulty, Difficulty::Hard);
        assert_eq!(p.success_probability, 75.0);
        assert_eq!(p.recommended_grade, 4.0);
        assert_eq!(p.estimated_time_ms, 6000);
        assert_eq!(p.confidence, 1.0);
    }

    #[test]
    fn prediction_for_fatigued_student() {
        let mut pattern = vec![true; 12];
        pattern.extend([false; 4]);
        let h = history(&pattern);
        let profile = StudentProfile::rebuild("s1", Domain::Dyslexia, 1, &h);
        let p = predict(&profile, &h);
        assert_eq!(p.recommended_difficulty, Difficulty::Easy);
        assert_eq!(p.recommended_grade, 1.0);
        assert!(p.success_probability < 60.0);
    }

    #[test]
    fn prediction_without_history_is_default() {
        let profile = StudentProfile::new("s1", Domain::Dyslexia, 5);
        let p = predict(&profile, &[]);
        assert_eq!(p.recommended_difficulty, Difficulty::Medium);
        assert_eq!(p.recommended_grade, 5.0);
        assert_eq!(p.estimated_time_ms, 5000);
    }

    #[test]
    fn analysis_recommendations() {
        let h = history(&[false, false, true, false]);
        let profile = StudentProfile::rebuild("s1", Domain::Dyslexia, 2, &h);
        let analysis = StudentAnalysis::new(profile, &h);
        assert!(analysis.recommendations.intervention_needed);
        assert!(!analysis.recommendations.ready_for_next_grade);
        assert_eq!(analysis.recommendations.next_difficulty, Difficulty::Easy);
        assert_eq!(analysis.recommendations.focus_areas, vec![QuestionKind::Word]);
    }
}
