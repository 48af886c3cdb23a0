//! Adaptive difficulty routing.
//!
//! A small rule table over the last three responses of the current session.
//! Until four responses exist the router always advances by one at medium
//! difficulty.

use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, ResponseRecord};

/// Responses needed before the rule table applies.
pub const MIN_HISTORY: usize = 4;
/// Number of most recent responses the rule table looks at.
pub const WINDOW: usize = 3;
const MEDIUM_FROM: u32 = 67;
const REGRESS_BELOW: u32 = 34;

/// How the index moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "by")]
pub enum Step {
    /// Moved forward by this many questions.
    Advance(usize),
    /// Moved back one question.
    Regress,
    /// Stayed put because the index was already at the end.
    Hold,
}

/// The router's decision for the next question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub next_index: usize,
    pub difficulty: Difficulty,
    pub step: Step,
}

/// Percentage correct in the window, rounded to a whole number.
///
/// Rounding puts two of three at 67, inside the medium band.
fn window_percentage(responses: &[ResponseRecord]) -> u32 {
    let window = &responses[responses.len().saturating_sub(WINDOW)..];
    if window.is_empty() {
        return 0;
    }
    let correct = window.iter().filter(|r| r.is_correct).count();
    (correct as f64 / window.len() as f64 * 100.0).round() as u32
}

/// Pick the next question index given every response of this session so far.
///
/// Indices are clamped to `[0, total_questions - 1]`; this never panics.
pub fn route(current_index: usize, responses: &[ResponseRecord], total_questions: usize) -> Route {
    if total_questions == 0 {
        return Route {
            next_index: 0,
            difficulty: Difficulty::Medium,
            step: Step::Hold,
        };
    }
    let last = total_questions - 1;
    let current = current_index.min(last);

    let advance = |by: usize, difficulty: Difficulty| {
        let next_index = (current + by).min(last);
        let step = if next_index == current {
            Step::Hold
        } else {
            Step::Advance(next_index - current)
        };
        Route {
            next_index,
            difficulty,
            step,
        }
    };

    if responses.len() < MIN_HISTORY {
        return advance(1, Difficulty::Medium);
    }

    let pct = window_percentage(responses);
    if pct == 100 {
        advance(2, Difficulty::Hard)
    } else if pct >= MEDIUM_FROM {
        advance(1, Difficulty::Medium)
    } else if pct < REGRESS_BELOW && current > 1 {
        Route {
            next_index: current - 1,
            difficulty: Difficulty::Easy,
            step: Step::Regress,
        }
    } else {
        advance(1, Difficulty::Easy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Question, QuestionKind};
    use crate::validation::validate;
    use chrono::Utc;

    fn responses(pattern: &[bool]) -> Vec<ResponseRecord> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, &correct)| {
                let question = Question {
                    id: i as u32 + 1,
                    prompt: "cat".into(),
                    expected: "cat".into(),
                    kind: QuestionKind::Word,
                };
                let answer = if correct { "cat" } else { "" };
                ResponseRecord::new(
                    &question,
                    i,
                    answer,
                    3000,
                    validate(answer, &question.expected, question.kind),
                    Difficulty::Medium,
                    Utc::now(),
                )
            })
            .collect()
    }

    #[test]
    fn fewer_than_four_responses_always_advance_one() {
        let r = route(0, &responses(&[false, false, false]), 10);
        assert_eq!(r.next_index, 1);
        assert_eq!(r.difficulty, Difficulty::Medium);
        assert_eq!(r.step, Step::Advance(1));
    }

    #[test]
    fn perfect_window_jumps_two_at_hard() {
        let r = route(4, &responses(&[false, true, true, true]), 10);
        assert_eq!(r.next_index, 6);
        assert_eq!(r.difficulty, Difficulty::Hard);
        assert_eq!(r.step, Step::Advance(2));
    }

    #[test]
    fn perfect_window_clamps_at_last_index() {
        let r = route(8, &responses(&[true; 5]), 10);
        assert_eq!(r.next_index, 9);
        assert_eq!(r.step, Step::Advance(1));

        let r = route(9, &responses(&[true; 5]), 10);
        assert_eq!(r.next_index, 9);
        assert_eq!(r.step, Step::Hold);
    }

    #[test]
    fn two_of_three_is_medium() {
        let r = route(3, &responses(&[false, true, false, true]), 10);
        assert_eq!(r.next_index, 4);
        assert_eq!(r.difficulty, Difficulty::Medium);
    }

    #[test]
    fn poor_window_regresses_past_index_one() {
        let r = route(5, &responses(&[true, true, false, false, false]), 10);
        assert_eq!(r.next_index, 4);
        assert_eq!(r.difficulty, Difficulty::Easy);
        assert_eq!(r.step, Step::Regress);

        // One of three rounds to 33, still below the regression cutoff.
        let r = route(5, &responses(&[true, false, true, false, false]), 10);
        assert_eq!(r.step, Step::Regress);
    }

    #[test]
    fn poor_window_never_regresses_at_start() {
        for current in [0, 1] {
            let r = route(current, &responses(&[false; 4]), 10);
            assert_eq!(r.next_index, current + 1);
            assert_eq!(r.difficulty, Difficulty::Easy);
            assert_eq!(r.step, Step::Advance(1));
        }
    }

    #[test]
    fn out_of_range_index_is_clamped() {
        let r = route(50, &responses(&[true, true]), 5);
        assert_eq!(r.next_index, 4);
        assert_eq!(r.step, Step::Hold);

        let r = route(0, &[], 0);
        assert_eq!(r.next_index, 0);
    }

    #[test]
    fn route_is_deterministic() {
        let history = responses(&[true, false, true, true, false, true]);
        assert_eq!(route(5, &history, 12), route(5, &history, 12));
    }
}
