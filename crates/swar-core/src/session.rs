//! One student's pass through a question bank.
//!
//! Every submission runs validate, record and route to completion before
//! the next question is chosen. Scoring at the end is local and
//! synchronous; classifier refinement is a separate, optional step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifierAdapter, Refinement};
use crate::error::SessionError;
use crate::model::{Difficulty, Question, QuestionBank, ResponseRecord};
use crate::performance::PerformanceMetric;
use crate::report::SessionReport;
use crate::router::{route, Route};
use crate::scoring::ScoringConfig;
use crate::store::PerformanceStore;
use crate::traits::{ClassifyItem, ClassifyRequest};
use crate::validation::validate;

/// Session limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A session ends once it has this many responses per bank question,
    /// even if regression keeps it away from the last question.
    pub max_responses_factor: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_responses_factor: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Completed,
    Abandoned,
}

/// What one submission produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub record: ResponseRecord,
    pub route: Route,
    /// No further submissions will be accepted.
    pub complete: bool,
}

#[derive(Debug, Clone)]
pub struct AssessmentSession {
    student_id: String,
    bank: QuestionBank,
    current_index: usize,
    difficulty: Difficulty,
    responses: Vec<ResponseRecord>,
    state: SessionState,
    max_responses: usize,
}

impl AssessmentSession {
    pub fn new(student_id: &str, bank: QuestionBank, config: &SessionConfig) -> Result<Self, SessionError> {
        if bank.is_empty() {
            return Err(SessionError::EmptyBank(bank.id.clone()));
        }
        let max_responses = bank.len() * config.max_responses_factor.max(1);
        Ok(Self {
            student_id: student_id.to_string(),
            bank,
            current_index: 0,
            difficulty: Difficulty::default(),
            responses: Vec::new(),
            state: SessionState::Active,
            max_responses,
        })
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state != SessionState::Active
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn responses(&self) -> &[ResponseRecord] {
        &self.responses
    }

    /// The question waiting for an answer, if the session is still active.
    pub fn current_question(&self) -> Option<&Question> {
        if self.is_complete() {
            return None;
        }
        self.bank.questions.get(self.current_index)
    }

    /// Submit an answer to the current question, timestamped now.
    pub fn submit(
        &mut self,
        transcript: &str,
        elapsed_ms: u64,
        store: &PerformanceStore,
    ) -> Result<SubmitOutcome, SessionError> {
        self.submit_at(transcript, elapsed_ms, Utc::now(), store)
    }

    /// Submit an answer with an explicit submission time.
    ///
    /// Times earlier than the previous submission are moved up to it so
    /// records stay ordered.
    pub fn submit_at(
        &mut self,
        transcript: &str,
        elapsed_ms: u64,
        submitted_at: DateTime<Utc>,
        store: &PerformanceStore,
    ) -> Result<SubmitOutcome, SessionError> {
        if self.is_complete() {
            return Err(SessionError::AlreadyComplete);
        }
        let question = &self.bank.questions[self.current_index];
        let submitted_at = match self.responses.last() {
            Some(prev) if prev.submitted_at > submitted_at => prev.submitted_at,
            _ => submitted_at,
        };

        let validation = validate(transcript, &question.expected, question.kind);
        let record = ResponseRecord::new(
            question,
            self.current_index,
            transcript,
            elapsed_ms,
            validation,
            self.difficulty,
            submitted_at,
        );
        self.responses.push(record.clone());
        store.record(
            &self.student_id,
            self.bank.domain,
            self.bank.grade,
            PerformanceMetric::from(&record),
        );

        let total = self.bank.len();
        let route = route(self.current_index, &self.responses, total);
        let complete = self.current_index == total - 1 || self.responses.len() >= self.max_responses;

        tracing::debug!(
            student = %self.student_id,
            question = record.question_id,
            correct = record.is_correct,
            next = route.next_index,
            difficulty = %route.difficulty,
            complete,
            "response submitted"
        );

        if complete {
            self.state = SessionState::Completed;
        } else {
            self.current_index = route.next_index;
            self.difficulty = route.difficulty;
        }

        Ok(SubmitOutcome {
            record,
            route,
            complete,
        })
    }

    /// Stop early. Responses already recorded stay valid.
    pub fn abandon(&mut self) {
        if self.state == SessionState::Active {
            tracing::info!(
                student = %self.student_id,
                answered = self.responses.len(),
                "session abandoned"
            );
            self.state = SessionState::Abandoned;
        }
    }

    /// Score the responses recorded so far.
    pub fn finish(&self, config: &ScoringConfig) -> SessionReport {
        SessionReport::build(
            &self.student_id,
            self.bank.domain,
            self.bank.grade,
            self.bank.len(),
            self.responses.clone(),
            config,
        )
    }

    /// The classifier batch for the responses recorded so far.
    pub fn classify_request(&self) -> ClassifyRequest {
        ClassifyRequest {
            domain: self.bank.domain,
            grade: self.bank.grade,
            items: self
                .responses
                .iter()
                .map(|r| ClassifyItem {
                    transcript: r.transcript.clone(),
                    expected: r.expected.clone(),
                    kind: r.kind,
                    elapsed_ms: r.elapsed_ms,
                })
                .collect(),
        }
    }

    /// Ask the classifier for advisory verdicts on every response.
    pub async fn refine(&self, adapter: &ClassifierAdapter) -> Refinement {
        adapter.classify(&self.classify_request()).await
    }
}
