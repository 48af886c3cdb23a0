//! Screening engine.
//!
//! Runs scripted sessions for many students concurrently. Sessions share
//! the performance store and the classifier adapter; nothing else.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::classifier::ClassifierAdapter;
use crate::model::{QuestionBank, ResponseRecord};
use crate::report::SessionReport;
use crate::scoring::ScoringConfig;
use crate::session::{AssessmentSession, SessionConfig};
use crate::store::PerformanceStore;

/// Configuration for the screening engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum concurrent sessions.
    pub parallelism: usize,
    pub session: SessionConfig,
    pub scoring: ScoringConfig,
    /// Ask the classifier for advisory verdicts after each session.
    pub refine: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            session: SessionConfig::default(),
            scoring: ScoringConfig::default(),
            refine: true,
        }
    }
}

/// A prepared answer for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedAnswer {
    pub transcript: String,
    pub elapsed_ms: u64,
}

/// A student and the answers they will give, keyed by question id.
///
/// Questions without a prepared answer receive an empty response.
#[derive(Debug, Clone)]
pub struct ScriptedSession {
    pub student_id: String,
    pub bank: Arc<QuestionBank>,
    pub answers: HashMap<u32, ScriptedAnswer>,
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_session_start(&self, student_id: &str, bank: &QuestionBank);
    fn on_response(&self, student_id: &str, record: &ResponseRecord);
    fn on_session_complete(&self, report: &SessionReport);
    fn on_session_error(&self, student_id: &str, error: &str);
    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_session_start(&self, _: &str, _: &QuestionBank) {}
    fn on_response(&self, _: &str, _: &ResponseRecord) {}
    fn on_session_complete(&self, _: &SessionReport) {}
    fn on_session_error(&self, _: &str, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Result of a batch run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Reports in completion order.
    pub reports: Vec<SessionReport>,
    pub failed: usize,
    pub duration_ms: u64,
}

pub struct ScreeningEngine {
    store: Arc<PerformanceStore>,
    adapter: ClassifierAdapter,
    config: EngineConfig,
}

impl ScreeningEngine {
    pub fn new(store: Arc<PerformanceStore>, adapter: ClassifierAdapter, config: EngineConfig) -> Self {
        Self {
            store,
            adapter,
            config,
        }
    }

    pub fn store(&self) -> &PerformanceStore {
        &self.store
    }

    async fn run_one(&self, script: &ScriptedSession, progress: &dyn ProgressReporter) -> Result<SessionReport> {
        let mut session =
            AssessmentSession::new(&script.student_id, (*script.bank).clone(), &self.config.session)?;
        progress.on_session_start(&script.student_id, &script.bank);

        while let Some(question) = session.current_question() {
            let (transcript, elapsed_ms) = match script.answers.get(&question.id) {
                Some(answer) => (answer.transcript.clone(), answer.elapsed_ms),
                None => {
                    tracing::debug!(question = question.id, "no scripted answer, submitting empty response");
                    (String::new(), 0)
                }
            };
            let outcome = session.submit(&transcript, elapsed_ms, &self.store)?;
            progress.on_response(&script.student_id, &outcome.record);
        }

        // Local scoring never waits on the classifier.
        let report = session.finish(&self.config.scoring);
        if !self.config.refine {
            return Ok(report);
        }
        let refinement = session.refine(&self.adapter).await;
        Ok(report.with_refinement(refinement))
    }

    /// Run every scripted session, at most `parallelism` at a time.
    pub async fn run(&self, scripts: &[ScriptedSession], progress: &dyn ProgressReporter) -> BatchOutcome {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        let mut futures = FuturesUnordered::new();
        for script in scripts {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => self.run_one(script, progress).await,
                    Err(_) => Err(anyhow::anyhow!("semaphore closed")),
                };
                (script.student_id.as_str(), result)
            });
        }

        let total = futures.len();
        let mut reports = Vec::new();
        let mut failed = 0usize;

        while let Some((student_id, result)) = futures.next().await {
            match result {
                Ok(report) => {
                    progress.on_session_complete(&report);
                    reports.push(report);
                }
                Err(e) => {
                    tracing::error!("session failed for {student_id}: {e:#}");
                    progress.on_session_error(student_id, &e.to_string());
                    failed += 1;
                }
            }
        }

        let elapsed = start.elapsed();
        progress.on_batch_complete(total, reports.len(), failed, elapsed);

        BatchOutcome {
            reports,
            failed,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}
