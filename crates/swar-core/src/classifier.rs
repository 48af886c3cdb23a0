//! Timeout-bounded adapter around an optional external classifier.
//!
//! The adapter never fails. Any error, timeout or malformed answer from the
//! remote side is replaced by the local validator's verdicts, tagged
//! [`Source::Fallback`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::traits::{AnswerClassifier, AssistedVerdict, ClassifyRequest, ClassifyResponse, SessionDiagnostic};
use crate::validation::validate;

/// Where a refinement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Produced by the external classifier.
    Assisted,
    /// Produced locally because the external classifier was unavailable.
    Fallback,
}

/// Advisory grading for a whole session.
///
/// Attached to a report next to, never instead of, the local score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    pub source: Source,
    /// Name of the classifier that produced the verdicts.
    pub provider: String,
    /// One verdict per response, in response order.
    pub verdicts: Vec<AssistedVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// The classifier's own referral opinion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
    /// The classifier's own session diagnostic, shown next to the local one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<SessionDiagnostic>,
}

/// Deterministic classifier backed by the local answer validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClassifier;

impl LocalClassifier {
    pub fn grade(request: &ClassifyRequest) -> ClassifyResponse {
        let verdicts = request
            .items
            .iter()
            .map(|item| {
                let v = validate(&item.transcript, &item.expected, item.kind);
                AssistedVerdict {
                    is_correct: v.is_correct,
                    confidence: f64::from(v.confidence),
                    mastery: Some(v.mastery()),
                    reason: v.reason,
                    semantic_score: None,
                    feedback: None,
                }
            })
            .collect();
        ClassifyResponse {
            verdicts,
            narrative: None,
            flagged: None,
            diagnostic: None,
        }
    }
}

#[async_trait]
impl AnswerClassifier for LocalClassifier {
    fn name(&self) -> &str {
        "local"
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, ClassifierError> {
        Ok(Self::grade(request))
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Wraps the configured classifier, if any, with a timeout and a local fallback.
#[derive(Clone)]
pub struct ClassifierAdapter {
    primary: Option<Arc<dyn AnswerClassifier>>,
    timeout: Duration,
}

impl std::fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierAdapter")
            .field("primary", &self.primary.as_ref().map(|p| p.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClassifierAdapter {
    pub fn new(primary: Option<Arc<dyn AnswerClassifier>>, timeout: Duration) -> Self {
        Self { primary, timeout }
    }

    /// An adapter that always grades locally.
    pub fn fallback_only() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// Name of the external classifier, or "local".
    pub fn provider_name(&self) -> &str {
        self.primary.as_ref().map_or("local", |p| p.name())
    }

    fn fallback(request: &ClassifyRequest) -> Refinement {
        let local = LocalClassifier::grade(request);
        Refinement {
            source: Source::Fallback,
            provider: LocalClassifier.name().to_string(),
            verdicts: local.verdicts,
            narrative: None,
            flagged: None,
            diagnostic: None,
        }
    }

    async fn call(
        &self,
        primary: &dyn AnswerClassifier,
        request: &ClassifyRequest,
    ) -> Result<ClassifyResponse, ClassifierError> {
        let response = tokio::time::timeout(self.timeout, primary.classify(request))
            .await
            .map_err(|_| ClassifierError::Timeout(self.timeout.as_millis() as u64))??;

        if response.verdicts.len() != request.items.len() {
            return Err(ClassifierError::MalformedResponse(format!(
                "expected {} verdicts, got {}",
                request.items.len(),
                response.verdicts.len()
            )));
        }
        Ok(response)
    }

    /// Grade a batch. Always returns one verdict per item.
    pub async fn classify(&self, request: &ClassifyRequest) -> Refinement {
        let Some(primary) = &self.primary else {
            return Self::fallback(request);
        };
        if request.items.is_empty() {
            return Self::fallback(request);
        }

        match self.call(primary.as_ref(), request).await {
            Ok(response) => {
                tracing::debug!(
                    provider = primary.name(),
                    items = request.items.len(),
                    "classifier answered"
                );
                let verdicts = response
                    .verdicts
                    .into_iter()
                    .map(|mut v| {
                        v.confidence = clamp_score(v.confidence);
                        v.semantic_score = v.semantic_score.map(clamp_score);
                        v
                    })
                    .collect();
                Refinement {
                    source: Source::Assisted,
                    provider: primary.name().to_string(),
                    verdicts,
                    narrative: response.narrative,
                    flagged: response.flagged,
                    diagnostic: response.diagnostic,
                }
            }
            Err(e) => {
                tracing::warn!(
                    provider = primary.name(),
                    error = %e,
                    permanent = e.is_permanent(),
                    "classifier unavailable, using local validation"
                );
                Self::fallback(request)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Domain, QuestionKind};
    use crate::traits::ClassifyItem;
    use crate::validation::Mastery;

    fn request() -> ClassifyRequest {
        ClassifyRequest {
            domain: Domain::Dyslexia,
            grade: 1,
            items: vec![
                ClassifyItem {
                    transcript: "cat".into(),
                    expected: "cat".into(),
                    kind: QuestionKind::Word,
                    elapsed_ms: 2000,
                },
                ClassifyItem {
                    transcript: "bed".into(),
                    expected: "red".into(),
                    kind: QuestionKind::Word,
                    elapsed_ms: 2500,
                },
            ],
        }
    }

    struct Failing;

    #[async_trait]
    impl AnswerClassifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn classify(&self, _: &ClassifyRequest) -> Result<ClassifyResponse, ClassifierError> {
            Err(ClassifierError::NetworkError("connection refused".into()))
        }
    }

    struct Slow;

    #[async_trait]
    impl AnswerClassifier for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, ClassifierError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(LocalClassifier::grade(request))
        }
    }

    struct Fixed(ClassifyResponse);

    #[async_trait]
    impl AnswerClassifier for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn classify(&self, _: &ClassifyRequest) -> Result<ClassifyResponse, ClassifierError> {
            Ok(self.0.clone())
        }
    }

    fn verdict(is_correct: bool, confidence: f64) -> AssistedVerdict {
        AssistedVerdict {
            is_correct,
            confidence,
            reason: "remote".into(),
            semantic_score: Some(150.0),
            mastery: Some(Mastery::Developing),
            feedback: Some("keep going".into()),
        }
    }

    #[tokio::test]
    async fn no_primary_grades_locally() {
        let adapter = ClassifierAdapter::fallback_only();
        let r = adapter.classify(&request()).await;
        assert_eq!(r.source, Source::Fallback);
        assert_eq!(r.provider, "local");
        assert_eq!(r.verdicts.len(), 2);
        assert!(r.verdicts[0].is_correct);
        assert_eq!(r.verdicts[0].confidence, 100.0);
        assert!(!r.verdicts[1].is_correct);
    }

    #[tokio::test]
    async fn failure_falls_back_to_same_shape() {
        let adapter = ClassifierAdapter::new(Some(Arc::new(Failing)), Duration::from_secs(1));
        let fallback = adapter.classify(&request()).await;
        let local = ClassifierAdapter::fallback_only().classify(&request()).await;
        assert_eq!(fallback, local);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back() {
        let adapter = ClassifierAdapter::new(Some(Arc::new(Slow)), Duration::from_millis(500));
        let r = adapter.classify(&request()).await;
        assert_eq!(r.source, Source::Fallback);
        assert_eq!(r.verdicts.len(), 2);
    }

    #[tokio::test]
    async fn verdict_count_mismatch_falls_back() {
        let response = ClassifyResponse {
            verdicts: vec![verdict(true, 90.0)],
            narrative: None,
            flagged: None,
            diagnostic: None,
        };
        let adapter = ClassifierAdapter::new(Some(Arc::new(Fixed(response))), Duration::from_secs(1));
        assert_eq!(adapter.classify(&request()).await.source, Source::Fallback);
    }

    #[tokio::test]
    async fn assisted_results_are_clamped() {
        let response = ClassifyResponse {
            verdicts: vec![verdict(true, 130.0), verdict(true, -4.0)],
            narrative: Some("Strong phonics.".into()),
            flagged: Some(false),
            diagnostic: Some(SessionDiagnostic {
                strong_areas: vec!["phonics".into()],
                recommended_intervention: Some("Keep reading daily".into()),
                ..SessionDiagnostic::default()
            }),
        };
        let adapter = ClassifierAdapter::new(Some(Arc::new(Fixed(response))), Duration::from_secs(1));
        let r = adapter.classify(&request()).await;
        assert_eq!(r.source, Source::Assisted);
        assert_eq!(r.provider, "fixed");
        assert_eq!(r.verdicts[0].confidence, 100.0);
        assert_eq!(r.verdicts[1].confidence, 0.0);
        assert_eq!(r.verdicts[0].semantic_score, Some(100.0));
        assert_eq!(r.narrative.as_deref(), Some("Strong phonics."));
        assert_eq!(r.flagged, Some(false));
        let diagnostic = r.diagnostic.unwrap();
        assert_eq!(diagnostic.strong_areas, vec!["phonics".to_string()]);
        assert_eq!(diagnostic.recommended_intervention.as_deref(), Some("Keep reading daily"));
    }

    #[tokio::test]
    async fn empty_batch_skips_remote_call() {
        let adapter = ClassifierAdapter::new(Some(Arc::new(Failing)), Duration::from_secs(1));
        let mut req = request();
        req.items.clear();
        let r = adapter.classify(&req).await;
        assert!(r.verdicts.is_empty());
        assert_eq!(adapter.provider_name(), "failing");
    }
}
