//! Mock classifier for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use swar_core::classifier::LocalClassifier;
use swar_core::error::ClassifierError;
use swar_core::traits::{parse_reply, AnswerClassifier, ClassifyRequest, ClassifyResponse};

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Raw model text, run through the same reply parser as real providers.
    Text(String),
    /// Agree with the local validator and attach a narrative.
    Agree { narrative: String },
    /// Fail every call.
    Fail(String),
}

/// A mock classifier for exercising the pipeline without network calls.
pub struct MockClassifier {
    reply: MockReply,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<ClassifyRequest>>,
}

impl MockClassifier {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A mock that always returns the same model text.
    pub fn with_fixed_reply(text: &str) -> Self {
        Self::new(MockReply::Text(text.to_string()))
    }

    /// A mock that agrees with local grading.
    pub fn agreeing(narrative: &str) -> Self {
        Self::new(MockReply::Agree {
            narrative: narrative.to_string(),
        })
    }

    /// A mock whose every call fails with a network error.
    pub fn failing(message: &str) -> Self {
        Self::new(MockReply::Fail(message.to_string()))
    }

    /// Get the number of calls made to this classifier.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this classifier.
    pub fn last_request(&self) -> Option<ClassifyRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AnswerClassifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, ClassifierError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());

        match &self.reply {
            MockReply::Text(text) => parse_reply(text),
            MockReply::Agree { narrative } => {
                let mut response = LocalClassifier::grade(request);
                response.narrative = Some(narrative.clone());
                Ok(response)
            }
            MockReply::Fail(message) => Err(ClassifierError::NetworkError(message.clone())),
        }
    }
}
