//! Ollama (local model) classifier.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use swar_core::error::ClassifierError;
use swar_core::traits::{
    build_prompt, parse_reply, AnswerClassifier, ClassifyRequest, ClassifyResponse, SYSTEM_PROMPT,
};

use crate::http::{build_client, check_status, decode, send_error, TEMPERATURE};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "mistral";

/// Ollama local classifier. Needs no API key.
pub struct OllamaClassifier {
    model: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaClassifier {
    pub fn new(model: &str, base_url: Option<String>, timeout: Duration) -> Self {
        let base_url = base_url
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            model: model.to_string(),
            base_url,
            timeout,
            client: build_client(timeout),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    format: String,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[async_trait]
impl AnswerClassifier for OllamaClassifier {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model, items = request.items.len()))]
    async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, ClassifierError> {
        let body = OllamaRequest {
            model: self.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: build_prompt(request),
                },
            ],
            stream: false,
            format: "json".to_string(),
            options: OllamaOptions {
                temperature: TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ClassifierError::NetworkError(format!(
                        "Ollama not reachable at {}. Is it running? Start with: ollama serve",
                        self.base_url
                    ))
                } else {
                    send_error(e, self.timeout)
                }
            })?;
        let response = check_status(response, &self.model).await?;
        let api_response: OllamaResponse = decode(response).await?;

        parse_reply(&api_response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swar_core::model::{Domain, QuestionKind};
    use swar_core::traits::ClassifyItem;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ClassifyRequest {
        ClassifyRequest {
            domain: Domain::Dyslexia,
            grade: 2,
            items: vec![ClassifyItem {
                transcript: "the sun is hot".into(),
                expected: "the sun is hot".into(),
                kind: QuestionKind::Sentence,
                elapsed_ms: 4200,
            }],
        }
    }

    #[tokio::test]
    async fn successful_classification() {
        let server = MockServer::start().await;

        let reply = r#"{"verdicts": [{"isCorrect": true, "confidence": 97, "reason": "Read fluently"}]}"#;
        let response_body = serde_json::json!({
            "message": {"role": "assistant", "content": reply},
            "model": "mistral",
            "done": true
        });

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({"stream": false, "format": "json"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let classifier = OllamaClassifier::new(DEFAULT_MODEL, Some(server.uri()), Duration::from_secs(5));
        let response = classifier.classify(&request()).await.unwrap();
        assert!(response.verdicts[0].is_correct);
        assert_eq!(response.verdicts[0].reason, "Read fluently");
    }

    #[tokio::test]
    async fn model_not_pulled() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "model 'llama9' not found"})),
            )
            .mount(&server)
            .await;

        let classifier = OllamaClassifier::new("llama9", Some(server.uri()), Duration::from_secs(5));
        let err = classifier.classify(&request()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::ModelNotFound(ref m) if m == "llama9"));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // Nothing listens on port 9 locally.
        let classifier = OllamaClassifier::new(
            DEFAULT_MODEL,
            Some("http://127.0.0.1:9".into()),
            Duration::from_secs(2),
        );
        let err = classifier.classify(&request()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::NetworkError(_)), "got {err}");
    }

    #[test]
    fn empty_base_url_uses_default() {
        let classifier = OllamaClassifier::new(DEFAULT_MODEL, Some(String::new()), Duration::from_secs(1));
        assert_eq!(classifier.base_url, DEFAULT_BASE_URL);
    }
}
