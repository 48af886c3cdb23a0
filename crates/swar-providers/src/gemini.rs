//! Google Gemini generateContent classifier.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use swar_core::error::ClassifierError;
use swar_core::traits::{
    build_prompt, parse_reply, AnswerClassifier, ClassifyRequest, ClassifyResponse, SYSTEM_PROMPT,
};

use crate::http::{build_client, check_status, decode, send_error, MAX_TOKENS, TEMPERATURE};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini API classifier. The key travels as a query parameter.
pub struct GeminiClassifier {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiClassifier {
    pub fn new(api_key: &str, model: &str, base_url: Option<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout,
            client: build_client(timeout),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[async_trait]
impl AnswerClassifier for GeminiClassifier {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model, items = request.items.len()))]
    async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, ClassifierError> {
        let body = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: build_prompt(request),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_TOKENS,
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;
        let response = check_status(response, &self.model).await?;
        let api_response: GeminiResponse = decode(response).await?;

        let content = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ClassifierError::MalformedResponse("no candidates in response".into()))?;

        parse_reply(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use swar_core::classifier::{ClassifierAdapter, Source};
    use swar_core::model::{Domain, QuestionKind};
    use swar_core::traits::ClassifyItem;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ClassifyRequest {
        ClassifyRequest {
            domain: Domain::Dyscalculia,
            grade: 3,
            items: vec![ClassifyItem {
                transcript: "twelve".into(),
                expected: "12".into(),
                kind: QuestionKind::Calculation,
                elapsed_ms: 6000,
            }],
        }
    }

    const MODEL_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

    #[tokio::test]
    async fn successful_classification() {
        let server = MockServer::start().await;

        let reply = r#"{"verdicts": [{"is_correct": true, "confidence": 90, "reason": "Number spoken as a word", "mastery": "mastered"}]}"#;
        let response_body = serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": reply}]}}]
        });

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let classifier =
            GeminiClassifier::new("test-key", DEFAULT_MODEL, Some(server.uri()), Duration::from_secs(5));
        let response = classifier.classify(&request()).await.unwrap();
        assert!(response.verdicts[0].is_correct);
        assert_eq!(
            response.verdicts[0].mastery,
            Some(swar_core::validation::Mastery::Mastered)
        );
    }

    #[tokio::test]
    async fn forbidden_key_is_authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({"error": {"message": "API key not valid"}})),
            )
            .mount(&server)
            .await;

        let classifier =
            GeminiClassifier::new("bad-key", DEFAULT_MODEL, Some(server.uri()), Duration::from_secs(5));
        let err = classifier.classify(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "authentication failed: API key not valid");
    }

    #[tokio::test]
    async fn no_candidates_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})))
            .mount(&server)
            .await;

        let classifier =
            GeminiClassifier::new("test-key", DEFAULT_MODEL, Some(server.uri()), Duration::from_secs(5));
        let err = classifier.classify(&request()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_key() {
        let classifier = GeminiClassifier::new(
            "SECRET-KEY-123",
            DEFAULT_MODEL,
            Some("http://127.0.0.1:9".to_string()),
            Duration::from_secs(2),
        );
        let err = classifier.classify(&request()).await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{err}");
    }

    #[tokio::test]
    async fn undecodable_body_does_not_leak_the_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new(
            "SECRET-KEY-123",
            DEFAULT_MODEL,
            Some(server.uri()),
            Duration::from_secs(5),
        );
        let err = classifier.classify(&request()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::MalformedResponse(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{err}");
    }

    #[tokio::test]
    async fn oversized_retry_after_saturates_and_falls_back() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(
                ResponseTemplate::new(429).insert_header("retry-after", "99999999999999999"),
            )
            .mount(&server)
            .await;

        let classifier = Arc::new(GeminiClassifier::new(
            "test-key",
            DEFAULT_MODEL,
            Some(server.uri()),
            Duration::from_secs(5),
        ));
        let err = classifier.classify(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::RateLimited {
                retry_after_ms: u64::MAX
            }
        ));

        let adapter = ClassifierAdapter::new(Some(classifier), Duration::from_secs(5));
        let refinement = adapter.classify(&request()).await;
        assert_eq!(refinement.source, Source::Fallback);
    }
}
