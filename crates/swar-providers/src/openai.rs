//! OpenAI-compatible chat completions classifier.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use swar_core::error::ClassifierError;
use swar_core::traits::{
    build_prompt, parse_reply, AnswerClassifier, ClassifyRequest, ClassifyResponse, SYSTEM_PROMPT,
};

use crate::http::{build_client, check_status, decode, send_error, MAX_TOKENS, TEMPERATURE};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible API classifier.
pub struct OpenAiClassifier {
    api_key: String,
    model: String,
    base_url: String,
    org_id: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiClassifier {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: Option<String>,
        org_id: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            org_id,
            timeout,
            client: build_client(timeout),
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<OpenAiMessage>,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AnswerClassifier for OpenAiClassifier {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model, items = request.items.len()))]
    async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, ClassifierError> {
        let body = OpenAiRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: build_prompt(request),
                },
            ],
        };

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json");

        if let Some(org) = &self.org_id {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;
        let response = check_status(response, &self.model).await?;
        let api_response: OpenAiResponse = decode(response).await?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifierError::MalformedResponse("no choices in response".into()))?;

        parse_reply(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swar_core::model::{Domain, QuestionKind};
    use swar_core::traits::ClassifyItem;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ClassifyRequest {
        ClassifyRequest {
            domain: Domain::Dyscalculia,
            grade: 2,
            items: vec![ClassifyItem {
                transcript: "it is five".into(),
                expected: "5".into(),
                kind: QuestionKind::Calculation,
                elapsed_ms: 4000,
            }],
        }
    }

    fn classifier(server: &MockServer) -> OpenAiClassifier {
        OpenAiClassifier::new("test-key", DEFAULT_MODEL, Some(server.uri()), None, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn successful_classification() {
        let server = MockServer::start().await;

        let reply = r#"```json
{"verdicts": [{"is_correct": true, "confidence": 88, "reason": "Said the number as a word", "mastery": "developing"}], "flagged": false}
```"#;
        let response_body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}],
            "model": "gpt-4o-mini"
        });

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let response = classifier(&server).classify(&request()).await.unwrap();
        assert_eq!(response.verdicts.len(), 1);
        assert!(response.verdicts[0].is_correct);
        assert_eq!(response.verdicts[0].confidence, 88.0);
        assert_eq!(response.flagged, Some(false));
    }

    #[tokio::test]
    async fn api_error_message_is_extracted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"error": {"message": "server overloaded"}})),
            )
            .mount(&server)
            .await;

        let err = classifier(&server).classify(&request()).await.unwrap_err();
        match err {
            ClassifierError::ApiError { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "server overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn reply_without_json_is_malformed() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "choices": [{"message": {"content": "I'm not able to grade this."}}]
        });
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let err = classifier(&server).classify(&request()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn empty_choices_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = classifier(&server).classify(&request()).await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"choices": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let classifier = OpenAiClassifier::new(
            "test-key",
            DEFAULT_MODEL,
            Some(server.uri()),
            None,
            Duration::from_millis(50),
        );
        let err = classifier.classify(&request()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Timeout(50)), "got {err}");
    }
}
