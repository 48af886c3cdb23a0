//! HTTP plumbing shared by the remote classifiers.

use std::time::Duration;

use swar_core::error::ClassifierError;

/// Sampling temperature for grading requests.
pub(crate) const TEMPERATURE: f64 = 0.3;
/// Upper bound on reply length.
pub(crate) const MAX_TOKENS: u32 = 1000;

pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("failed to build HTTP client")
}

/// Map a transport failure.
///
/// The URL is stripped first: some providers carry the API key in the query.
pub(crate) fn send_error(e: reqwest::Error, timeout: Duration) -> ClassifierError {
    if e.is_timeout() {
        ClassifierError::Timeout(timeout.as_millis() as u64)
    } else {
        ClassifierError::NetworkError(e.without_url().to_string())
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"error": {"message": ..}}` and `{"error": ".."}`; anything
/// else is returned verbatim.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    match &value["error"] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(o) => o
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        _ => body.to_string(),
    }
}

/// Turn non-success statuses into typed errors.
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response, ClassifierError> {
    let status = response.status().as_u16();
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5)
            .saturating_mul(1000);
        return Err(ClassifierError::RateLimited {
            retry_after_ms: retry_after,
        });
    }
    if status == 401 || status == 403 {
        let body = response.text().await.unwrap_or_default();
        return Err(ClassifierError::AuthenticationFailed(error_message(&body)));
    }
    if status == 404 {
        return Err(ClassifierError::ModelNotFound(model.to_string()));
    }
    if status >= 400 {
        let body = response.text().await.unwrap_or_default();
        return Err(ClassifierError::ApiError {
            status,
            message: error_message(&body),
        });
    }
    Ok(response)
}

/// Decode a success body into the provider's response type.
pub(crate) async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClassifierError> {
    response
        .json()
        .await
        .map_err(|e| {
            ClassifierError::MalformedResponse(format!("failed to parse response: {}", e.without_url()))
        })
}
