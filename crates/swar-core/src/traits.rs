//! The external answer classifier seam.
//!
//! Remote classifiers (implemented in `swar-providers`) and the local
//! fallback all implement [`AnswerClassifier`]. Callers never use one
//! directly; they go through [`crate::classifier::ClassifierAdapter`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::model::{Domain, QuestionKind};
use crate::validation::Mastery;

// ---------------------------------------------------------------------------
// Classifier trait
// ---------------------------------------------------------------------------

/// A backend that grades a batch of responses.
#[async_trait]
pub trait AnswerClassifier: Send + Sync {
    /// Provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// Model identifier, if the backend has one.
    fn model(&self) -> &str {
        ""
    }

    /// Grade every item of the request, in order.
    async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, ClassifierError>;
}

/// One response to grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyItem {
    pub transcript: String,
    pub expected: String,
    pub kind: QuestionKind,
    pub elapsed_ms: u64,
}

/// A batch of responses from one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub domain: Domain,
    pub grade: u8,
    pub items: Vec<ClassifyItem>,
}

/// Validator-shaped verdict with optional enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistedVerdict {
    #[serde(alias = "isCorrect")]
    pub is_correct: bool,
    /// 0 to 100 once it has passed through the adapter.
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default, alias = "semanticScore", skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f64>,
    #[serde(default, alias = "conceptualMastery", skip_serializing_if = "Option::is_none")]
    pub mastery: Option<Mastery>,
    #[serde(default, alias = "suggestedFeedback", skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// A classifier's free-form view of the session as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDiagnostic {
    #[serde(default, alias = "strongAreas")]
    pub strong_areas: Vec<String>,
    #[serde(default, alias = "weakAreas")]
    pub weak_areas: Vec<String>,
    #[serde(default, alias = "riskIndicators")]
    pub risk_indicators: Vec<String>,
    #[serde(default, alias = "recommendedIntervention", skip_serializing_if = "Option::is_none")]
    pub recommended_intervention: Option<String>,
    #[serde(default, alias = "followUpSuggestions")]
    pub follow_up: Vec<String>,
}

/// What a classifier returns for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub verdicts: Vec<AssistedVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
    #[serde(default, alias = "diagnosticSummary", skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<SessionDiagnostic>,
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// System prompt shared by all remote classifiers.
pub const SYSTEM_PROMPT: &str = "You are an assessment assistant for a speech-first screening tool for dyslexia and dyscalculia. \
Students answer aloud and their answers arrive as speech-to-text transcripts, so minor transcription errors can still show understanding. \
Judge each answer for semantic correctness against the expected answer, be encouraging but honest, and always respond with a single valid JSON object.";

/// Build the user prompt for a batch.
pub fn build_prompt(request: &ClassifyRequest) -> String {
    let mut prompt = format!(
        "Grade these {} responses from a grade {} {} screening session.\n\n",
        request.items.len(),
        request.grade,
        request.domain
    );
    for (i, item) in request.items.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. type: {}; expected: \"{}\"; student said: \"{}\"; time: {}ms\n",
            i + 1,
            item.kind,
            item.expected,
            item.transcript,
            item.elapsed_ms
        ));
    }
    prompt.push_str(
        "\nRespond with JSON of this shape, one verdict per response in the same order:\n\
{\n  \"verdicts\": [\n    {\n      \"is_correct\": boolean,\n      \"confidence\": number (0-100),\n      \"reason\": string,\n      \"semantic_score\": number (0-100),\n      \"mastery\": \"mastered\" | \"developing\" | \"emerging\" | \"needs_help\",\n      \"feedback\": string\n    }\n  ],\n  \"narrative\": string,\n  \"flagged\": boolean,\n  \"diagnostic\": {\n    \"strong_areas\": [string],\n    \"weak_areas\": [string],\n    \"risk_indicators\": [string],\n    \"recommended_intervention\": string,\n    \"follow_up\": [string]\n  }\n}",
    );
    prompt
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// Extract the JSON object from a model reply.
///
/// Handles:
/// - ```json``` blocks (preferred) or generic ``` blocks
/// - A bare object surrounded by prose (outermost `{` to last `}`)
pub fn extract_json_object(response: &str) -> Option<&str> {
    let mut json_block = None;
    let mut generic_block = None;
    let mut block_start: Option<(usize, String)> = None;
    let mut offset = 0;

    for line in response.split_inclusive('\n') {
        let trimmed = line.trim();
        match &block_start {
            None if trimmed.starts_with("```") => {
                let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
                block_start = Some((offset + line.len(), lang));
            }
            Some((start, lang)) if trimmed == "```" => {
                let block = &response[*start..offset];
                if lang == "json" && json_block.is_none() {
                    json_block = Some(block);
                } else if lang.is_empty() && generic_block.is_none() {
                    generic_block = Some(block);
                }
                block_start = None;
            }
            _ => {}
        }
        offset += line.len();
    }

    let candidate = json_block.or(generic_block).unwrap_or(response);
    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    (start < end).then(|| &candidate[start..=end])
}

/// Parse a model reply into a [`ClassifyResponse`].
pub fn parse_reply(response: &str) -> Result<ClassifyResponse, ClassifierError> {
    let json = extract_json_object(response).ok_or_else(|| {
        ClassifierError::MalformedResponse("no JSON object in classifier reply".to_string())
    })?;
    serde_json::from_str(json).map_err(|e| ClassifierError::MalformedResponse(e.to_string()))
}
