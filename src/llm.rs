use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ModelConfig;
use crate::models::{AnalysisRequest, Language, Occurrence, Resource, Solution};

/// Number of learning resources requested from the model
pub const RESOURCE_COUNT: usize = 3;
/// Occurrences sent to the model when asking for pattern insights
pub const INSIGHT_HISTORY: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid API key header")]
    InvalidKey,

    #[error("model returned no text")]
    EmptyResponse,

    #[error("could not parse model output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Text-in, text-out generative model
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Gemini `generateContent` over REST
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig, api_key: &str) -> Result<Self, ModelError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).map_err(|_| ModelError::InvalidKey)?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.api_url.trim_end_matches('/'),
                config.model
            ),
        })
    }

    /// Build a client when an API key is configured
    pub fn from_config(config: &ModelConfig) -> Result<Option<Self>, ModelError> {
        match config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Self::new(config, key).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": prompt }]
                }]
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Strip a ```json (or bare ```) fence around model output
pub fn extract_json(content: &str) -> &str {
    let body = if let Some((_, rest)) = content.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = content.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        content
    };
    body.trim()
}

async fn generate_json<T>(model: &dyn ModelClient, prompt: &str) -> Result<T, ModelError>
where
    T: for<'de> Deserialize<'de>,
{
    let content = model.generate(prompt).await?;
    Ok(serde_json::from_str(extract_json(&content))?)
}

/// Ask for beginner-friendly resources about the error
pub async fn learning_resources(
    model: &dyn ModelClient,
    error_type: &str,
    concepts: &[String],
    language: Language,
) -> Result<Vec<Resource>, ModelError> {
    let prompt = format!(
        "As a programming educator, recommend THREE specific learning resources for someone who encountered \
         a {error_type} error in {language}. The error involves these concepts: {concepts}.\n\n\
         For each resource, provide:\n\
         1. A descriptive title\n\
         2. A brief description of what they'll learn\n\
         3. The type of resource (article, video, tutorial, etc.)\n\n\
         Format as JSON with structure:\n\
         [\n  {{\"title\": \"Resource title\", \"description\": \"Brief description\", \"resource_type\": \"article/video/tutorial/etc\"}}\n]\n\n\
         Focus on high-quality, beginner-friendly resources that specifically address common mistakes.",
        language = language.display_name(),
        concepts = concepts.join(", "),
    );

    let mut resources: Vec<Resource> = generate_json(model, &prompt).await?;
    resources.truncate(RESOURCE_COUNT);
    Ok(resources)
}

#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct PatternInsights {
    #[serde(default)]
    pub common_contexts: Vec<String>,
    #[serde(default)]
    pub related_errors: Vec<String>,
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    timestamp: String,
    error_message: &'a str,
    code_context: Option<&'a str>,
}

/// Ask what the recorded occurrences of one error type have in common.
/// `total` is the project's full count; only the newest entries are sent.
pub async fn pattern_insights(
    model: &dyn ModelClient,
    error_type: &str,
    language: Language,
    history: &[Occurrence],
    total: u64,
) -> Result<PatternInsights, ModelError> {
    let start = history.len().saturating_sub(INSIGHT_HISTORY);
    let entries: Vec<HistoryEntry> = history[start..]
        .iter()
        .map(|o| HistoryEntry {
            timestamp: o.occurred_at.to_rfc3339(),
            error_message: &o.error_message,
            code_context: o.code_context.as_deref(),
        })
        .collect();

    let prompt = format!(
        "Analyze these {total} instances of {error_type} errors in a {language} project.\n\n\
         Error history:\n{history}\n\n\
         Based on these patterns, answer in JSON format:\n\
         {{\n  \"common_contexts\": [list of 2-3 coding patterns or contexts where this error occurs most frequently],\n  \
         \"related_errors\": [list of 2-3 other error types that might occur in similar situations]\n}}\n\n\
         Be specific about the patterns you observe.",
        language = language.display_name(),
        history = serde_json::to_string(&entries)?,
    );

    generate_json(model, &prompt).await
}

fn unknown_error_type() -> String {
    "Unknown Error".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UnknownErrorAnalysis {
    #[serde(default = "unknown_error_type")]
    pub error_type: String,
    #[serde(default)]
    pub solutions: Vec<Solution>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

/// Classify an error the catalogue does not know
pub async fn classify_unknown(
    model: &dyn ModelClient,
    request: &AnalysisRequest,
) -> Result<UnknownErrorAnalysis, ModelError> {
    let context = request
        .context()
        .map(|c| format!("Code context: {}\n", c))
        .unwrap_or_default();

    let prompt = format!(
        "Analyze this {language} error message that doesn't match our standard patterns:\n\n\
         Error message: {message}\n\n\
         {context}\n\
         Provide a JSON response with:\n\
         {{\n  \"error_type\": \"The likely error type\",\n  \"solutions\": [\n    {{\n      \
         \"fix\": \"Suggested fix\",\n      \"explanation\": \"Why this error happens\",\n      \
         \"confidence\": 0.7,\n      \"code_example\": \"Example code showing the fix\"\n    }}\n  ],\n  \
         \"concepts\": [\"concept1\", \"concept2\"]\n}}",
        language = request.language.display_name(),
        message = request.error_message,
    );

    generate_json(model, &prompt).await
}
