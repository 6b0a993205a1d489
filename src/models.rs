use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Languages the analyzer accepts
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Javascript,
    Java,
    Csharp,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Python,
        Language::Javascript,
        Language::Java,
        Language::Csharp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Java => "java",
            Language::Csharp => "csharp",
        }
    }

    /// Human-facing name used in model prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Javascript => "JavaScript",
            Language::Java => "Java",
            Language::Csharp => "C#",
        }
    }
}

/// Error analysis input from API
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_context: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl AnalysisRequest {
    /// Code context, if it carries anything besides whitespace
    pub fn context(&self) -> Option<&str> {
        non_blank(self.code_context.as_deref())
    }

    pub fn project(&self) -> Option<&str> {
        non_blank(self.project_id.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Structured suggestions returned for one error
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnalysisResult {
    pub error_type: String,
    pub solutions: Vec<Solution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_resources: Option<Vec<Resource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
    pub concepts: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Solution {
    pub fix: String,
    pub explanation: String,
    #[serde(default)]
    pub code_example: String,
    #[serde(deserialize_with = "clamped_confidence")]
    pub confidence: f64,
}

fn clamped_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) })
}

/// Learning resource (article, video, tutorial, guide...)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Resource {
    pub resource_type: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Statistics {
    pub frequency: Option<u64>,
    pub last_occurrence: Option<DateTime<Utc>>,
    #[serde(default)]
    pub common_contexts: Vec<String>,
    #[serde(default)]
    pub related_errors: Vec<String>,
}

/// One recorded error occurrence
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Occurrence {
    pub id: String,
    pub project_id: Option<String>,
    pub error_type: String,
    pub error_message: String,
    pub code_context: Option<String>,
    pub language: String,
    pub occurred_at: DateTime<Utc>,
}

/// Dashboard time window
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    #[default]
    Week,
    Month,
    All,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::All => "all",
        }
    }
}

/// Error type statistics
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorCount {
    pub error_type: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResourceRecommendation {
    pub error_type: String,
    pub resources: Vec<Resource>,
}

/// Aggregated view over the error history for one time window
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub window: TimeWindow,
    pub total_errors: u64,
    pub top_errors: Vec<ErrorCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_top_errors: Option<Vec<ErrorCount>>,
    pub recommendations: Vec<ResourceRecommendation>,
}
