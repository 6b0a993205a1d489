use std::sync::Arc;

use crate::context;
use crate::error::AppError;
use crate::history::HistoryStore;
use crate::llm::{self, ModelClient};
use crate::models::{AnalysisRequest, AnalysisResult, Language, Resource, Solution, Statistics};
use crate::patterns;

/// Turns an error message into an `AnalysisResult`.
///
/// Catalogue errors are always answered; the model only adds resources and
/// history insights, and a failing model degrades to canned resources.
/// Errors outside the catalogue need the model to classify them.
pub struct Analyzer {
    history: Arc<HistoryStore>,
    model: Option<Arc<dyn ModelClient>>,
}

impl Analyzer {
    pub fn new(history: Arc<HistoryStore>, model: Option<Arc<dyn ModelClient>>) -> Self {
        Self { history, model }
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AppError> {
        if request.error_message.trim().is_empty() {
            return Err(AppError::Validation(
                "error_message must not be empty".to_string(),
            ));
        }

        let (error_type, solutions, concepts) = match patterns::classify(&request.error_message) {
            Some(pattern) => {
                let mut solutions = pattern.solutions();
                if let Some(code) = request.context() {
                    if let Some(finding) =
                        context::analyze(pattern.error_type(), &request.error_message, code)
                    {
                        tracing::debug!(issue = %finding.issue, "context-specific solution");
                        solutions.insert(0, finding.into_solution(code));
                    }
                }
                (pattern.error_type().to_string(), solutions, pattern.concepts())
            }
            None => self.classify_unknown(request).await?,
        };

        tracing::info!(
            error_type = %error_type,
            solutions = solutions.len(),
            language = request.language.as_str(),
            "analyzed error"
        );
        self.enrich(request, error_type, solutions, concepts).await
    }

    async fn classify_unknown(
        &self,
        request: &AnalysisRequest,
    ) -> Result<(String, Vec<Solution>, Vec<String>), AppError> {
        let Some(model) = self.model.as_deref() else {
            tracing::debug!("no pattern matched and no model configured");
            return Err(AppError::NotRecognized);
        };

        match llm::classify_unknown(model, request).await {
            Ok(analysis) => Ok((analysis.error_type, analysis.solutions, analysis.concepts)),
            Err(e) => {
                tracing::warn!("failed to analyze unknown error: {}", e);
                Err(AppError::NotRecognized)
            }
        }
    }

    async fn enrich(
        &self,
        request: &AnalysisRequest,
        error_type: String,
        solutions: Vec<Solution>,
        concepts: Vec<String>,
    ) -> Result<AnalysisResult, AppError> {
        let record = request.clone();
        let recorded_type = error_type.clone();
        let mut statistics = self
            .history
            .run(move |store| {
                store.record(&record, &recorded_type)?;
                match record.project() {
                    Some(project) => store.project_stats(project, &recorded_type),
                    None => Ok(Statistics::default()),
                }
            })
            .await?;

        let learning_resources = match self.model.as_deref() {
            None => minimal_resources(&error_type),
            Some(model) => {
                let resources =
                    llm::learning_resources(model, &error_type, &concepts, request.language);
                let insights = self.insights(model, request, &error_type, &statistics);
                let (resources, insights) = tokio::join!(resources, insights);

                if let Some(insights) = insights {
                    statistics.common_contexts = insights.common_contexts;
                    statistics.related_errors = insights.related_errors;
                }

                match resources {
                    Ok(resources) if !resources.is_empty() => resources,
                    Ok(_) => fallback_resources(&error_type, &concepts, request.language),
                    Err(e) => {
                        tracing::warn!("error getting learning resources: {}", e);
                        fallback_resources(&error_type, &concepts, request.language)
                    }
                }
            }
        };

        Ok(AnalysisResult {
            error_type,
            solutions,
            learning_resources: Some(learning_resources),
            statistics: Some(statistics),
            concepts,
        })
    }

    /// Model insights once a project has seen the error more than once
    async fn insights(
        &self,
        model: &dyn ModelClient,
        request: &AnalysisRequest,
        error_type: &str,
        statistics: &Statistics,
    ) -> Option<llm::PatternInsights> {
        let project = request.project()?.to_string();
        let frequency = statistics.frequency.unwrap_or(0);
        if frequency <= 1 {
            return None;
        }

        let recent_type = error_type.to_string();
        let recent = self
            .history
            .run(move |store| store.recent(&project, &recent_type, llm::INSIGHT_HISTORY));
        let history = match recent.await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("error reading history for insights: {}", e);
                return None;
            }
        };

        match llm::pattern_insights(model, error_type, request.language, &history, frequency).await {
            Ok(insights) => Some(insights),
            Err(e) => {
                tracing::warn!("error analyzing patterns: {}", e);
                None
            }
        }
    }
}

/// Served when no model is configured
pub fn minimal_resources(error_type: &str) -> Vec<Resource> {
    vec![Resource {
        resource_type: "guide".to_string(),
        title: format!("Understanding {}", error_type),
        description: format!("Learn about common {} issues", error_type),
        url: None,
    }]
}

/// Served when the model fails to suggest resources
pub fn fallback_resources(error_type: &str, concepts: &[String], language: Language) -> Vec<Resource> {
    let topic = concepts.first().map(String::as_str).unwrap_or("errors");
    vec![
        Resource {
            resource_type: "article".to_string(),
            title: format!("Understanding {} in {}", error_type, language.display_name()),
            description: format!("Learn how to debug and prevent {} errors", error_type),
            url: None,
        },
        Resource {
            resource_type: "tutorial".to_string(),
            title: format!("Common causes of {}", error_type),
            description: format!(
                "Explore the most frequent mistakes that lead to {}",
                error_type
            ),
            url: None,
        },
        Resource {
            resource_type: "guide".to_string(),
            title: format!("Best practices to avoid {}", topic),
            description: "Preventive techniques for writing more robust code".to_string(),
            url: None,
        },
    ]
}
