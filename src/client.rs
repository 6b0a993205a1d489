use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};

use crate::config::ClientConfig;
use crate::models::{AnalysisRequest, AnalysisResult, DashboardSnapshot, Language, TimeWindow};

/// The one notice shown for any failed analysis
pub const FAILURE_NOTICE: &str = "Failed to analyze error. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Status(StatusCode),

    #[error("request was superseded")]
    Cancelled,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ComposerError {
    #[error("error message is empty")]
    EmptyMessage,
}

/// HTTP client for the analysis gateway
pub struct AnalysisClient {
    http: reqwest::Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ClientError> {
        let response = self
            .http
            .post(self.url("/analyze_error"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    pub async fn supported_languages(&self) -> Result<Vec<Language>, ClientError> {
        let response = self.http.get(self.url("/supported_languages")).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    pub async fn dashboard(
        &self,
        window: TimeWindow,
        project_id: Option<&str>,
        limit: usize,
    ) -> Result<DashboardSnapshot, ClientError> {
        let mut query: Vec<(&str, String)> = vec![
            ("window", window.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(project) = project_id.filter(|p| !p.trim().is_empty()) {
            query.push(("project_id", project.to_string()));
        }

        let response = self
            .http
            .get(self.url("/dashboard"))
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}

/// Identifies one submission; only the newest ticket may update the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// New result displayed
    Applied,
    /// Failure notice shown, previous result kept
    Failed,
    /// Superseded by a newer submission and ignored
    Stale,
}

/// A submission running on its own task
pub struct PendingAnalysis {
    ticket: Ticket,
    handle: JoinHandle<Result<AnalysisResult, ClientError>>,
}

impl PendingAnalysis {
    #[cfg(test)]
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub async fn finish(self) -> (Ticket, Result<AnalysisResult, ClientError>) {
        let outcome = match self.handle.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Cancelled),
        };
        (self.ticket, outcome)
    }
}

/// Form state of the error-input screen plus the displayed analysis
#[derive(Debug, Default)]
pub struct Composer {
    pub error_message: String,
    pub code_context: String,
    pub language: Language,
    pub project_id: String,
    result: Option<AnalysisResult>,
    notice: Option<String>,
    generation: u64,
    in_flight: Option<Ticket>,
    abort: Option<AbortHandle>,
}

impl Composer {
    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether the submit trigger is enabled
    pub fn can_submit(&self) -> bool {
        !self.error_message.trim().is_empty() && !self.is_loading()
    }

    pub fn build_request(&self) -> AnalysisRequest {
        let optional = |value: &str| {
            if value.trim().is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        };

        AnalysisRequest {
            error_message: self.error_message.clone(),
            code_context: optional(&self.code_context),
            language: self.language,
            project_id: optional(&self.project_id),
        }
    }

    /// Start a submission. Any earlier submission is superseded.
    pub fn begin_submission(&mut self) -> Result<(Ticket, AnalysisRequest), ComposerError> {
        if self.error_message.trim().is_empty() {
            return Err(ComposerError::EmptyMessage);
        }

        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
        self.generation += 1;
        let ticket = Ticket(self.generation);
        self.in_flight = Some(ticket);
        Ok((ticket, self.build_request()))
    }

    /// Apply the outcome of a submission if it is still the newest one
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<AnalysisResult, ClientError>,
    ) -> Completion {
        if self.in_flight != Some(ticket) {
            tracing::debug!(?ticket, "ignoring stale analysis response");
            return Completion::Stale;
        }
        self.in_flight = None;
        self.abort = None;

        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.notice = None;
                Completion::Applied
            }
            Err(e) => {
                tracing::warn!("analysis request failed: {}", e);
                self.notice = Some(FAILURE_NOTICE.to_string());
                Completion::Failed
            }
        }
    }

    /// Run the submission on a separate task so a newer one can abort it
    pub fn dispatch(&mut self, client: Arc<AnalysisClient>) -> Result<PendingAnalysis, ComposerError> {
        let (ticket, request) = self.begin_submission()?;
        let handle = tokio::spawn(async move { client.analyze(&request).await });
        self.abort = Some(handle.abort_handle());
        Ok(PendingAnalysis { ticket, handle })
    }

    /// One full submit cycle
    pub async fn submit(&mut self, client: Arc<AnalysisClient>) -> Result<Completion, ComposerError> {
        let pending = self.dispatch(client)?;
        let (ticket, outcome) = pending.finish().await;
        Ok(self.complete(ticket, outcome))
    }
}
