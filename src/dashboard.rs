use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::error::AppError;
use crate::history::{self, HistoryStore};
use crate::models::{DashboardSnapshot, ErrorCount, Resource, ResourceRecommendation, TimeWindow};
use crate::patterns;

pub const DEFAULT_TOP: usize = 5;
pub const MAX_TOP: usize = 50;

impl TimeWindow {
    /// Start of the window relative to `now`; `None` for all time
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeWindow::Day => Some(now - Duration::days(1)),
            TimeWindow::Week => Some(now - Duration::weeks(1)),
            TimeWindow::Month => Some(now - Duration::days(30)),
            TimeWindow::All => None,
        }
    }
}

/// Aggregates the error history into dashboard snapshots
pub struct DashboardAggregator {
    history: Arc<HistoryStore>,
}

impl DashboardAggregator {
    pub fn new(history: Arc<HistoryStore>) -> Self {
        Self { history }
    }

    pub async fn snapshot(
        self: &Arc<Self>,
        window: TimeWindow,
        project_id: Option<String>,
        top: usize,
    ) -> Result<DashboardSnapshot, AppError> {
        let aggregator = Arc::clone(self);
        history::blocking(move || {
            aggregator.snapshot_at(window, project_id.as_deref(), top, Utc::now())
        })
        .await
    }

    pub fn snapshot_at(
        &self,
        window: TimeWindow,
        project_id: Option<&str>,
        top: usize,
        now: DateTime<Utc>,
    ) -> Result<DashboardSnapshot, AppError> {
        let since = window.since(now);
        let top = top.clamp(1, MAX_TOP);

        let global = self.history.counts_since(since, None)?;
        let total_errors: u64 = global.iter().map(|(_, count)| count).sum();
        let top_errors = top_counts(global, top);

        let project_top_errors = match project_id.filter(|p| !p.trim().is_empty()) {
            Some(project) => Some(top_counts(self.history.counts_since(since, Some(project))?, top)),
            None => None,
        };

        let recommendations = top_errors
            .iter()
            .map(|count| recommend(&count.error_type))
            .collect();

        Ok(DashboardSnapshot {
            window,
            total_errors,
            top_errors,
            project_top_errors,
            recommendations,
        })
    }
}

/// Share of each error type within the window, rounded to one decimal
fn top_counts(counts: Vec<(String, u64)>, top: usize) -> Vec<ErrorCount> {
    let total: u64 = counts.iter().map(|(_, count)| count).sum();

    let mut errors: Vec<ErrorCount> = counts
        .into_iter()
        .map(|(error_type, count)| ErrorCount {
            error_type,
            count,
            percentage: if total > 0 {
                ((count as f64 / total as f64) * 1000.0).round() / 10.0
            } else {
                0.0
            },
        })
        .collect();

    errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.error_type.cmp(&b.error_type)));
    errors.truncate(top);
    errors
}

fn recommend(error_type: &str) -> ResourceRecommendation {
    let mut resources: Vec<Resource> = Vec::new();
    match patterns::find(error_type) {
        Some(pattern) => {
            resources.push(pattern.documentation());
            if let Some(concept) = pattern.concepts().first() {
                resources.push(Resource {
                    resource_type: "guide".to_string(),
                    title: format!("Mastering {}", concept),
                    description: format!(
                        "Practice exercises on {} to prevent {}",
                        concept, error_type
                    ),
                    url: None,
                });
            }
        }
        None => resources.push(patterns::generic_docs()),
    }

    ResourceRecommendation {
        error_type: error_type.to_string(),
        resources,
    }
}
