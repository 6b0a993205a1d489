use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod analyzer;
mod client;
mod config;
mod context;
mod dashboard;
mod error;
mod history;
mod llm;
mod logging;
mod models;
mod patterns;
mod render;

#[cfg(test)]
mod tests;

use analyzer::Analyzer;
use client::{AnalysisClient, Completion, Composer};
use config::Config;
use dashboard::DashboardAggregator;
use error::AppError;
use history::HistoryStore;
use llm::{GeminiClient, ModelClient};
use models::{AnalysisRequest, AnalysisResult, DashboardSnapshot, Language, TimeWindow};

/// Error analysis gateway.
/// Every analysis is appended to the history store;
/// statistics and dashboards are derived from it.
#[derive(Clone)]
struct AppState {
    analyzer: Arc<Analyzer>,
    dashboard: Arc<DashboardAggregator>,
}

impl AppState {
    fn new(history: Arc<HistoryStore>, model: Option<Arc<dyn ModelClient>>) -> Self {
        Self {
            analyzer: Arc::new(Analyzer::new(history.clone(), model)),
            dashboard: Arc::new(DashboardAggregator::new(history)),
        }
    }
}

#[derive(Parser)]
#[command(name = "error-analyzer-api", version, about = "Explains programming errors and suggests fixes")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (default)
    Serve,
    /// Submit an error message to a running gateway
    Analyze {
        /// Error message as printed by the interpreter
        message: String,
        /// File holding the code around the error
        #[arg(short, long)]
        context_file: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = Language::Python)]
        language: Language,
        #[arg(short, long)]
        project: Option<String>,
        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },
    /// List languages supported by the gateway
    Languages,
    /// Show error counts for a time window
    Dashboard {
        #[arg(short, long, value_enum, default_value_t = TimeWindow::Week)]
        window: TimeWindow,
        #[arg(short, long)]
        project: Option<String>,
        #[arg(long, default_value_t = dashboard::DEFAULT_TOP)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Analyze {
            message,
            context_file,
            language,
            project,
            json,
        } => {
            let code_context = match context_file {
                Some(path) => std::fs::read_to_string(&path)?,
                None => String::new(),
            };
            let mut composer = Composer::default();
            composer.error_message = message;
            composer.code_context = code_context;
            composer.language = language;
            composer.project_id = project.unwrap_or_default();
            analyze(&config, &mut composer, json).await
        }
        Command::Languages => {
            let client = AnalysisClient::new(&config.client)?;
            for language in client.supported_languages().await? {
                println!("{}", language.as_str());
            }
            Ok(())
        }
        Command::Dashboard {
            window,
            project,
            limit,
        } => {
            let client = AnalysisClient::new(&config.client)?;
            let snapshot = client.dashboard(window, project.as_deref(), limit).await?;
            print!("{}", render::render_dashboard(&snapshot));
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let history = Arc::new(HistoryStore::open(&config.server.database_path)?);
    tracing::info!("error history at {}", config.server.database_path.display());

    let model: Option<Arc<dyn ModelClient>> = match GeminiClient::from_config(&config.model)? {
        Some(client) => {
            tracing::info!(model = %config.model.model, "model enrichment enabled");
            Some(Arc::new(client) as Arc<dyn ModelClient>)
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set; serving catalogue analyses with fallback resources");
            None
        }
    };

    let app = build_router(AppState::new(history, model));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn analyze(config: &Config, composer: &mut Composer, json: bool) -> anyhow::Result<()> {
    if !composer.can_submit() {
        anyhow::bail!("error message must not be empty");
    }

    let client = Arc::new(AnalysisClient::new(&config.client)?);
    match composer.submit(client).await? {
        Completion::Applied => {
            if let Some(result) = composer.result() {
                print!("{}", format_result(result, json)?);
            }
            Ok(())
        }
        Completion::Failed | Completion::Stale => {
            let notice = composer.notice().unwrap_or(client::FAILURE_NOTICE);
            eprintln!("{}", notice.red().bold());
            std::process::exit(1);
        }
    }
}

/// What `analyze` prints to stdout; tracing writes to stderr
fn format_result(result: &AnalysisResult, json: bool) -> anyhow::Result<String> {
    if json {
        Ok(format!("{}\n", serde_json::to_string_pretty(result)?))
    } else {
        Ok(render::render(result).to_string())
    }
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/analyze_error", post(analyze_error))
        .route("/supported_languages", get(supported_languages))
        .route("/dashboard", get(get_dashboard))
        .route("/history/:project_id", get(get_history))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn root() -> &'static str {
    "Error Analyzer API v0.1.0"
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "model_configured": state.analyzer.has_model(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Classify an error message and suggest fixes
async fn analyze_error(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    let result = state.analyzer.analyze(&request).await?;
    Ok(Json(result))
}

async fn supported_languages() -> Json<Vec<Language>> {
    Json(Language::ALL.to_vec())
}

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    #[serde(default)]
    window: TimeWindow,
    project_id: Option<String>,
    limit: Option<usize>,
}

/// Aggregate error counts for a time window
async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSnapshot>, AppError> {
    let snapshot = state
        .dashboard
        .snapshot(
            query.window,
            query.project_id,
            query.limit.unwrap_or(dashboard::DEFAULT_TOP),
        )
        .await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// Recent occurrences for one project, newest first
async fn get_history(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = query.limit.unwrap_or(50).min(500);
    let project = project_id.clone();
    let occurrences = state
        .analyzer
        .history()
        .run(move |store| store.project_history(&project, limit))
        .await?;

    Ok(Json(serde_json::json!({
        "project_id": project_id,
        "occurrences": occurrences,
        "count": occurrences.len(),
    })))
}
