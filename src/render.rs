//! Display mapping for analysis results.
//!
//! `render` builds the sections shown to the user; `Display` turns them into
//! colored terminal output.

use colored::Colorize;
use std::fmt;

use crate::models::{AnalysisResult, DashboardSnapshot, Resource, Statistics};

const BAR_WIDTH: usize = 20;

/// Confidence in [0, 1] as a whole percentage
pub fn confidence_percent(confidence: f64) -> u8 {
    if confidence.is_nan() {
        return 0;
    }
    (confidence * 100.0).round().clamp(0.0, 100.0) as u8
}

fn bar(percent: u8, width: usize) -> String {
    let filled = (percent as usize * width + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolutionBlock {
    pub number: usize,
    pub fix: String,
    pub explanation: String,
    pub code: String,
    pub percent: u8,
    pub label: String,
    pub bar: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsBlock {
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAnalysis {
    pub badge: String,
    pub solutions: Vec<SolutionBlock>,
    pub resources: Option<Vec<Resource>>,
    pub statistics: Option<StatisticsBlock>,
    pub concepts: Vec<String>,
}

pub fn render(result: &AnalysisResult) -> RenderedAnalysis {
    let solutions = result
        .solutions
        .iter()
        .enumerate()
        .map(|(idx, solution)| {
            let percent = confidence_percent(solution.confidence);
            SolutionBlock {
                number: idx + 1,
                fix: solution.fix.clone(),
                explanation: solution.explanation.clone(),
                code: solution.code_example.trim().to_string(),
                percent,
                label: format!("{}%", percent),
                bar: bar(percent, BAR_WIDTH),
            }
        })
        .collect();

    RenderedAnalysis {
        badge: result.error_type.clone(),
        solutions,
        resources: result.learning_resources.clone(),
        statistics: result.statistics.as_ref().map(statistics_block),
        concepts: result.concepts.clone(),
    }
}

fn statistics_block(stats: &Statistics) -> StatisticsBlock {
    let mut lines = Vec::new();
    if let Some(frequency) = stats.frequency {
        lines.push(format!("Seen {} time(s) in this project", frequency));
    }
    if let Some(last) = stats.last_occurrence {
        lines.push(format!("Previously seen {}", last.format("%Y-%m-%d %H:%M UTC")));
    }
    if !stats.common_contexts.is_empty() {
        lines.push(format!("Common contexts: {}", stats.common_contexts.join("; ")));
    }
    if !stats.related_errors.is_empty() {
        lines.push(format!("Related errors: {}", stats.related_errors.join(", ")));
    }
    if lines.is_empty() {
        lines.push("No history for this error yet".to_string());
    }
    StatisticsBlock { lines }
}

impl fmt::Display for RenderedAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", format!(" {} ", self.badge).on_red().white().bold())?;
        writeln!(f)?;

        writeln!(f, "{}", "Solutions".bold().underline())?;
        for block in &self.solutions {
            writeln!(f, "{}. {}", block.number, block.fix.green().bold())?;
            writeln!(f, "   {}", block.explanation)?;
            if !block.code.is_empty() {
                for line in block.code.lines() {
                    writeln!(f, "   {}", line.cyan())?;
                }
            }
            writeln!(f, "   Confidence {} {}", block.bar.yellow(), block.label)?;
            writeln!(f)?;
        }

        if let Some(resources) = &self.resources {
            writeln!(f, "{}", "Learning resources".bold().underline())?;
            for resource in resources {
                write!(f, "- [{}] {}", resource.resource_type, resource.title.bold())?;
                if let Some(url) = &resource.url {
                    write!(f, " <{}>", url.blue())?;
                }
                writeln!(f)?;
                writeln!(f, "  {}", resource.description.dimmed())?;
            }
            writeln!(f)?;
        }

        if let Some(stats) = &self.statistics {
            writeln!(f, "{}", "Statistics".bold().underline())?;
            for line in &stats.lines {
                writeln!(f, "  {}", line)?;
            }
            writeln!(f)?;
        }

        if !self.concepts.is_empty() {
            let tags: Vec<String> = self.concepts.iter().map(|c| format!("#{}", c)).collect();
            writeln!(f, "{} {}", "Concepts:".bold(), tags.join(" ").magenta())?;
        }
        Ok(())
    }
}

/// Plain table for the dashboard subcommand
pub fn render_dashboard(snapshot: &DashboardSnapshot) -> String {
    let mut out = format!(
        "{} ({}): {} error(s)\n",
        "Dashboard".bold(),
        snapshot.window.as_str(),
        snapshot.total_errors
    );

    let mut section = |title: &str, counts: &[crate::models::ErrorCount]| {
        out.push_str(&format!("\n{}\n", title.bold().underline()));
        if counts.is_empty() {
            out.push_str("  (no errors)\n");
        }
        for count in counts {
            out.push_str(&format!(
                "  {:<20} {:>5} {:>6.1}%\n",
                count.error_type, count.count, count.percentage
            ));
        }
    };

    section("Top errors", &snapshot.top_errors);
    if let Some(project) = &snapshot.project_top_errors {
        section("Project top errors", project);
    }

    if !snapshot.recommendations.is_empty() {
        out.push_str(&format!("\n{}\n", "Recommended reading".bold().underline()));
        for rec in &snapshot.recommendations {
            for resource in &rec.resources {
                out.push_str(&format!("  {}: {}", rec.error_type, resource.title));
                if let Some(url) = &resource.url {
                    out.push_str(&format!(" <{}>", url));
                }
                out.push('\n');
            }
        }
    }
    out
}
