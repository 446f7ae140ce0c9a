//! CLI output formatting

use crate::core::{ExecutionStatus, StepState};
use crate::execution::{ExecutionEvent, StepTrace};
use crate::logging::{LogEntry, LogLevel};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Completed { .. } => style("COMPLETED").green().to_string(),
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::Skipped { reason } => style(format!("SKIPPED ({})", reason)).dim().to_string(),
        StepState::Aborted => style("ABORTED").yellow().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// One line per traced step, nested calls indented by depth
pub fn format_trace(steps: &[StepTrace]) -> String {
    steps
        .iter()
        .map(|step| {
            format!(
                "{}{}. {} {} {}",
                "  ".repeat(step.depth),
                step.index + 1,
                style(&step.label).bold(),
                style(&step.brick_id).dim(),
                format_step_state(&step.state)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            run_number,
            mod_id,
            component_id,
            total_steps,
        } => {
            let name = match (mod_id, component_id) {
                (Some(mod_id), Some(component)) => format!("{} / {}", mod_id, component),
                (Some(mod_id), None) => mod_id.clone(),
                _ => "pipeline".to_string(),
            };
            format!(
                "{} Starting {} run #{} ({}, {} steps)",
                ROCKET,
                style(name).bold(),
                run_number,
                style(short_id(run_id)).dim(),
                total_steps
            )
        }
        ExecutionEvent::StepStarted { depth, label, .. } => {
            format!("{}{} {}", indent(*depth), SPINNER, style(label).cyan())
        }
        ExecutionEvent::StepSkipped {
            depth,
            brick_id,
            reason,
            ..
        } => format!(
            "{}{} {} ({})",
            indent(*depth),
            SKIP,
            style(brick_id).dim(),
            reason
        ),
        ExecutionEvent::StepCompleted { depth, brick_id, .. } => {
            format!("{}{} {}", indent(*depth), CHECK, style(brick_id).green())
        }
        ExecutionEvent::StepFailed {
            depth,
            label,
            error,
            continued,
            ..
        } => {
            if *continued {
                format!(
                    "{}{} {}: {} (continuing)",
                    indent(*depth),
                    WARN,
                    style(label).yellow(),
                    style(error).dim()
                )
            } else {
                format!("{}{} {}: {}", indent(*depth), CROSS, style(label).red(), style(error).dim())
            }
        }
        ExecutionEvent::RunAborted { run_id, index } => format!(
            "{} Run ({}) aborted at step {}",
            WARN,
            style(short_id(run_id)).dim(),
            index + 1
        ),
        ExecutionEvent::RunCompleted { run_id, status } => format!(
            "{} Run ({}) {}",
            INFO,
            style(short_id(run_id)).dim(),
            format_status(*status)
        ),
    }
}

/// Format a log entry a brick recorded
pub fn format_log_entry(entry: &LogEntry) -> String {
    let level = match entry.level {
        LogLevel::Debug => style("DEBUG").dim().to_string(),
        LogLevel::Info => style("INFO").cyan().to_string(),
        LogLevel::Warn => style("WARN").yellow().to_string(),
        LogLevel::Error => style("ERROR").red().to_string(),
    };
    let source = entry.context.brick_id.as_deref().unwrap_or("runtime");
    match &entry.data {
        Some(data) => format!("{} [{}] {} {}", level, style(source).dim(), entry.message, data),
        None => format!("{} [{}] {}", level, style(source).dim(), entry.message),
    }
}

/// Pretty-print a run result, truncated to `max_lines`
pub fn format_result(result: &Value, max_lines: usize) -> String {
    let rendered = match result {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    format_output(&rendered, max_lines)
}

/// Format output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
