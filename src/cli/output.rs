//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::planner::{ActionType, ExecutionResult, PlanChangeset, SyncPlan};
use crate::state::{EditSession, LockInfo};
use crate::sync::{RemoteStatus, SessionStatus};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Per-level change row for table display.
#[derive(Tabled)]
struct LevelRow {
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Added")]
    added: String,
    #[tabled(rename = "Deleted")]
    deleted: String,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "After")]
    after: String,
}

/// Execution result row for table display.
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Backend ID")]
    backend_id: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a changeset.
    #[must_use]
    pub fn format_changeset(&self, changeset: &PlanChangeset) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(changeset).unwrap_or_default(),
            OutputFormat::Text => Self::format_changeset_text(changeset),
        }
    }

    fn format_changeset_text(changeset: &PlanChangeset) -> String {
        if changeset.is_empty() {
            return format!("{} No pending changes.\n", "✓".green());
        }

        let mut output = String::new();
        let _ = write!(output, "\nChanges to plan {}\n\n", changeset.plan_id);

        let rows: Vec<LevelRow> = changeset
            .summary()
            .iter()
            .map(|s| LevelRow {
                level: s.level.to_string(),
                added: Self::count(s.added, "+").green().to_string(),
                deleted: Self::count(s.deleted, "-").red().to_string(),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        for payload in changeset.added_payloads() {
            let _ = writeln!(
                output,
                "   {} {} {} (under {})",
                "+".green(),
                payload.level(),
                payload.id(),
                payload.parent_id()
            );
        }
        for summary in changeset.summary() {
            for id in changeset.deleted(summary.level) {
                let _ = writeln!(output, "   {} {} {id}", "-".red(), summary.level);
            }
        }

        let _ = write!(
            output,
            "\n{} added, {} deleted\n",
            changeset.added_count().to_string().green(),
            changeset.deleted_count().to_string().red()
        );

        output
    }

    /// Formats a sync plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &SyncPlan) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    fn format_plan_text(plan: &SyncPlan) -> String {
        if plan.is_empty() {
            return format!(
                "{} No changes required - the backend is up to date.\n",
                "✓".green()
            );
        }

        let mut output = String::new();
        let _ = write!(output, "\nSync plan for {}\n\n", plan.plan_id);

        let rows: Vec<PlanActionRow> = plan
            .actions
            .iter()
            .enumerate()
            .map(|(i, a)| PlanActionRow {
                index: i + 1,
                action: Self::format_action_type(a.action_type),
                level: a.level.to_string(),
                entity: a.entity_id.clone(),
                after: a
                    .dependencies
                    .iter()
                    .map(|d| (d + 1).to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to delete",
            plan.create_count().to_string().green(),
            plan.delete_count().to_string().red()
        );
        if plan.pruned_deletes > 0 {
            let _ = write!(
                output,
                " ({} covered by a parent delete)",
                plan.pruned_deletes
            );
        }
        output.push('\n');

        if !plan.passes_guardrails {
            let _ = write!(output, "\n{} Guardrail violations:\n", "⚠".yellow());
            for violation in &plan.guardrail_violations {
                let _ = writeln!(output, "   - {violation}");
            }
        }

        output
    }

    /// Formats the outcome of a push.
    #[must_use]
    pub fn format_execution(&self, result: &ExecutionResult) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&ExecutionJson::from(result)).unwrap_or_default()
            }
            OutputFormat::Text => {
                let status = if result.all_successful() {
                    format!("{} Push successful", "✓".green())
                } else {
                    format!("{} Push incomplete", "✗".red())
                };

                let mut output = format!("{status}\n\n");
                let rows: Vec<ResultRow> = result
                    .results
                    .iter()
                    .map(|r| ResultRow {
                        index: r.index + 1,
                        action: r.action.description(),
                        result: if r.success {
                            "ok".green().to_string()
                        } else {
                            r.error.clone().unwrap_or_default().red().to_string()
                        },
                        backend_id: r.backend_id.clone().unwrap_or_default(),
                    })
                    .collect();
                if !rows.is_empty() {
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                let _ = write!(output, "\n{result}\n");
                output
            }
        }
    }

    /// Formats the local session status.
    #[must_use]
    pub fn format_status(&self, status: &SessionStatus) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&StatusJson::from(status)).unwrap_or_default()
            }
            OutputFormat::Text => {
                let session = &status.session;
                let mut output = String::new();

                let _ = write!(
                    output,
                    "\nPlan: {} ({})\n\n",
                    session.working.title, session.plan_id
                );
                let _ = writeln!(
                    output,
                    "   Checked out: {}",
                    session.checked_out_at.format("%Y-%m-%d %H:%M")
                );
                let last_synced = session.last_synced_at.map_or_else(
                    || String::from("never"),
                    |t| t.format("%Y-%m-%d %H:%M").to_string(),
                );
                let _ = writeln!(output, "   Last push: {last_synced}");
                if let Some(lock) = &status.lock {
                    let _ = writeln!(output, "   {} {lock}", "Locked:".yellow());
                }
                output.push('\n');
                output.push_str(&Self::format_changeset_text(&status.changeset));

                output
            }
        }
    }

    /// Formats the result of a remote staleness check.
    #[must_use]
    pub fn format_remote(&self, remote: &RemoteStatus) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(remote).unwrap_or_default(),
            OutputFormat::Text => {
                if remote.stale {
                    format!(
                        "{} Plan {} changed on the backend since checkout. \
                         Pushing may fail on entities removed remotely.\n",
                        "⚠".yellow(),
                        remote.plan_id
                    )
                } else {
                    format!("{} Baseline matches the backend.\n", "✓".green())
                }
            }
        }
    }

    /// Formats the stored session.
    #[must_use]
    pub fn format_state(&self, session: &EditSession, lock: Option<&LockInfo>) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "session": session, "lock": lock });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = write!(output, "\nSession: {}\n\n", session.plan_id);

                let _ = writeln!(output, "   Version: {}", session.version);
                let _ = writeln!(
                    output,
                    "   Baseline hash: {}",
                    &session.baseline_hash[..8.min(session.baseline_hash.len())]
                );
                let _ = writeln!(output, "   Next temporary id: {}", session.next_temp_id);
                let [weeks, days, sessions, exercises, sets] = session.working.entity_counts();
                let _ = writeln!(
                    output,
                    "   Working: {weeks} weeks, {days} days, {sessions} sessions, \
                     {exercises} exercises, {sets} sets"
                );
                let _ = writeln!(
                    output,
                    "   Unpushed edits: {}",
                    if session.is_dirty() { "yes" } else { "no" }
                );
                if let Some(lock) = lock {
                    let _ = writeln!(output, "   Lock: {lock}");
                }

                if !session.history.is_empty() {
                    let _ = writeln!(output, "\n   Recent history ({}):", session.history.len());
                    for entry in session.history.iter().rev().take(5) {
                        let status = if entry.success { "✓" } else { "✗" };
                        let _ = write!(
                            output,
                            "     {status} {} - {} (+{} -{})",
                            entry.timestamp.format("%Y-%m-%d %H:%M"),
                            entry.operation,
                            entry.created,
                            entry.deleted
                        );
                        if let Some(error) = &entry.error {
                            let _ = write!(output, ": {error}");
                        }
                        output.push('\n');
                    }
                }

                output
            }
        }
    }

    /// Formats an action type with color.
    fn format_action_type(action_type: ActionType) -> String {
        match action_type {
            ActionType::Create => "+create".green().to_string(),
            ActionType::Delete => "-delete".red().to_string(),
        }
    }

    fn count(n: usize, sign: &str) -> String {
        if n == 0 {
            String::from("-")
        } else {
            format!("{sign}{n}")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &"✓".green().to_string(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &"✗".red().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &"⚠".yellow().to_string(), message)
    }

    fn message(&self, status: &str, symbol: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{symbol} {message}"),
        }
    }
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson<'a> {
    plan_id: &'a str,
    action_count: usize,
    creates: usize,
    deletes: usize,
    pruned_deletes: usize,
    passes_guardrails: bool,
    guardrail_violations: &'a [String],
    actions: Vec<ActionJson<'a>>,
}

#[derive(Serialize)]
struct ActionJson<'a> {
    action_type: String,
    level: String,
    entity_id: &'a str,
    reason: &'a str,
    dependencies: &'a [usize],
}

impl<'a> From<&'a SyncPlan> for PlanJson<'a> {
    fn from(plan: &'a SyncPlan) -> Self {
        Self {
            plan_id: &plan.plan_id,
            action_count: plan.action_count(),
            creates: plan.create_count(),
            deletes: plan.delete_count(),
            pruned_deletes: plan.pruned_deletes,
            passes_guardrails: plan.passes_guardrails,
            guardrail_violations: &plan.guardrail_violations,
            actions: plan
                .actions
                .iter()
                .map(|a| ActionJson {
                    action_type: a.action_type.to_string(),
                    level: a.level.to_string(),
                    entity_id: &a.entity_id,
                    reason: &a.reason,
                    dependencies: &a.dependencies,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct ExecutionJson<'a> {
    success: bool,
    successful: usize,
    failed: usize,
    skipped: usize,
    not_attempted: usize,
    id_map: &'a crate::model::IdMap,
    errors: Vec<String>,
}

impl<'a> From<&'a ExecutionResult> for ExecutionJson<'a> {
    fn from(result: &'a ExecutionResult) -> Self {
        Self {
            success: result.all_successful(),
            successful: result.successful,
            failed: result.failed,
            skipped: result.skipped,
            not_attempted: result.not_attempted,
            id_map: &result.id_map,
            errors: result
                .results
                .iter()
                .filter_map(|r| {
                    r.error
                        .as_ref()
                        .map(|e| format!("{}: {e}", r.action.description()))
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    plan_id: &'a str,
    title: &'a str,
    dirty: bool,
    checked_out_at: String,
    last_synced_at: Option<String>,
    locked: bool,
    changes: &'a PlanChangeset,
}

impl<'a> From<&'a SessionStatus> for StatusJson<'a> {
    fn from(status: &'a SessionStatus) -> Self {
        Self {
            plan_id: &status.session.plan_id,
            title: &status.session.working.title,
            dirty: status.session.is_dirty(),
            checked_out_at: status.session.checked_out_at.to_rfc3339(),
            last_synced_at: status.session.last_synced_at.map(|t| t.to_rfc3339()),
            locked: status.lock.as_ref().is_some_and(|l| !l.is_expired()),
            changes: &status.changeset,
        }
    }
}
