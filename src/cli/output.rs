//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::app::{ManifestHasher, ValidationResult};
use crate::converge::{ApplyReport, ChangePlan, KeyedReport, Outcome, PlanAction, ResourceOutcome};
use crate::resource::{ManagedResource, ResourceKind};
use crate::store::ClusterSnapshot;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Object")]
    object: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// Plan change row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Object")]
    object: String,
}

/// Stored object row for table display.
#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Object")]
    object: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "UID")]
    uid: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a change plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &ChangePlan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &ChangePlan) -> String {
        if !plan.has_changes() {
            return format!(
                "{} No changes required - {}/{} is converged.\n",
                "✓".green(),
                plan.tenant_id,
                plan.service_id
            );
        }

        let mut output = String::new();
        let _ = write!(output, "\nPlan for {}/{}", plan.tenant_id, plan.service_id);
        if plan.narrowed {
            let _ = write!(output, " {}", "(narrowed by custom parameters)".dimmed());
        }
        output.push_str("\n\n");

        let rows: Vec<PlanRow> = plan
            .changes
            .iter()
            .enumerate()
            .map(|(i, change)| PlanRow {
                index: i + 1,
                action: Self::format_plan_action(change.action),
                kind: change.reference.kind.to_string(),
                object: Self::object_name(&change.reference.namespace, &change.reference.name),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to update, {} to delete\n",
            plan.count(PlanAction::Create).to_string().green(),
            plan.count(PlanAction::Update).to_string().yellow(),
            plan.count(PlanAction::Delete).to_string().red()
        );

        output
    }

    /// Formats the report of an apply pass.
    #[must_use]
    pub fn format_report(&self, report: &ApplyReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let counts = report.counts();
                let status = if report.has_failures() {
                    format!("{} Applied {}/{} with failures", "✗".red(), report.tenant_id, report.service_id)
                } else {
                    format!("{} Applied {}/{}", "✓".green(), report.tenant_id, report.service_id)
                };

                let mut output = format!("{status}\n\n");
                output.push_str(&Self::outcome_table(&report.outcomes));
                let _ = write!(output, "\n\n   {counts}\n");

                if let Some(finished) = report.finished_at {
                    let elapsed = finished - report.started_at;
                    let _ = writeln!(output, "   Took {} ms", elapsed.num_milliseconds());
                }

                Self::append_failures(&mut output, &report.outcomes);
                output
            }
        }
    }

    /// Formats the report of a keyed-list upgrade.
    #[must_use]
    pub fn format_keyed(&self, report: &KeyedReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let counts = report.counts();
                let status = if counts.failed > 0 {
                    format!("{} Upgrade finished with failures", "✗".red())
                } else {
                    format!("{} Upgrade successful", "✓".green())
                };

                let mut output = format!("{status}\n\n");
                if !report.outcomes.is_empty() {
                    output.push_str(&Self::outcome_table(&report.outcomes));
                    output.push('\n');
                }
                let _ = write!(output, "\n   {counts}\n");

                Self::append_failures(&mut output, &report.outcomes);
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        let errors: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": errors,
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Manifest is valid!\n", "✓".green())
                } else {
                    let mut output = format!("{} Manifest is invalid:\n", "✗".red());
                    for error in &errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats the contents of a cluster snapshot.
    #[must_use]
    pub fn format_status(&self, snapshot: &ClusterSnapshot, kind: Option<ResourceKind>) -> String {
        let objects: Vec<&ManagedResource> = snapshot
            .resources
            .iter()
            .filter(|object| kind.is_none_or(|k| object.kind() == k))
            .collect();

        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "resource_version": snapshot.resource_version,
                    "last_updated": snapshot.last_updated,
                    "resources": objects,
                    "history": snapshot.history,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_status_text(snapshot, &objects),
        }
    }

    /// Formats snapshot contents as text.
    fn format_status_text(snapshot: &ClusterSnapshot, objects: &[&ManagedResource]) -> String {
        let mut output = String::new();

        let _ = write!(
            output,
            "\nCluster snapshot (version {}, updated {})\n\n",
            snapshot.resource_version,
            snapshot.last_updated.format("%Y-%m-%d %H:%M")
        );

        if objects.is_empty() {
            output.push_str("   No objects stored.\n");
        } else {
            let rows: Vec<ObjectRow> = objects
                .iter()
                .map(|object| {
                    let meta = object.metadata();
                    ObjectRow {
                        kind: object.kind().to_string(),
                        object: Self::object_name(&meta.namespace, &meta.name),
                        version: meta.resource_version.clone().unwrap_or_default(),
                        uid: Self::truncate(meta.uid.as_deref().unwrap_or(""), 13),
                    }
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if !snapshot.history.is_empty() {
            let _ = writeln!(output, "\n   Recent history ({}):", snapshot.history.len());
            for entry in snapshot.history.iter().rev().take(5) {
                let status = if entry.failed == 0 { "✓" } else { "✗" };
                let _ = writeln!(
                    output,
                    "     {status} {} - {}/{} [{}] {} changed, {} failed",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.tenant_id,
                    entry.service_id,
                    ManifestHasher::short(&entry.manifest_hash),
                    entry.changed,
                    entry.failed
                );
            }
        }

        output
    }

    /// Renders outcomes as a table.
    fn outcome_table(outcomes: &[ResourceOutcome]) -> String {
        let rows: Vec<OutcomeRow> = outcomes
            .iter()
            .map(|entry| OutcomeRow {
                kind: entry.reference.kind.to_string(),
                object: Self::object_name(&entry.reference.namespace, &entry.reference.name),
                result: Self::format_outcome(&entry.outcome),
            })
            .collect();
        Table::new(rows).to_string()
    }

    /// Lists failure messages below a table.
    fn append_failures(output: &mut String, outcomes: &[ResourceOutcome]) {
        let failures: Vec<_> = outcomes
            .iter()
            .filter_map(|entry| match &entry.outcome {
                Outcome::Failed { message, .. } => Some((&entry.reference, message)),
                _ => None,
            })
            .collect();

        if !failures.is_empty() {
            let _ = write!(output, "\n{} Errors:\n", "⚠".yellow());
            for (reference, message) in failures {
                let _ = writeln!(output, "   - {reference}: {message}");
            }
        }
    }

    /// Formats an outcome with color.
    fn format_outcome(outcome: &Outcome) -> String {
        match outcome {
            Outcome::Created => "+created".green().to_string(),
            Outcome::Updated => "~updated".yellow().to_string(),
            Outcome::Deleted => "-deleted".red().to_string(),
            Outcome::Unchanged => "unchanged".dimmed().to_string(),
            Outcome::Skipped { reason } => format!("skipped: {reason}").dimmed().to_string(),
            Outcome::Failed { class, .. } => format!("failed ({class:?})").red().bold().to_string(),
        }
    }

    /// Formats a plan action with color.
    fn format_plan_action(action: PlanAction) -> String {
        match action {
            PlanAction::Create => "+create".green().to_string(),
            PlanAction::Update => "~update".yellow().to_string(),
            PlanAction::Delete => "-delete".red().to_string(),
            PlanAction::Unchanged | PlanAction::Absent => action.to_string().dimmed().to_string(),
        }
    }

    /// Formats a namespaced object name.
    fn object_name(namespace: &str, name: &str) -> String {
        if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{namespace}/{name}")
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
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

    fn message(&self, status: &str, marker: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{marker} {message}"),
        }
    }
}
