//! Diagnostic report accumulation.
//!
//! Checks record their findings into a [`Check`], and finished checks are
//! folded into a [`Report`]. Nothing is ever dropped: a report holds every
//! warning and failure raised during a run, in the order they were raised.

use chrono::{DateTime, Utc};
use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Severity of a reported issue. Only failures make a run unsuccessful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Failure,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Failure => write!(f, "FAILURE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, message: message.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { severity: Severity::Failure, message: message.into() }
    }

    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Failure
    }
}

/// Findings of one diagnostic step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub title: String,
    pub issues: Vec<Issue>,
    pub successes: Vec<String>,
}

impl Check {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        log::info!("{}", title);
        Self { title, issues: Vec::new(), successes: Vec::new() }
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Issue::warning(message));
    }

    pub fn failure(&mut self, message: impl Into<String>) {
        self.push(Issue::failure(message));
    }

    pub fn success(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{}", message);
        self.successes.push(message);
    }

    pub fn push(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Warning => log::warn!("{}", issue.message),
            Severity::Failure => log::error!("{}", issue.message),
        }
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        for issue in issues {
            self.push(issue);
        }
    }

    pub fn has_failures(&self) -> bool {
        self.issues.iter().any(Issue::is_failure)
    }

    /// A check passes when it raised no failures; warnings do not count.
    pub fn passed(&self) -> bool {
        !self.has_failures()
    }
}

/// Accumulated outcome of a diagnostic run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub checks: Vec<Check>,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    pub fn new() -> Self {
        Self { generated_at: Utc::now(), checks: Vec::new() }
    }

    /// Fold a finished check into the report
    pub fn record(&mut self, check: Check) {
        self.checks.push(check);
    }

    /// Fold another report's checks into this one, keeping their order
    pub fn merge(&mut self, other: Report) {
        self.checks.extend(other.checks);
    }

    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.checks.iter().flat_map(|check| check.issues.iter())
    }

    pub fn failure_count(&self) -> usize {
        self.issues().filter(|issue| issue.is_failure()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues().filter(|issue| !issue.is_failure()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Human-readable rendering, one block per check
    pub fn render_text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        for check in &self.checks {
            let marker = if check.passed() { "✓" } else { "✗" };
            lines.push(format!("{} {}", marker, check.title));
            for issue in &check.issues {
                lines.push(format!("  {}: {}", issue.severity, issue.message));
            }
            for success in &check.successes {
                lines.push(format!("  {}", success));
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "{} checks, {} failures, {} warnings",
            self.checks.len(),
            self.failure_count(),
            self.warning_count()
        ));

        lines.join("\n")
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report to JSON")?;

        fs::write(output_path, json)
            .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

        log::info!("JSON report written to {}", output_path.display());
        Ok(())
    }
}
