//! Health check types for `chirp doctor`.
//!
//! The checks themselves live next to the data they inspect
//! ([`crate::Storage::database_health_checks`]); this module holds the shared
//! result types and the report summary.

use serde::Serialize;

/// High-level category for a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    /// `SQLite` file, schema and pragmas.
    Database,
    /// Follow edges.
    Graph,
    /// Like edges.
    Engagement,
}

/// Status for an individual health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

impl CheckStatus {
    /// Whether the check is healthy enough for continued operation.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Single health check result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub category: CheckCategory,
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl HealthCheck {
    pub(crate) fn pass(category: CheckCategory, name: &str, message: impl Into<String>) -> Self {
        Self {
            category,
            name: name.to_string(),
            status: CheckStatus::Pass,
            message: message.into(),
            suggestion: None,
        }
    }

    pub(crate) fn failing(
        category: CheckCategory,
        name: &str,
        status: CheckStatus,
        message: impl Into<String>,
        suggestion: &str,
    ) -> Self {
        Self {
            category,
            name: name.to_string(),
            status,
            message: message.into(),
            suggestion: Some(suggestion.to_string()),
        }
    }
}

/// Table row counts (and optional size) for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TableStat {
    pub name: String,
    pub rows: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<i64>,
}

/// All checks from one doctor run plus tallies.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<HealthCheck>,
    pub passed: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl DoctorReport {
    #[must_use]
    pub fn from_checks(checks: Vec<HealthCheck>) -> Self {
        let count = |status: CheckStatus| checks.iter().filter(|c| c.status == status).count();
        let passed = count(CheckStatus::Pass);
        let warnings = count(CheckStatus::Warning);
        let errors = count(CheckStatus::Error);
        Self {
            checks,
            passed,
            warnings,
            errors,
        }
    }

    /// No check ended in `Error`.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.errors == 0
    }
}
