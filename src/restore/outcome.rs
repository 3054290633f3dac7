// rds-restore/src/restore/outcome.rs
use chrono::Utc;
use serde::Serialize;

use crate::errors::RestoreError;
use crate::restore::db_restore::ReplayTally;
use crate::restore::verification::VerificationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreStatus {
    Success,
    Skipped,
    Error,
}

/// The single result of an invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoreOutcome {
    pub message: String,
    pub status: RestoreStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statements_executed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statements_failed: Option<usize>,
    pub timestamp: String,
}

impl RestoreOutcome {
    fn bare(status: RestoreStatus, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
            database: None,
            user: None,
            tables_count: None,
            statements_executed: None,
            statements_failed: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn skipped() -> Self {
        Self::bare(
            RestoreStatus::Skipped,
            "No backup file configured, skipping restoration",
        )
    }

    pub fn success(report: VerificationReport, tally: ReplayTally) -> Self {
        Self {
            database: Some(report.database),
            user: Some(report.user),
            tables_count: Some(report.tables_count),
            statements_executed: Some(tally.executed),
            statements_failed: Some(tally.failed),
            ..Self::bare(
                RestoreStatus::Success,
                "Database restoration completed successfully",
            )
        }
    }

    pub fn failure(err: &RestoreError) -> Self {
        Self::bare(RestoreStatus::Error, err.to_string())
    }

    pub fn status_code(&self) -> u16 {
        match self.status {
            RestoreStatus::Success | RestoreStatus::Skipped => 200,
            RestoreStatus::Error => 500,
        }
    }
}

/// Proxy-style response returned to the invoker.
#[derive(Debug, Clone, Serialize)]
pub struct LambdaResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl TryFrom<&RestoreOutcome> for LambdaResponse {
    type Error = serde_json::Error;

    fn try_from(outcome: &RestoreOutcome) -> Result<Self, Self::Error> {
        Ok(Self {
            status_code: outcome.status_code(),
            body: serde_json::to_string(outcome)?,
        })
    }
}
