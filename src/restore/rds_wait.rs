// rds-restore/src/restore/rds_wait.rs
use async_trait::async_trait;
use aws_sdk_rds as rds;
use std::time::Duration;
use tracing::{Span, info, warn};

use crate::config::RestoreSettings;
use crate::errors::{RestoreError, Result};

pub const POLL_DELAY: Duration = Duration::from_secs(30);
pub const MAX_POLL_ATTEMPTS: u32 = 20;

const AVAILABLE: &str = "available";
const TERMINAL_STATES: &[&str] = &[
    "deleted",
    "deleting",
    "failed",
    "incompatible-restore",
    "incompatible-parameters",
];

/// Instance-status lookup on the database control plane.
#[async_trait]
pub trait InstanceStatusSource: Send + Sync {
    /// Current status string of the instance, `None` if the control plane returned none.
    async fn instance_status(&self, identifier: &str) -> Result<Option<String>>;
}

pub struct RdsStatusSource {
    client: rds::Client,
}

impl RdsStatusSource {
    pub fn new(client: rds::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InstanceStatusSource for RdsStatusSource {
    async fn instance_status(&self, identifier: &str) -> Result<Option<String>> {
        let output = self
            .client
            .describe_db_instances()
            .db_instance_identifier(identifier)
            .send()
            .await
            .map_err(|e| {
                RestoreError::Store(format!(
                    "DescribeDBInstances failed for {}: {}",
                    identifier,
                    rds::error::DisplayErrorContext(&e)
                ))
            })?;

        Ok(output
            .db_instances()
            .first()
            .and_then(|instance| instance.db_instance_status())
            .map(str::to_string))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            delay: POLL_DELAY,
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }
}

/// How the wait ended. Only `Available` means the control plane confirmed readiness;
/// every variant lets the pipeline continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Available { attempts: u32 },
    TerminalState { status: String, attempts: u32 },
    GaveUp { attempts: u32 },
    LookupFailed { reason: String, attempts: u32 },
}

/// Instance identifier from the host name: the first DNS label, else
/// `RDS_DB_IDENTIFIER`, else `<PROJECT>-db`.
pub fn derive_instance_identifier(host: &str, settings: &RestoreSettings) -> (String, bool) {
    match host.split_once('.') {
        Some((label, _)) => (label.to_string(), false),
        None => {
            let fallback = settings
                .db_instance_identifier
                .clone()
                .unwrap_or_else(|| format!("{}-db", settings.project));
            (fallback, true)
        }
    }
}

pub async fn wait_for_instance(
    source: &dyn InstanceStatusSource,
    identifier: &str,
    policy: WaitPolicy,
    span: &Span,
) -> WaitOutcome {
    info!(parent: span, "Waiting for RDS instance {} to be available...", identifier);

    let mut attempts = 0;
    while attempts < policy.max_attempts {
        if attempts > 0 {
            tokio::time::sleep(policy.delay).await;
        }
        attempts += 1;

        match source.instance_status(identifier).await {
            Ok(Some(status)) if status == AVAILABLE => {
                info!(parent: span, "RDS instance {} is available (attempt {})", identifier, attempts);
                return WaitOutcome::Available { attempts };
            }
            Ok(Some(status)) if TERMINAL_STATES.contains(&status.as_str()) => {
                warn!(
                    parent: span,
                    "RDS instance {} reached terminal state '{}'. Proceeding with connection attempt...",
                    identifier, status
                );
                return WaitOutcome::TerminalState { status, attempts };
            }
            Ok(status) => {
                info!(
                    parent: span,
                    "RDS instance {} status {:?} (attempt {}/{})",
                    identifier, status, attempts, policy.max_attempts
                );
            }
            Err(e) => {
                warn!(
                    parent: span,
                    "Could not wait for RDS instance: {}. Proceeding with connection attempt...", e
                );
                return WaitOutcome::LookupFailed {
                    reason: e.to_string(),
                    attempts,
                };
            }
        }
    }

    warn!(
        parent: span,
        "RDS instance {} not available after {} attempts. Proceeding with connection attempt...",
        identifier, attempts
    );
    WaitOutcome::GaveUp { attempts }
}
