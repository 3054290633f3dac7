mod logic;
pub(crate) mod credentials; // Secret store / environment credential resolution
pub(crate) mod s3_download; // Object store download into the scratch file
pub(crate) mod rds_wait; // Control-plane availability polling
pub(crate) mod db_restore; // Session handling and best-effort statement replay
pub(crate) mod verification; // Post-restore checks
pub(crate) mod outcome;

#[cfg(test)]
pub(crate) mod testing;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::Span;

use crate::config::RestoreSettings;
use credentials::{SecretStore, SecretsManagerStore};
use db_restore::{PgConnector, SessionConnector};
use outcome::RestoreOutcome;
use rds_wait::{InstanceStatusSource, RdsStatusSource, WaitPolicy};
use s3_download::{ObjectStore, S3ObjectStore};

/// External systems the restore talks to. Built once and shared across invocations.
pub struct RestoreServices {
    pub secrets: Arc<dyn SecretStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub instances: Arc<dyn InstanceStatusSource>,
    pub connector: Arc<dyn SessionConnector>,
    pub wait_policy: WaitPolicy,
}

impl RestoreServices {
    pub async fn from_aws(region: &str) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        RestoreServices {
            secrets: Arc::new(SecretsManagerStore::new(aws_sdk_secretsmanager::Client::new(
                &sdk_config,
            ))),
            objects: Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&sdk_config))),
            instances: Arc::new(RdsStatusSource::new(aws_sdk_rds::Client::new(&sdk_config))),
            connector: Arc::new(PgConnector::default()),
            wait_policy: WaitPolicy::default(),
        }
    }
}

/// Public entry point for the restore process. Always yields an outcome.
pub async fn run_restore_flow(
    settings: &RestoreSettings,
    services: &RestoreServices,
    span: &Span,
) -> RestoreOutcome {
    logic::perform_restore_orchestration(settings, services, span).await
}
