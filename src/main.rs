//! RDS Restore Function
//!
//! Restores a PostgreSQL database from a SQL dump stored in S3, run as a Lambda function

// rds-restore/src/main.rs
mod config;
mod errors;
mod restore;
mod utils;

use anyhow::Result;
use config::RestoreSettings;
use lambda_runtime::{LambdaEvent, run, service_fn};
use restore::RestoreServices;
use restore::outcome::LambdaResponse;
use serde_json::Value;
use tracing::info_span;

#[tokio::main]
async fn main() -> Result<()> {
    // Local runs read a .env file; in Lambda the environment is already populated.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let startup_settings = RestoreSettings::from_env();
    let services = RestoreServices::from_aws(&startup_settings.region).await;
    let services = &services;

    run(service_fn(move |event: LambdaEvent<Value>| async move {
        function_handler(event, services).await
    }))
    .await
    .map_err(|e| anyhow::anyhow!("Lambda runtime failed: {}", e))
}

/// Every invocation ends in a response; restore failures become status 500 bodies.
async fn function_handler(
    event: LambdaEvent<Value>,
    services: &RestoreServices,
) -> std::result::Result<LambdaResponse, lambda_runtime::Error> {
    let settings = RestoreSettings::from_env();
    let span = info_span!("restore", request_id = %event.context.request_id);

    let outcome = restore::run_restore_flow(&settings, services, &span).await;
    Ok(LambdaResponse::try_from(&outcome)?)
}
