// rds-restore/src/restore/logic.rs
use tracing::{Span, error, info, warn};

use crate::config::RestoreSettings;
use crate::errors::Result;
use crate::restore::RestoreServices;
use crate::restore::credentials::resolve_connection_profile;
use crate::restore::db_restore::{
    ReplayTally, SqlSession, read_dump, replay_statements, split_statements,
};
use crate::restore::outcome::RestoreOutcome;
use crate::restore::rds_wait::{derive_instance_identifier, wait_for_instance};
use crate::restore::s3_download::{ScratchFile, fetch_backup};
use crate::restore::verification::{VerificationReport, verify_restore};

/// Runs the pipeline and folds every error into an outcome.
pub async fn perform_restore_orchestration(
    settings: &RestoreSettings,
    services: &RestoreServices,
    span: &Span,
) -> RestoreOutcome {
    match restore_pipeline(settings, services, span).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(parent: span, error_kind = err.kind(), "{}", err);
            RestoreOutcome::failure(&err)
        }
    }
}

/// Credentials, skip check, download, wait, replay, verify.
///
/// The scratch guard is declared before the session, so on every early exit
/// the session is dropped (and its connection closed) first and the file removed after.
async fn restore_pipeline(
    settings: &RestoreSettings,
    services: &RestoreServices,
    span: &Span,
) -> Result<RestoreOutcome> {
    let profile = resolve_connection_profile(settings, services.secrets.as_ref(), span).await?;

    let Some(locator) = settings.backup_locator() else {
        warn!(parent: span, "No S3 backup configuration found, skipping restoration");
        return Ok(RestoreOutcome::skipped());
    };

    info!(
        parent: span,
        "Starting database restoration for {} on {}:{}",
        profile.database, profile.host, profile.port
    );

    let scratch = ScratchFile::claim(&settings.scratch_path);
    fetch_backup(services.objects.as_ref(), &locator, &scratch, span).await?;

    let (identifier, used_fallback) = derive_instance_identifier(&profile.host, settings);
    if used_fallback {
        warn!(
            parent: span,
            "Could not parse DB identifier from endpoint '{}', using fallback: {}",
            profile.host, identifier
        );
    }
    info!(parent: span, "Using DB identifier: {}", identifier);
    let wait_outcome = wait_for_instance(
        services.instances.as_ref(),
        &identifier,
        services.wait_policy,
        span,
    )
    .await;
    info!(parent: span, wait_outcome = ?wait_outcome, "Instance wait finished");

    let mut session = services.connector.connect(&profile, span).await?;
    let (tally, report) = replay_and_verify(session.as_mut(), &scratch, span).await?;

    if let Err(e) = session.close().await {
        warn!(parent: span, "Failed to close database session cleanly: {}", e);
    }
    scratch.close(span);

    info!(parent: span, "Database restoration completed successfully!");
    Ok(RestoreOutcome::success(report, tally))
}

async fn replay_and_verify(
    session: &mut dyn SqlSession,
    scratch: &ScratchFile,
    span: &Span,
) -> Result<(ReplayTally, VerificationReport)> {
    let sql_content = read_dump(scratch.path(), span).await?;
    let statements = split_statements(&sql_content);
    let tally = replay_statements(session, &statements, span).await?;
    let report = verify_restore(session, span).await?;
    Ok((tally, report))
}
