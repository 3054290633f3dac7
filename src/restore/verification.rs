// rds-restore/src/restore/verification.rs
use tracing::{Span, info};

use crate::errors::Result;
use crate::restore::db_restore::SqlSession;

const PUBLIC_TABLE_COUNT_SQL: &str =
    "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public'";
const IDENTITY_SQL: &str = "SELECT current_database()::text, current_user::text";

/// Evidence that the restore landed where it was meant to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub database: String,
    pub user: String,
    pub tables_count: i64,
}

/// Read-only post-restore checks. Any failure here is fatal to the outcome.
pub async fn verify_restore(session: &mut dyn SqlSession, span: &Span) -> Result<VerificationReport> {
    let tables_count = session.query_count(PUBLIC_TABLE_COUNT_SQL).await?;
    let (database, user) = session.query_text_pair(IDENTITY_SQL).await?;

    info!(
        parent: span,
        "Database: {}, User: {}, Tables: {}", database, user, tables_count
    );
    Ok(VerificationReport {
        database,
        user,
        tables_count,
    })
}
