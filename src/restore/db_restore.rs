// rds-restore/src/restore/db_restore.rs
use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Connection, Executor, PgConnection};
use std::path::Path;
use std::time::Duration;
use tracing::{Span, info, warn};

use crate::errors::{RestoreError, Result};
use crate::restore::credentials::ConnectionProfile;
use crate::utils::setting::check_host_resolves;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const PROGRESS_INTERVAL: usize = 100;
pub const STATEMENT_TERMINATOR: char = ';';

/// Failure of a single statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementError {
    /// The server rejected the statement (syntax, constraint, ...). The session is still usable.
    Rejected(String),
    /// The session itself failed. Nothing more can be executed.
    Session(String),
}

/// An open session with autocommit semantics.
#[async_trait]
pub trait SqlSession: Send {
    async fn execute(&mut self, statement: &str) -> std::result::Result<(), StatementError>;
    async fn query_count(&mut self, sql: &str) -> Result<i64>;
    async fn query_text_pair(&mut self, sql: &str) -> Result<(String, String)>;
    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, profile: &ConnectionProfile, span: &Span) -> Result<Box<dyn SqlSession>>;
}

pub struct PgSession {
    conn: PgConnection,
}

#[async_trait]
impl SqlSession for PgSession {
    async fn execute(&mut self, statement: &str) -> std::result::Result<(), StatementError> {
        if is_copy_from_stdin(statement) {
            return self.reject_copy_from_stdin(statement).await;
        }
        // A bare &str goes over the simple query protocol, outside any transaction.
        match (&mut self.conn).execute(statement).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) => Err(StatementError::Rejected(e.to_string())),
            Err(e) => Err(StatementError::Session(e.to_string())),
        }
    }

    async fn query_count(&mut self, sql: &str) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&mut self.conn)
            .await?)
    }

    async fn query_text_pair(&mut self, sql: &str) -> Result<(String, String)> {
        Ok(sqlx::query_as::<_, (String, String)>(sql)
            .fetch_one(&mut self.conn)
            .await?)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

impl PgSession {
    /// The dump's inline COPY data is not streamed. The copy is started and
    /// failed with CopyFail, which leaves the session ready for the next statement.
    async fn reject_copy_from_stdin(
        &mut self,
        statement: &str,
    ) -> std::result::Result<(), StatementError> {
        let copy = match self.conn.copy_in_raw(statement).await {
            Ok(copy) => copy,
            Err(sqlx::Error::Database(e)) => return Err(StatementError::Rejected(e.to_string())),
            Err(e) => return Err(StatementError::Session(e.to_string())),
        };
        match copy.abort("COPY FROM stdin data is not replayed").await {
            Ok(()) => Err(StatementError::Rejected(
                "COPY ... FROM stdin is not supported, statement skipped".to_string(),
            )),
            Err(sqlx::Error::Database(e)) => Err(StatementError::Rejected(e.to_string())),
            Err(e) => Err(StatementError::Session(e.to_string())),
        }
    }
}

/// `COPY <table> ... FROM stdin`, the form plain-format pg_dump uses for table data.
pub fn is_copy_from_stdin(statement: &str) -> bool {
    let words: Vec<String> = statement
        .split_whitespace()
        .map(str::to_ascii_uppercase)
        .collect();
    words.first().is_some_and(|w| w == "COPY")
        && words.windows(2).any(|pair| pair[0] == "FROM" && pair[1] == "STDIN")
}

pub struct PgConnector {
    connect_timeout: Duration,
}

impl Default for PgConnector {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

#[async_trait]
impl SessionConnector for PgConnector {
    async fn connect(&self, profile: &ConnectionProfile, span: &Span) -> Result<Box<dyn SqlSession>> {
        check_host_resolves(&profile.host, profile.port, span).await?;

        info!(
            parent: span,
            "Connecting to PostgreSQL database at {}:{}...", profile.host, profile.port
        );
        let options = PgConnectOptions::new()
            .host(&profile.host)
            .port(profile.port)
            .database(&profile.database)
            .username(&profile.username)
            .password(&profile.password)
            .disable_statement_logging();

        let conn = tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| {
                RestoreError::Database(format!(
                    "timed out after {:?} connecting to {}:{}",
                    self.connect_timeout,
                    profile.host,
                    profile.port
                ))
            })??;

        Ok(Box::new(PgSession { conn }))
    }
}

/// Splits dump text on the terminator. String literals and comments are not
/// recognised, so a terminator inside them splits the statement too.
pub fn split_statements(sql_content: &str) -> Vec<String> {
    sql_content
        .split(STATEMENT_TERMINATOR)
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn read_dump(path: &Path, span: &Span) -> Result<String> {
    info!(parent: span, "Reading SQL backup file {}...", path.display());
    let bytes = tokio::fs::read(path).await?;
    String::from_utf8(bytes).map_err(|e| {
        RestoreError::Unexpected(format!("{} is not valid UTF-8: {}", path.display(), e))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOutcome {
    Applied,
    Skipped,
}

/// Running result of a best-effort replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayTally {
    pub executed: usize,
    pub failed: usize,
}

impl ReplayTally {
    pub fn record(self, outcome: StatementOutcome) -> Self {
        match outcome {
            StatementOutcome::Applied => Self {
                executed: self.executed + 1,
                ..self
            },
            StatementOutcome::Skipped => Self {
                failed: self.failed + 1,
                ..self
            },
        }
    }

    pub fn processed(&self) -> usize {
        self.executed + self.failed
    }
}

/// Executes the batch in order. Rejected statements are logged and skipped;
/// a session failure aborts the rest of the batch.
pub async fn replay_statements(
    session: &mut dyn SqlSession,
    statements: &[String],
    span: &Span,
) -> Result<ReplayTally> {
    let total = statements.len();
    info!(parent: span, "Executing {} SQL statements...", total);

    let mut tally = ReplayTally::default();
    for (index, statement) in statements.iter().enumerate() {
        let outcome = match session.execute(statement).await {
            Ok(()) => StatementOutcome::Applied,
            Err(StatementError::Rejected(reason)) => {
                warn!(parent: span, "Error executing statement {}: {}", index + 1, reason);
                StatementOutcome::Skipped
            }
            Err(StatementError::Session(reason)) => {
                return Err(RestoreError::Database(format!(
                    "session failed at statement {}/{}: {}",
                    index + 1,
                    total,
                    reason
                )));
            }
        };
        tally = tally.record(outcome);

        if tally.processed() % PROGRESS_INTERVAL == 0 {
            info!(parent: span, "Executed {}/{} statements", tally.processed(), total);
        }
    }

    info!(
        parent: span,
        "Replay finished: {} executed, {} skipped", tally.executed, tally.failed
    );
    Ok(tally)
}
