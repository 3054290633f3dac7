// rds-restore/src/restore/testing.rs
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::Span;

use crate::config::BackupLocator;
use crate::errors::{RestoreError, Result};
use crate::restore::credentials::{ConnectionProfile, SecretStore};
use crate::restore::db_restore::{SessionConnector, SqlSession, StatementError};
use crate::restore::rds_wait::InstanceStatusSource;
use crate::restore::s3_download::ObjectStore;

pub struct FakeSecretStore {
    secret_id: String,
    secret: Option<Value>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FakeSecretStore {
    pub fn with_secret(secret_id: &str, secret: Value) -> Self {
        Self {
            secret_id: secret_id.to_string(),
            secret: Some(secret),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            secret_id: String::new(),
            secret: None,
            failure: Some(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn fetch_secret(&self, secret_id: &str) -> Result<Map<String, Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(RestoreError::Store(reason.clone()));
        }
        match (&self.secret, secret_id == self.secret_id) {
            (Some(Value::Object(map)), true) => Ok(map.clone()),
            (Some(_), true) => Err(RestoreError::Store("secret is not a JSON object".into())),
            _ => Err(RestoreError::Store(format!(
                "ResourceNotFoundException: {}",
                secret_id
            ))),
        }
    }
}

pub struct FakeObjectStore {
    body: String,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FakeObjectStore {
    pub fn with_body(body: &str) -> Self {
        Self {
            body: body.to_string(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Writes a truncated body, then fails like a dropped stream would.
    pub fn failing_after_partial_write(reason: &str) -> Self {
        Self {
            body: "CREATE TABLE half".to_string(),
            failure: Some(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn download(&self, _locator: &BackupLocator, destination: &Path) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(destination, &self.body).await?;
        match &self.failure {
            Some(reason) => Err(RestoreError::Store(reason.clone())),
            None => Ok(self.body.len() as u64),
        }
    }
}

pub struct FakeStatusSource {
    statuses: Vec<String>,
    failure: Option<String>,
    calls: AtomicUsize,
    last_identifier: Mutex<Option<String>>,
}

impl FakeStatusSource {
    /// Returns the statuses in order, repeating the last one forever.
    pub fn sequence(statuses: &[&str]) -> Self {
        Self {
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
            failure: None,
            calls: AtomicUsize::new(0),
            last_identifier: Mutex::new(None),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            statuses: Vec::new(),
            failure: Some(reason.to_string()),
            calls: AtomicUsize::new(0),
            last_identifier: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_identifier(&self) -> Option<String> {
        self.last_identifier.lock().ok().and_then(|id| id.clone())
    }
}

#[async_trait]
impl InstanceStatusSource for FakeStatusSource {
    async fn instance_status(&self, identifier: &str) -> Result<Option<String>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_identifier.lock() {
            *last = Some(identifier.to_string());
        }
        if let Some(reason) = &self.failure {
            return Err(RestoreError::Store(reason.clone()));
        }
        let index = call.min(self.statuses.len().saturating_sub(1));
        Ok(self.statuses.get(index).cloned())
    }
}

#[derive(Default)]
struct SessionState {
    executed: Vec<String>,
    attempts: usize,
    closed: bool,
}

/// Read handle on what a `FakeSession` did, usable after the session was consumed.
#[derive(Clone)]
pub struct SessionLog(Arc<Mutex<SessionState>>);

impl SessionLog {
    pub fn executed(&self) -> Vec<String> {
        self.0.lock().map(|s| s.executed.clone()).unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.0.lock().map(|s| s.closed).unwrap_or(false)
    }
}

pub struct FakeSession {
    state: Arc<Mutex<SessionState>>,
    rejecting: Vec<String>,
    drop_at: Option<usize>,
    identity: (String, String),
    failing_queries: bool,
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            rejecting: Vec::new(),
            drop_at: None,
            identity: ("postgres".to_string(), "postgres".to_string()),
            failing_queries: false,
        }
    }

    /// Statements containing `pattern` are rejected by the "server".
    pub fn rejecting(mut self, pattern: &str) -> Self {
        self.rejecting.push(pattern.to_string());
        self
    }

    /// The session breaks on the zero-based statement attempt `attempt`.
    pub fn dropping_connection_at(mut self, attempt: usize) -> Self {
        self.drop_at = Some(attempt);
        self
    }

    pub fn with_identity(mut self, database: &str, user: &str) -> Self {
        self.identity = (database.to_string(), user.to_string());
        self
    }

    pub fn failing_queries(mut self) -> Self {
        self.failing_queries = true;
        self
    }

    pub fn log(&self) -> SessionLog {
        SessionLog(self.state.clone())
    }

    pub fn executed(&self) -> Vec<String> {
        self.log().executed()
    }
}

#[async_trait]
impl SqlSession for FakeSession {
    async fn execute(&mut self, statement: &str) -> std::result::Result<(), StatementError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| StatementError::Session(e.to_string()))?;
        let attempt = state.attempts;
        state.attempts += 1;

        if self.drop_at == Some(attempt) {
            return Err(StatementError::Session("connection reset by peer".into()));
        }
        if self.rejecting.iter().any(|p| statement.contains(p.as_str())) {
            return Err(StatementError::Rejected(format!(
                "syntax error at or near \"{}\"",
                statement.split_whitespace().next().unwrap_or_default()
            )));
        }
        state.executed.push(statement.to_string());
        Ok(())
    }

    async fn query_count(&mut self, _sql: &str) -> Result<i64> {
        if self.failing_queries {
            return Err(RestoreError::Database("server closed the connection".into()));
        }
        let created = self
            .executed()
            .iter()
            .filter(|s| s.to_ascii_uppercase().starts_with("CREATE TABLE"))
            .count();
        Ok(created as i64)
    }

    async fn query_text_pair(&mut self, _sql: &str) -> Result<(String, String)> {
        if self.failing_queries {
            return Err(RestoreError::Database("server closed the connection".into()));
        }
        Ok(self.identity.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        Ok(())
    }
}

pub struct FakeConnector {
    session: Mutex<Option<FakeSession>>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FakeConnector {
    pub fn with_session(session: FakeSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            session: Mutex::new(None),
            failure: Some(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn connect(&self, _profile: &ConnectionProfile, _span: &Span) -> Result<Box<dyn SqlSession>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(RestoreError::Database(reason.clone()));
        }
        let session = self
            .session
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| RestoreError::Database("fake session already handed out".into()))?;
        Ok(Box::new(session))
    }
}
