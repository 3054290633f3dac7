// rds-restore/src/restore/credentials.rs
use async_trait::async_trait;
use aws_sdk_secretsmanager as secretsmanager;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{Span, info, warn};

use crate::config::{DEFAULT_PORT, RestoreSettings, parse_port};
use crate::errors::{RestoreError, Result};

/// Connection parameters for the target database. Built once per invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Read-only access to structured secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch_secret(&self, secret_id: &str) -> Result<Map<String, Value>>;
}

pub struct SecretsManagerStore {
    client: secretsmanager::Client,
}

impl SecretsManagerStore {
    pub fn new(client: secretsmanager::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn fetch_secret(&self, secret_id: &str) -> Result<Map<String, Value>> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| {
                RestoreError::Store(format!(
                    "Error retrieving secret {}: {}",
                    secret_id,
                    secretsmanager::error::DisplayErrorContext(&e)
                ))
            })?;

        let raw = output.secret_string().ok_or_else(|| {
            RestoreError::Store(format!("Secret {} has no SecretString value", secret_id))
        })?;

        match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(RestoreError::Store(format!(
                "Secret {} is not a JSON object",
                secret_id
            ))),
        }
    }
}

/// Credential fields before validation.
#[derive(Default)]
struct RawCredentials {
    host: Option<String>,
    port: Option<String>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl RawCredentials {
    fn present_keys(&self) -> Vec<&'static str> {
        [
            ("host", self.host.is_some()),
            ("port", self.port.is_some()),
            ("database", self.database.is_some()),
            ("username", self.username.is_some()),
            ("password", self.password.is_some()),
        ]
        .into_iter()
        .filter_map(|(key, present)| present.then_some(key))
        .collect()
    }

    fn into_profile(self, span: &Span) -> Result<ConnectionProfile> {
        let host = required(self.host, "RDS endpoint (host)")?;
        let database = required(self.database, "Database name")?;
        let username = required(self.username, "Database username")?;
        let password = required(self.password, "Database password")?;

        let port = parse_port(self.port.as_deref()).unwrap_or_else(|invalid| {
            warn!(parent: span, "Invalid port value '{}', using default {}", invalid, DEFAULT_PORT);
            DEFAULT_PORT
        });

        Ok(ConnectionProfile {
            host,
            port,
            database,
            username,
            password,
        })
    }
}

fn required(value: Option<String>, label: &str) -> Result<String> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        RestoreError::Configuration(format!(
            "{} is required but not found in credentials",
            label
        ))
    })
}

/// Secret values may be JSON strings or numbers (ports usually are).
fn secret_field(secret: &Map<String, Value>, key: &str) -> Option<String> {
    match secret.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Produces the connection profile from either the secret store or the raw
/// environment, depending on `USE_SECRETS_MANAGER`.
pub async fn resolve_connection_profile(
    settings: &RestoreSettings,
    secrets: &dyn SecretStore,
    span: &Span,
) -> Result<ConnectionProfile> {
    let raw = if settings.use_secrets_manager {
        let secret_name = settings.secret_name.as_deref().ok_or_else(|| {
            RestoreError::Configuration(
                "DB_SECRET_NAME environment variable is required when using Secrets Manager"
                    .to_string(),
            )
        })?;

        info!(parent: span, "Retrieving database credentials from Secrets Manager: {}", secret_name);
        let secret = secrets.fetch_secret(secret_name).await?;
        info!(parent: span, "Secret keys found: {:?}", secret.keys().collect::<Vec<_>>());

        // The password never falls back to plaintext configuration.
        RawCredentials {
            host: secret_field(&secret, "host").or_else(|| settings.db_host.clone()),
            port: secret_field(&secret, "port").or_else(|| settings.db_port.clone()),
            database: secret_field(&secret, "dbname").or_else(|| settings.db_name.clone()),
            username: secret_field(&secret, "username").or_else(|| settings.db_username.clone()),
            password: secret_field(&secret, "password"),
        }
    } else {
        info!(parent: span, "Using database credentials from environment variables");
        RawCredentials {
            host: settings.db_host.clone(),
            port: settings.db_port.clone(),
            database: settings.db_name.clone(),
            username: settings.db_username.clone(),
            password: settings.db_password.clone(),
        }
    };

    info!(parent: span, "Retrieved credentials keys: {:?}", raw.present_keys());
    let profile = raw.into_profile(span)?;
    info!(
        parent: span,
        "Parsed credentials - Host: {}, Port: {}, DB: {}, User: {}",
        profile.host, profile.port, profile.database, profile.username
    );
    Ok(profile)
}
