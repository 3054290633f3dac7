// rds-restore/src/config/mod.rs
#[cfg(test)]
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_REGION: &str = "ap-south-1";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_PROJECT: &str = "ifrs";
pub const SCRATCH_SQL_PATH: &str = "/tmp/backup.sql";

/// Location of the dump in object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupLocator {
    pub bucket: String,
    pub key: String,
}

/// Values read from the invocation environment.
///
/// Raw database fields are kept as given; the credential resolver decides
/// which of them are used depending on the mode flag.
#[derive(Clone)]
pub struct RestoreSettings {
    pub use_secrets_manager: bool,
    pub secret_name: Option<String>,
    pub region: String,
    pub backup_bucket: Option<String>,
    pub backup_key: Option<String>,
    pub db_host: Option<String>,
    pub db_port: Option<String>,
    pub db_name: Option<String>,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub db_instance_identifier: Option<String>,
    pub project: String,
    pub scratch_path: PathBuf,
}

impl RestoreSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[cfg(test)]
    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Builds settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let use_secrets_manager = non_empty("USE_SECRETS_MANAGER")
            .map_or(true, |flag| flag.trim().eq_ignore_ascii_case("true"));

        RestoreSettings {
            use_secrets_manager,
            secret_name: non_empty("DB_SECRET_NAME"),
            region: non_empty("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            backup_bucket: non_empty("S3_BUCKET"),
            backup_key: non_empty("S3_KEY"),
            db_host: non_empty("RDS_ENDPOINT"),
            db_port: non_empty("RDS_PORT"),
            db_name: non_empty("DB_NAME"),
            db_username: non_empty("DB_USERNAME"),
            db_password: non_empty("DB_PASSWORD"),
            db_instance_identifier: non_empty("RDS_DB_IDENTIFIER"),
            project: non_empty("PROJECT").unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            scratch_path: PathBuf::from(SCRATCH_SQL_PATH),
        }
    }

    /// Both halves must be present, otherwise the restore is skipped.
    pub fn backup_locator(&self) -> Option<BackupLocator> {
        match (&self.backup_bucket, &self.backup_key) {
            (Some(bucket), Some(key)) => Some(BackupLocator {
                bucket: bucket.clone(),
                key: key.clone(),
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for RestoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestoreSettings")
            .field("use_secrets_manager", &self.use_secrets_manager)
            .field("secret_name", &self.secret_name)
            .field("region", &self.region)
            .field("backup_bucket", &self.backup_bucket)
            .field("backup_key", &self.backup_key)
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("db_username", &self.db_username)
            .field("db_password", &self.db_password.as_ref().map(|_| "<redacted>"))
            .field("db_instance_identifier", &self.db_instance_identifier)
            .field("project", &self.project)
            .field("scratch_path", &self.scratch_path)
            .finish()
    }
}

/// Parses a port value, falling back to the default when it is not a valid integer.
pub fn parse_port(raw: Option<&str>) -> std::result::Result<u16, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_PORT),
        Some(value) => value.parse::<u16>().map_err(|_| value.to_string()),
    }
}
