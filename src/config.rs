use crate::error::ConfigurationError;
use crate::util;
use chrono_tz::Tz;
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("controle_ebd".to_string())
}

fn default_storage() -> StorageBackend {
    match env::var("EBD_STORAGE").as_deref() {
        Ok("memory") => StorageBackend::Memory,
        _ => StorageBackend::MongoDb,
    }
}

fn default_public_content() -> PathBuf {
    PathBuf::from(env::var("PUBLIC_CONTENT_PATH").unwrap_or("./public".to_string()))
}

fn default_timezone() -> String {
    env::var("EBD_TIMEZONE").unwrap_or("America/Sao_Paulo".to_string())
}

fn default_store_timeout_secs() -> u64 {
    10
}

fn default_session_idle_minutes() -> u64 {
    60
}

#[cfg(debug_assertions)]
fn default_password_hash_cost() -> u32 {
    10
}
#[cfg(not(debug_assertions))]
fn default_password_hash_cost() -> u32 {
    12
}

/// Where documents are kept.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[serde(rename = "mongodb")]
    MongoDb,
    /// Volatile store, useful for demos and tests.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,
    #[serde(default = "default_storage")]
    pub storage: StorageBackend,

    #[serde(default = "default_public_content")]
    pub public_content: PathBuf,

    /// IANA name of the zone lessons are scheduled in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: u64,
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            storage: default_storage(),
            public_content: default_public_content(),
            timezone: default_timezone(),
            store_timeout_secs: default_store_timeout_secs(),
            session_idle_minutes: default_session_idle_minutes(),
            password_hash_cost: default_password_hash_cost(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        Self::load_from(config_dir())
    }

    pub fn load_from(dir: impl AsRef<Path>) -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            dir.as_ref(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(dir.as_ref().to_path_buf()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;
        config.time_zone()?;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = path.into();
        self
    }

    pub fn time_zone(&self) -> Result<Tz, ConfigurationError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigurationError::TimeZone(self.timezone.clone()))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs.max(1))
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_minutes.max(1) * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_configuration_loads_back() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let mut config = Config::default().with_file_path(dir.path().join("settings.yml"));
        config.storage = StorageBackend::Memory;
        config.timezone = "America/Manaus".to_string();
        config.save().expect("unable to save configuration");

        let loaded = Config::load_from(dir.path()).expect("unable to load configuration");
        assert_eq!(loaded.storage, StorageBackend::Memory);
        assert_eq!(loaded.timezone, "America/Manaus");
        assert_eq!(loaded.time_zone().unwrap(), chrono_tz::America::Manaus);
    }

    #[test]
    fn missing_keys_use_defaults() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        fs::write(dir.path().join("settings.yaml"), "storage: memory\n").unwrap();

        let loaded = Config::load_from(dir.path()).expect("unable to load configuration");
        assert_eq!(loaded.storage, StorageBackend::Memory);
        assert_eq!(loaded.store_timeout_secs, 10);
        assert_eq!(loaded.session_idle_minutes, 60);
    }

    #[test]
    fn unknown_time_zone_is_rejected() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        fs::write(dir.path().join("settings.yml"), "timezone: Mars/Olympus\n").unwrap();

        match Config::load_from(dir.path()) {
            Err(ConfigurationError::TimeZone(tz)) => assert_eq!(tz, "Mars/Olympus"),
            other => panic!("expected time zone error, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        assert!(matches!(
            Config::load_from(dir.path()),
            Err(ConfigurationError::NotFound(_))
        ));
    }
}
