#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;

use std::sync::Arc;

use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::{Config, StorageBackend};
use crate::data::memory::MemoryStore;
use crate::data::mongo::MongoStore;
use crate::data::store::StoreHandle;
use crate::error::{BackendError, ConfigurationError};
use crate::route::mount_api;
use crate::security::Security;
use crate::wizard::registry::SessionRegistry;

pub mod config;
pub mod context;
pub mod currency;
pub mod data;
pub mod error;
pub mod resp;
pub mod route;
pub mod security;
pub mod util;
pub mod wizard;

fn load_config() -> Result<Config, ConfigurationError> {
    tracing::info!("Loading configuration...");
    match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            Ok(c)
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            Ok(c)
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            Err(other)
        }
    }
}

/// Sets up logging, reads configuration and security files and connects to
/// the configured store.
pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    let config = load_config()?;

    tracing::info!("Initializing security information...");
    let security = Security::load(config.password_hash_cost)?;

    let store: StoreHandle = match config.storage {
        StorageBackend::MongoDb => Arc::new(
            MongoStore::connect(&config.mongodb_uri, &config.mongodb_db)
                .await
                .map_err(|e| {
                    tracing::error!("Unable to connect to MongoDB: {}", e);
                    e
                })?,
        ),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, nothing will be persisted.");
            Arc::new(MemoryStore::default())
        }
    };

    build(config, store, security)
}

/// Assembles the server around an already opened store.
pub fn build(
    config: Config,
    store: StoreHandle,
    security: Security,
) -> Result<Rocket<Build>, BackendError> {
    let tz = config.time_zone()?;
    tracing::info!("Lessons are scheduled in {}.", tz);

    let sessions = SessionRegistry::new(config.session_idle_timeout());

    tracing::info!("Setting up CORS...");
    let cors = rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::All,
        allowed_methods: vec![Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    let r = rocket::build()
        .manage(config)
        .manage(store)
        .manage(security)
        .manage(sessions)
        .attach(cors);

    Ok(mount_api(r))
}
