//! Command-line flags (each with an environment fallback) and their resolution
//! into validated settings.

use clap::{Parser, ValueEnum};
use expirer_core::domain::parse_go_duration;
use expirer_core::impls::firestore::DEFAULT_DATABASE;
use expirer_core::impls::{FirestoreAuth, FirestoreConfig, RedisEndpoint};
use expirer_core::{ConfigError, ReconcilerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Extend the expiry of Firestore documents listed in a Redis set.
#[derive(Parser, Debug)]
#[command(name = "expirer", version, about, args_override_self = true)]
pub struct Args {
    /// GCP project ID
    #[arg(long, env = "PROJECT_ID")]
    pub project_id: Option<String>,

    /// Firestore database ID
    #[arg(long, env = "FIRESTORE_DATABASE", default_value = DEFAULT_DATABASE)]
    pub firestore_database: String,

    /// Firestore collection
    #[arg(long, env = "FIRESTORE_COLLECTION")]
    pub firestore_collection: Option<String>,

    /// Firestore expire key (timestamp field to extend)
    #[arg(long, env = "FIRESTORE_EXPIRE_KEY")]
    pub firestore_expire_key: Option<String>,

    /// Firestore emulator host (host:port); disables authentication
    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    pub firestore_emulator_host: Option<String>,

    /// OAuth access token; Application Default Credentials are used when omitted
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Redis address (host:port)
    #[arg(long, env = "REDIS_ADDR")]
    pub redis_addr: Option<String>,

    /// Redis user
    #[arg(long, env = "REDIS_USER")]
    pub redis_user: Option<String>,

    /// Redis password
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    /// Redis db
    #[arg(long, env = "REDIS_DB", default_value_t = 0)]
    pub redis_db: i64,

    /// Redis set key holding the document IDs to extend
    #[arg(long, env = "REDIS_SET_KEY")]
    pub redis_set_key: Option<String>,

    /// Expire increment, e.g. "30m" or "72h"
    #[arg(long, env = "EXPIRE_INCREMENT", default_value = "0")]
    pub expire_increment: String,

    /// Log level (RUST_LOG takes priority)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Everything needed to build the stores and the reconciler.
#[derive(Debug)]
pub struct Settings {
    pub reconciler: ReconcilerConfig,
    pub redis: RedisEndpoint,
    pub firestore: FirestoreConfig,
}

fn required(value: Option<String>, flag: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(flag))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl Args {
    /// Resolve and validate. Performs no I/O.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let project_id = required(self.project_id, "--project-id")?;
        let collection = required(self.firestore_collection, "--firestore-collection")?;
        let expire_field = required(self.firestore_expire_key, "--firestore-expire-key")?;
        let redis_addr = required(self.redis_addr, "--redis-addr")?;
        let key_set = required(self.redis_set_key, "--redis-set-key")?;
        let increment = parse_go_duration(&self.expire_increment)?;

        let reconciler = ReconcilerConfig::new(key_set, collection, expire_field, increment);
        reconciler.validate()?;

        let redis = RedisEndpoint {
            addr: redis_addr,
            username: non_empty(self.redis_user),
            password: non_empty(self.redis_password),
            db: self.redis_db,
        };
        redis.to_url()?;

        let firestore = match non_empty(self.firestore_emulator_host) {
            Some(host) => FirestoreConfig::emulator(project_id, &host),
            None => {
                let config = FirestoreConfig::new(project_id);
                match non_empty(self.access_token) {
                    Some(token) => config.with_auth(FirestoreAuth::Static(token)),
                    None => config,
                }
            }
        }
        .with_database(self.firestore_database);

        Ok(Settings {
            reconciler,
            redis,
            firestore,
        })
    }
}
