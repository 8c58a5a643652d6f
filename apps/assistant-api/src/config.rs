//! Configuration for the Assistant API

use core_config::database::DatabaseConfig;
use core_config::llm::LlmConfig;
use core_config::server::ServerConfig;
use core_config::{AppInfo, FromEnv};

pub use core_config::Environment;

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub server: ServerConfig,
    pub environment: Environment,
    /// Absent when DATABASE_URL is unset; the service then runs on the
    /// in-memory catalog.
    pub database: Option<DatabaseConfig>,
    /// Absent when GROQ_API_KEY is unset; free-text interpretation and
    /// Q&A are then disabled.
    pub llm: Option<LlmConfig>,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?;

        let database = if std::env::var("DATABASE_URL").is_ok() {
            Some(DatabaseConfig::from_env()?)
        } else {
            None
        };

        let llm = if std::env::var("GROQ_API_KEY").is_ok() {
            Some(LlmConfig::from_env()?)
        } else {
            None
        };

        Ok(Self {
            app: AppInfo::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            server,
            environment,
            database,
            llm,
        })
    }
}
