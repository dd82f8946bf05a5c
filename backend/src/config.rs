//! Configuration management for the stock ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with SLE_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::OptimizationParams;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Which ledger store backs the engines
    pub store: StoreConfig,

    /// JWT verification configuration
    pub jwt: JwtConfig,

    pub logging: LoggingConfig,

    /// Tunables for the analytical engines
    pub engine: EngineSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret used to verify caller tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human readable ones
    pub json: bool,
}

/// Forecasting and optimisation tunables
#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    pub lead_time_days: u32,
    pub service_level_z: f64,
    pub demand_variability_factor: f64,
    /// Annual holding cost as a fraction of unit price
    pub holding_cost_rate: f64,
    pub optimization_top_n: usize,
    pub forecast_confidence: f64,
    /// Deadline for each analytical request, in milliseconds
    pub analytics_timeout_ms: u64,
}

impl EngineSettings {
    pub fn optimization_params(&self) -> OptimizationParams {
        OptimizationParams {
            service_level_z: self.service_level_z,
            lead_time_days: f64::from(self.lead_time_days),
            demand_variability_factor: self.demand_variability_factor,
            holding_cost_rate: self.holding_cost_rate,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lead_time_days: 7,
            service_level_z: 1.65,
            demand_variability_factor: 0.3,
            holding_cost_rate: 0.15,
            optimization_top_n: 20,
            forecast_confidence: 0.95,
            analytics_timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("SLE_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let engine = EngineSettings::default();

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("store.backend", "postgres")?
            .set_default("logging.json", false)?
            .set_default("engine.lead_time_days", i64::from(engine.lead_time_days))?
            .set_default("engine.service_level_z", engine.service_level_z)?
            .set_default("engine.demand_variability_factor", engine.demand_variability_factor)?
            .set_default("engine.holding_cost_rate", engine.holding_cost_rate)?
            .set_default("engine.optimization_top_n", engine.optimization_top_n as u64)?
            .set_default("engine.forecast_confidence", engine.forecast_confidence)?
            .set_default("engine.analytics_timeout_ms", engine.analytics_timeout_ms)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SLE_ prefix)
            .add_source(
                Environment::with_prefix("SLE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Configuration for tests and embedded use: in-memory store, default engine
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                min_connections: 0,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
            },
            jwt: JwtConfig {
                secret: jwt_secret.into(),
            },
            logging: LoggingConfig { json: false },
            engine: EngineSettings::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
