use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};

const DEFAULT_ETHERSCAN_API_URL: &str = "https://api.etherscan.io/api";

/// Connection parameters shared by the Postgres and Mongo stores.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

#[derive(Debug, Clone)]
pub struct OpenSeaConfig {
    pub base_url: String,
    pub version: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct EtherscanConfig {
    pub api_url: String,
    pub api_key: String,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct EventsConfig {
    /// Contract to follow; the event job only runs when this is set.
    pub contract_address: Option<String>,
    pub poll_interval: Duration,
    pub rate_limit: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub postgres: DatabaseConfig,
    pub mongo: DatabaseConfig,
    pub opensea: OpenSeaConfig,
    pub etherscan: EtherscanConfig,
    pub events: EventsConfig,
    pub app: AppConfig,
}

impl Config {
    /// Loads configuration from the process environment. `.env` is expected
    /// to have been applied with `dotenvy` beforehand.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Lookup(lookup);

        let postgres = DatabaseConfig {
            host: vars.required("PG_HOST")?,
            port: vars.port("PG_PORT")?,
            user: vars.required("PG_USER")?,
            password: vars.required("PG_PASS")?,
            dbname: vars.required("PG_DATABASE")?,
        };

        let mongo = DatabaseConfig {
            host: vars.required("MONGO_HOST")?,
            port: vars.port("MONGO_PORT")?,
            user: vars.required("MONGO_USER")?,
            password: vars.required("MONGO_PASS")?,
            dbname: vars.required("MONGO_DATABASE")?,
        };

        let opensea = OpenSeaConfig {
            base_url: vars.required("OPENSEA_API_BASE_URL")?,
            version: vars.required("OPENSEA_API_VERSION")?,
            api_key: vars.required("OPENSEA_API_KEY")?,
        };

        let etherscan = EtherscanConfig {
            api_url: vars.optional("ETHERSCAN_API_URL", DEFAULT_ETHERSCAN_API_URL),
            api_key: vars.required("ETHERSCAN_API_KEY")?,
            poll_interval: vars.seconds("GAS_POLL_INTERVAL_SECS", 5.0)?,
        };

        let events = EventsConfig {
            contract_address: vars.get("EVENTS_CONTRACT_ADDRESS"),
            poll_interval: vars.seconds("EVENTS_POLL_INTERVAL_SECS", 60.0)?,
            rate_limit: vars.millis("EVENTS_RATE_LIMIT_MS", 300)?,
        };

        let app = AppConfig {
            host: vars.optional("APP_HOST", "0.0.0.0"),
            port: match vars.get("APP_PORT") {
                Some(_) => vars.port("APP_PORT")?,
                None => 8081,
            },
            name: vars.optional("APP_NAME", "chain-scraper"),
        };

        Ok(Self {
            postgres,
            mongo,
            opensea,
            etherscan,
            events,
            app,
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> AppResult<String> {
        self.get(key)
            .ok_or_else(|| AppError::Config(format!("missing configuration key {}", key)))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn port(&self, key: &str) -> AppResult<u16> {
        let raw = self.required(key)?;
        raw.trim()
            .parse::<u16>()
            .map_err(|_| AppError::Config(format!("{} is not a valid port: {}", key, raw)))
    }

    fn seconds(&self, key: &str, default: f64) -> AppResult<Duration> {
        let secs = match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| AppError::Config(format!("{} is not a number: {}", key, raw)))?,
            None => default,
        };
        if !secs.is_finite() || secs <= 0.0 {
            return Err(AppError::Config(format!("{} must be positive", key)));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| AppError::Config(format!("{} is out of range: {}", key, e)))
    }

    fn millis(&self, key: &str, default: u64) -> AppResult<Duration> {
        let millis = match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| AppError::Config(format!("{} is not a number: {}", key, raw)))?,
            None => default,
        };
        Ok(Duration::from_millis(millis))
    }
}
