//! Environment-variable configuration loading.
//!
//! Spec's environment surface is a handful of flat vars — no layered YAML
//! merge is needed here, unlike the teacher's backtest config loader.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_USERS_URL: &str = "USERS_URL";
pub const ENV_PAYMENTS_URL: &str = "PAYMENTS_URL";
pub const ENV_FLIGHTS_URL: &str = "FLIGHTS_URL";
pub const ENV_TESTING: &str = "TESTING";
pub const ENV_WORKER_COUNT: &str = "WORKER_COUNT";
pub const ENV_DOWNSTREAM_TIMEOUT_SECS: &str = "DOWNSTREAM_TIMEOUT_SECS";
pub const ENV_DAEMON_ADDR: &str = "TD_DAEMON_ADDR";

const DEFAULT_WORKER_COUNT: usize = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Base URLs for the three fixed downstream services.
#[derive(Debug, Clone)]
pub struct DownstreamConfig {
    pub user: Url,
    pub payment: Url,
    pub flight: Url,
}

impl DownstreamConfig {
    pub fn base_for(&self, service: td_schemas::Service) -> &Url {
        match service {
            td_schemas::Service::User => &self.user,
            td_schemas::Service::Payment => &self.payment,
            td_schemas::Service::Flight => &self.flight,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self {
            user: parse_url_env(ENV_USERS_URL)?,
            payment: parse_url_env(ENV_PAYMENTS_URL)?,
            flight: parse_url_env(ENV_FLIGHTS_URL)?,
        })
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub database_url: String,
    pub downstream: DownstreamConfig,
    pub worker_count: usize,
    pub downstream_timeout: Duration,
    pub bind_addr: SocketAddr,
    /// `TESTING=1` disables schema migration and worker spawning at boot.
    pub testing: bool,
}

impl DaemonConfig {
    /// Load `.env.local` if present (silent if missing — production injects
    /// env vars directly), then read every variable from the environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");

        let database_url =
            std::env::var(ENV_DATABASE_URL).with_context(|| format!("missing env var {ENV_DATABASE_URL}"))?;
        let downstream = DownstreamConfig::from_env()?;
        let worker_count = match std::env::var(ENV_WORKER_COUNT) {
            Ok(v) => v
                .parse()
                .with_context(|| format!("invalid {ENV_WORKER_COUNT}: {v}"))?,
            Err(_) => DEFAULT_WORKER_COUNT,
        };
        let downstream_timeout = match std::env::var(ENV_DOWNSTREAM_TIMEOUT_SECS) {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("invalid {ENV_DOWNSTREAM_TIMEOUT_SECS}: {v}"))?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        let bind_addr = match std::env::var(ENV_DAEMON_ADDR) {
            Ok(v) => v
                .parse()
                .with_context(|| format!("invalid {ENV_DAEMON_ADDR}: {v}"))?,
            Err(_) => DEFAULT_ADDR.parse().expect("default addr is valid"),
        };
        let testing = std::env::var(ENV_TESTING)
            .map(|v| v == "1")
            .unwrap_or(false);

        Ok(Self {
            database_url,
            downstream,
            worker_count,
            downstream_timeout,
            bind_addr,
            testing,
        })
    }
}

fn parse_url_env(name: &str) -> Result<Url> {
    let raw = std::env::var(name).with_context(|| format!("missing env var {name}"))?;
    Url::parse(&raw).with_context(|| format!("invalid URL in {name}: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes env-var mutation across tests in this module; std::env is
    // process-global and these tests run in the same binary.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn downstream_config_requires_all_three_urls() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var(ENV_USERS_URL);
        std::env::remove_var(ENV_PAYMENTS_URL);
        std::env::remove_var(ENV_FLIGHTS_URL);

        let err = DownstreamConfig::from_env().unwrap_err();
        assert!(err.to_string().contains(ENV_USERS_URL));
    }

    #[test]
    fn downstream_config_parses_valid_urls() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(ENV_USERS_URL, "https://users.example.com");
        std::env::set_var(ENV_PAYMENTS_URL, "https://payments.example.com");
        std::env::set_var(ENV_FLIGHTS_URL, "https://flights.example.com");

        let cfg = DownstreamConfig::from_env().unwrap();
        assert_eq!(cfg.user.as_str(), "https://users.example.com/");
        assert_eq!(cfg.payment.as_str(), "https://payments.example.com/");
        assert_eq!(cfg.flight.as_str(), "https://flights.example.com/");

        std::env::remove_var(ENV_USERS_URL);
        std::env::remove_var(ENV_PAYMENTS_URL);
        std::env::remove_var(ENV_FLIGHTS_URL);
    }

    #[test]
    fn worker_count_defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var(ENV_WORKER_COUNT);
        std::env::set_var(ENV_USERS_URL, "https://u.example.com");
        std::env::set_var(ENV_PAYMENTS_URL, "https://p.example.com");
        std::env::set_var(ENV_FLIGHTS_URL, "https://f.example.com");
        std::env::set_var(ENV_DATABASE_URL, "postgres://localhost/test");

        let cfg = DaemonConfig::load().unwrap();
        assert_eq!(cfg.worker_count, DEFAULT_WORKER_COUNT);
        assert!(!cfg.testing);

        std::env::remove_var(ENV_USERS_URL);
        std::env::remove_var(ENV_PAYMENTS_URL);
        std::env::remove_var(ENV_FLIGHTS_URL);
        std::env::remove_var(ENV_DATABASE_URL);
    }
}
