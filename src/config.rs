use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_secs(4);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub batteries: Vec<Battery>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Battery {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Battery {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub host: String,
    #[serde(default = "Config::default_port")]
    pub port: u16,
    pub name: Option<String>,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_read_timeout")]
    pub read_timeout: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_settle_time")]
    pub settle_time: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_connect_timeout")]
    pub connect_timeout: Duration,

    pub use_tcp_nodelay: Option<bool>,
}
impl Battery {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Name used in logs and output; falls back to `host:port`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn settle_time(&self) -> Duration {
        self.settle_time
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn use_tcp_nodelay(&self) -> bool {
        self.use_tcp_nodelay.unwrap_or(true)
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.batteries.is_empty() {
            bail!("at least one battery must be configured");
        }

        for (i, battery) in self.batteries.iter().enumerate() {
            if battery.enabled {
                if battery.host.is_empty() {
                    bail!("battery[{}].host cannot be empty", i);
                }
                if battery.port == 0 {
                    bail!("battery[{}].port must be between 1 and 65535", i);
                }
                if battery.read_timeout.is_zero() {
                    bail!("battery[{}].read_timeout must be at least 1 second", i);
                }
            }
        }

        Ok(())
    }

    /// Logged once the logger is up, since the config decides its level.
    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!(
            "  Batteries: {} configured, {} enabled",
            self.batteries.len(),
            self.enabled_batteries().len()
        );
        for (i, battery) in self.batteries.iter().enumerate() {
            info!("    Battery[{}]: {}", i, battery.label());
            info!("      Enabled: {}", battery.enabled);
            info!("      Host: {}", battery.host);
            info!("      Port: {}", battery.port);
            info!("      Read Timeout: {}s", battery.read_timeout.as_secs());
            info!("      Settle Time: {}s", battery.settle_time.as_secs());
            info!("      Connect Timeout: {}s", battery.connect_timeout.as_secs());
            info!("      TCP NoDelay: {}", battery.use_tcp_nodelay());
        }
        info!("  Log Level: {}", self.loglevel);
    }

    pub fn batteries(&self) -> &[Battery] {
        &self.batteries
    }

    pub fn enabled_batteries(&self) -> Vec<&Battery> {
        self.batteries.iter().filter(|b| b.enabled()).collect()
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    fn default_port() -> u16 {
        DEFAULT_PORT
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_read_timeout() -> Duration {
        DEFAULT_READ_TIMEOUT
    }

    fn default_settle_time() -> Duration {
        DEFAULT_SETTLE_TIME
    }

    fn default_connect_timeout() -> Duration {
        DEFAULT_CONNECT_TIMEOUT
    }
}
