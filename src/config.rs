//! JSON configuration.
//!
//! ```json
//! { "macs": ["AA:BB:CC:DD:EE:FF"], "servers": [{ "host": "127.0.0.1", "port": 9000 }] }
//! ```
//!
//! Every key is optional; missing keys take their default.

use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::{
    CONNECT_TIMEOUT_MS, DISPATCH_INTERVAL_MS, PRODUCT_FAMILY_TOKEN, SCAN_TIMEOUT_MS, SETTLE_MS,
};
use crate::selector::SelectionCriteria;

/// One outbound OSC receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Addresses or names to connect to, in dispatch-index order.
    /// Empty selects every device whose name contains `name_filter`.
    pub macs: Vec<String>,
    /// OSC receivers; every one gets every message.
    pub servers: Vec<ServerConfig>,
    /// Discovery window length.
    pub scan_timeout_ms: u64,
    /// Pause after connecting before the sensor is configured.
    pub settle_ms: u64,
    /// Sleep between dispatch passes.
    pub interval_ms: u64,
    /// Upper bound on one BLE connect.
    pub connect_timeout_ms: u64,
    /// Product-family substring used for automatic selection.
    pub name_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            macs: Vec::new(),
            servers: vec![
                ServerConfig::new("127.0.0.1", 8000),
                ServerConfig::new("127.0.0.1", 8001),
            ],
            scan_timeout_ms: SCAN_TIMEOUT_MS,
            settle_ms: SETTLE_MS,
            interval_ms: DISPATCH_INTERVAL_MS,
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            name_filter: PRODUCT_FAMILY_TOKEN.into(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load `path` when given; on any error log a warning and use the
    /// defaults.  Never fails.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Could not load config {}: {e}; falling back to defaults",
                    path.display()
                );
                Self::default()
            }
        }
    }

    pub fn selection(&self) -> SelectionCriteria {
        SelectionCriteria::from_list(&self.macs, &self.name_filter)
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert!(c.macs.is_empty());
        assert_eq!(
            c.servers,
            vec![ServerConfig::new("127.0.0.1", 8000), ServerConfig::new("127.0.0.1", 8001)]
        );
        assert_eq!(c.interval(), Duration::from_millis(100));
        assert_eq!(c.scan_window(), Duration::from_secs(10));
        assert_eq!(c.selection(), SelectionCriteria::default());
    }

    #[test]
    fn parses_macs_and_servers() {
        let c = Config::from_json(
            r#"{"macs":["AA:BB:CC:DD:EE:FF"], "servers":[{"host":"127.0.0.1","port":9000}]}"#,
        )
        .unwrap();
        assert_eq!(c.macs, vec!["AA:BB:CC:DD:EE:FF"]);
        assert_eq!(c.servers, vec![ServerConfig::new("127.0.0.1", 9000)]);
        assert_eq!(c.settle_ms, SETTLE_MS);
        assert_eq!(
            c.selection(),
            SelectionCriteria::AllowList(vec!["AA:BB:CC:DD:EE:FF".into()])
        );
    }

    #[test]
    fn optional_keys_override_defaults() {
        let c = Config::from_json(r#"{"interval_ms": 20, "name_filter": "MetaMotion"}"#).unwrap();
        assert_eq!(c.interval(), Duration::from_millis(20));
        assert_eq!(c.servers.len(), 2);
        assert_eq!(
            c.selection(),
            SelectionCriteria::Auto {
                token: "MetaMotion".into()
            }
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(Config::from_json("{ macs: "), Err(Error::Config(_))));
        assert!(matches!(
            Config::from_json(r#"{"servers":[{"host":"x","port":"nope"}]}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("metaosc-does-not-exist.json");
        assert!(matches!(Config::load(&path), Err(Error::Io(_))));
        assert_eq!(Config::load_or_default(Some(&path)), Config::default());
        assert_eq!(Config::load_or_default(None), Config::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("metaosc-bad-{}.json", std::process::id()));
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Config::load_or_default(Some(&path)), Config::default());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn valid_file_loads() {
        let path = std::env::temp_dir().join(format!("metaosc-ok-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"macs":[],"servers":[{"host":"10.0.0.2","port":7000}]}"#).unwrap();
        let c = Config::load_or_default(Some(&path));
        assert_eq!(c.servers, vec![ServerConfig::new("10.0.0.2", 7000)]);
        std::fs::remove_file(&path).ok();
    }
}
