//! Communication configuration
//!
//! Loaded from TOML. Every section and field has a default, so an empty file
//! yields a serial link on `/dev/ttyUSB0` at 9600 baud with logging off.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decode::ParseMode;
use crate::error::{CommError, CommResult};
use crate::session_log::LogDetail;
use crate::transport::{PartialLinePolicy, TransportKind};

/// Top-level configuration for the communication core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommConfig {
    /// Transport opened by `start`
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub parse_mode: ParseMode,
    #[serde(default)]
    pub session_log: SessionLogConfig,
    /// YAML files merged over the built-in SPN table, in order
    #[serde(default)]
    pub spn_definitions: Vec<PathBuf>,
}

impl CommConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> CommResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CommError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> CommResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| CommError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall the worker or spin it
    pub fn validate(&self) -> CommResult<()> {
        if self.transport == TransportKind::Mock {
            return Err(CommError::Config(
                "transport must be serial, network or log_replay".into(),
            ));
        }
        let intervals = [
            ("replay.interval_ms", self.replay.interval_ms),
            ("keepalive.interval_ms", self.keepalive.interval_ms),
            ("health.interval_ms", self.health.interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(CommError::Config(format!("{} must be greater than 0", name)));
            }
        }
        if self.serial.baud_rate == 0 {
            return Err(CommError::Config("serial.baud_rate must be greater than 0".into()));
        }
        if self.keepalive.enabled && self.keepalive.sentinel.is_empty() {
            return Err(CommError::Config("keepalive.sentinel must not be empty".into()));
        }
        Ok(())
    }
}

/// Serial/USB link settings (always 8 data bits, no parity, one stop bit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port identifier (e.g., "/dev/ttyUSB0", "COM3")
    #[serde(default = "default_serial_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// A read that sees no bytes for this long yields no line
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    #[serde(default)]
    pub partial_lines: PartialLinePolicy,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout(),
            partial_lines: PartialLinePolicy::default(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn default_serial_port() -> String {
    if cfg!(windows) {
        "COM1".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_read_timeout() -> u64 {
    1000
}

/// Network stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// `host:port` of the line-oriented feed
    #[serde(default = "default_network_address")]
    pub address: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    #[serde(default)]
    pub partial_lines: PartialLinePolicy,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: default_network_address(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
            partial_lines: PartialLinePolicy::default(),
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn default_network_address() -> String {
    "127.0.0.1:4001".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

/// Log replay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Recorded session file
    #[serde(default = "default_replay_path")]
    pub path: PathBuf,
    /// Delay between replayed lines
    #[serde(default = "default_replay_interval")]
    pub interval_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: default_replay_path(),
            interval_ms: default_replay_interval(),
        }
    }
}

impl ReplayConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_replay_path() -> PathBuf {
    PathBuf::from("j1939log.vms")
}

fn default_replay_interval() -> u64 {
    100
}

/// Keepalive sent to live links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_keepalive_interval")]
    pub interval_ms: u64,
    /// Bytes written on every keepalive
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_keepalive_interval(),
            sentinel: default_sentinel(),
        }
    }
}

impl KeepaliveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_keepalive_interval() -> u64 {
    10_000
}

fn default_sentinel() -> String {
    "V".to_string()
}

/// Stall detection for live links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_health_interval")]
    pub interval_ms: u64,
    /// Close and reopen the source when a stall is detected
    #[serde(default)]
    pub auto_reconnect: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_health_interval(),
            auto_reconnect: false,
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_health_interval() -> u64 {
    5000
}

/// Session log settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub detail: LogDetail,
}

impl Default for SessionLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            detail: LogDetail::default(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("session.vms")
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CommConfig::from_toml("").unwrap();
        assert_eq!(config, CommConfig::default());
        assert_eq!(config.transport, TransportKind::Serial);
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.keepalive.interval(), Duration::from_secs(10));
        assert_eq!(config.keepalive.sentinel, "V");
        assert_eq!(config.health.interval(), Duration::from_secs(5));
        assert!(!config.health.auto_reconnect);
        assert_eq!(config.replay.interval(), Duration::from_millis(100));
        assert!(!config.session_log.enabled);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
transport = "log_replay"
parse_mode = "ignore_1708"
spn_definitions = ["fleet.yaml"]

[serial]
port = "/dev/ttyACM0"
partial_lines = "discard"

[network]
address = "10.0.0.5:5000"

[replay]
path = "drive.vms"
interval_ms = 20

[health]
auto_reconnect = true

[session_log]
enabled = true
path = "out.vms"
detail = "full"
"#;
        let config = CommConfig::from_toml(toml).unwrap();
        assert_eq!(config.transport, TransportKind::LogReplay);
        assert_eq!(config.parse_mode, ParseMode::Ignore1708);
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.partial_lines, PartialLinePolicy::Discard);
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.network.address, "10.0.0.5:5000");
        assert_eq!(config.replay.path, PathBuf::from("drive.vms"));
        assert_eq!(config.replay.interval_ms, 20);
        assert!(config.health.auto_reconnect);
        assert!(config.health.enabled);
        assert_eq!(config.session_log.detail, LogDetail::Full);
        assert_eq!(config.spn_definitions, vec![PathBuf::from("fleet.yaml")]);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = CommConfig::from_toml("[replay]\ninterval_ms = 0\n").unwrap_err();
        assert!(matches!(err, CommError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_transport() {
        assert!(CommConfig::from_toml("transport = \"carrier_pigeon\"").is_err());

        let err = CommConfig::from_toml("transport = \"mock\"").unwrap_err();
        assert!(matches!(err, CommError::Config(_)));
        let config = CommConfig {
            transport: TransportKind::Mock,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vmsd.toml");
        std::fs::write(&path, "transport = \"network\"\n").unwrap();

        let config = CommConfig::load(&path).unwrap();
        assert_eq!(config.transport, TransportKind::Network);

        assert!(CommConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
