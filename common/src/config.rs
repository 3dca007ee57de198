use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_SERVER_HOST: &str = "flutteresp.onrender.com";
const MAX_UTC_OFFSET_SECS: i32 = 14 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("server path must start with `/` (got `{0}`)")]
    InvalidPath(String),
    #[error("utc offset {0}s is out of range")]
    InvalidUtcOffset(i32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    /// Blocking wait after re-issuing association from the main loop.
    pub reconnect_settle_ms: u64,
    /// Poll period while waiting for the first association at boot.
    pub connect_poll_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: option_env!("WIFI_SSID").unwrap_or("CHANGE_ME").to_string(),
            wifi_pass: option_env!("WIFI_PASS").unwrap_or("CHANGE_ME").to_string(),
            reconnect_settle_ms: 1_000,
            connect_poll_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
    pub missed_pong_tolerance: u8,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 15_000,
            pong_timeout_ms: 3_000,
            missed_pong_tolerance: 2,
        }
    }
}

impl HeartbeatConfig {
    /// Longest silence tolerated before the connection is declared dead.
    pub fn disconnect_after_ms(&self) -> u64 {
        let misses = u64::from(self.missed_pong_tolerance.max(1));
        self.ping_interval_ms
            .saturating_mul(misses - 1)
            .saturating_add(self.pong_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub use_tls: bool,
    pub reconnect_interval_ms: u64,
    pub heartbeat: HeartbeatConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: option_env!("WS_HOST")
                .unwrap_or(DEFAULT_SERVER_HOST)
                .to_string(),
            port: 443,
            path: "/".to_string(),
            use_tls: true,
            reconnect_interval_ms: 5_000,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        format!("{scheme}://{}:{}{}", self.host, self.port, self.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub ntp_servers: Vec<String>,
    pub utc_offset_secs: i32,
    pub initial_sync_wait_ms: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            ntp_servers: vec!["pool.ntp.org".to_string(), "time.nist.gov".to_string()],
            utc_offset_secs: -5 * 3600,
            initial_sync_wait_ms: 2_000,
        }
    }
}

impl TimeConfig {
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        if self.utc_offset_secs.abs() > MAX_UTC_OFFSET_SECS {
            return Err(ConfigError::InvalidUtcOffset(self.utc_offset_secs));
        }
        FixedOffset::east_opt(self.utc_offset_secs)
            .ok_or(ConfigError::InvalidUtcOffset(self.utc_offset_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub dht: i32,
    pub light_sensor: i32,
    pub relay_light: i32,
    pub relay_fan: i32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            dht: 25,
            light_sensor: 26,
            relay_light: 27,
            relay_fan: 14,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub send_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            send_interval_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub server: ServerConfig,
    pub time: TimeConfig,
    pub pins: PinConfig,
    pub telemetry: TelemetryConfig,
}

impl NodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.wifi_ssid.trim().is_empty() {
            return Err(ConfigError::Empty("network.wifi_ssid"));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Empty("server.host"));
        }
        if !self.server.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.server.path.clone()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Zero("server.port"));
        }
        if self.time.ntp_servers.is_empty() {
            return Err(ConfigError::Empty("time.ntp_servers"));
        }

        let intervals = [
            ("telemetry.send_interval_ms", self.telemetry.send_interval_ms),
            ("server.reconnect_interval_ms", self.server.reconnect_interval_ms),
            (
                "server.heartbeat.ping_interval_ms",
                self.server.heartbeat.ping_interval_ms,
            ),
            (
                "server.heartbeat.pong_timeout_ms",
                self.server.heartbeat.pong_timeout_ms,
            ),
            ("network.connect_poll_ms", self.network.connect_poll_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }

        self.time.utc_offset()?;
        Ok(())
    }

    /// True when WiFi credentials were provided at build time or by a config file.
    pub fn has_station_credentials(&self) -> bool {
        let ssid = self.network.wifi_ssid.trim();
        !ssid.is_empty() && ssid != "CHANGE_ME"
    }
}
