pub const CONNECTED_SENTINEL: &str = "ESP32_CONNECTED";
pub const SERVER_ACK: &str = "connection_successful";
pub const UNKNOWN_TIMESTAMP: &str = "unknown";

pub const CMD_AUTO_ON: &str = "AUTO_ON";
pub const CMD_AUTO_OFF: &str = "AUTO_OFF";
pub const CMD_LIGHT_ON: &str = "LIGHT_ON";
pub const CMD_LIGHT_OFF: &str = "LIGHT_OFF";
pub const CMD_FAN_ON: &str = "FAN_ON";
pub const CMD_FAN_OFF: &str = "FAN_OFF";
