pub mod actuator;
pub mod clock;
pub mod command;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod heartbeat;
pub mod protocol;
pub mod sensor;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod testing;

pub use actuator::ActuatorBank;
pub use clock::{ClockSource, SystemClock, Timestamp};
pub use command::{dispatch, Command};
pub use config::{ConfigError, NodeConfig};
pub use connectivity::{ConnectivityManager, LinkError, Transport, WifiLink};
pub use context::NodeContext;
pub use heartbeat::{Heartbeat, HeartbeatAction, ReconnectTimer};
pub use protocol::*;
pub use sensor::{ClimateSensor, HumiditySensor, SensorError, SensorReader, SensorReading};
pub use types::{ActuatorState, Channel, ConnectivityState, TransportEvent};
