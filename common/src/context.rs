use embedded_hal::digital::OutputPin;
use log::info;

use crate::actuator::ActuatorBank;

/// Mutable node state shared by the command interpreter and the telemetry path.
///
/// Owned by the single control loop; transports deliver their events to that
/// loop instead of touching this directly.
pub struct NodeContext<P> {
    pub actuators: ActuatorBank<P>,
    auto_mode: bool,
}

impl<P: OutputPin> NodeContext<P> {
    pub fn new(actuators: ActuatorBank<P>) -> Self {
        Self {
            actuators,
            auto_mode: false,
        }
    }

    /// Not consulted by any control logic yet.
    pub fn auto_mode(&self) -> bool {
        self.auto_mode
    }

    pub fn set_auto_mode(&mut self, enabled: bool) {
        self.auto_mode = enabled;
        if enabled {
            info!("automatic mode enabled");
        } else {
            info!("manual mode enabled");
        }
    }
}
