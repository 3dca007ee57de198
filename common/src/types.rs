#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Light,
    Fan,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "LIGHT",
            Self::Fan => "FAN",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorState {
    pub light: bool,
    pub fan: bool,
}

impl ActuatorState {
    pub fn get(&self, channel: Channel) -> bool {
        match channel {
            Channel::Light => self.light,
            Channel::Fan => self.fan,
        }
    }

    pub fn set(&mut self, channel: Channel, on: bool) {
        match channel {
            Channel::Light => self.light = on,
            Channel::Fan => self.fan = on,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    WifiUp,
    SocketConnecting,
    SocketUp,
}

impl ConnectivityState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::WifiUp => "WIFI_UP",
            Self::SocketConnecting => "SOCKET_CONNECTING",
            Self::SocketUp => "SOCKET_UP",
        }
    }
}

/// Event reported by a transport driver, drained once per loop tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Error(String),
    Text(String),
}
