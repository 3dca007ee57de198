use embedded_hal::{delay::DelayNs, digital::OutputPin};
use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    clock::ClockSource,
    command,
    config::NodeConfig,
    context::NodeContext,
    protocol::CONNECTED_SENTINEL,
    sensor::SensorReader,
    telemetry,
    types::{ConnectivityState, TransportEvent},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("link is not connected")]
    NotConnected,
    #[error("wifi error: {0}")]
    Wifi(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Station-mode WiFi association.
pub trait WifiLink {
    fn is_connected(&self) -> bool;
    /// Re-issues association with the stored credentials. Does not wait for it.
    fn begin_connect(&mut self) -> Result<(), LinkError>;
}

/// Message socket to the server.
///
/// The driver reconnects on its own; the manager only observes the events it
/// reports and sends frames while it is up.
pub trait Transport {
    /// Next queued event, in arrival order.
    fn poll_event(&mut self) -> Option<TransportEvent>;
    fn is_connected(&self) -> bool;
    fn send_text(&mut self, text: &str) -> Result<(), LinkError>;
}

/// Cooperative scheduler for the node: WiFi upkeep, socket events, command
/// dispatch and interval-gated telemetry, all driven from one loop.
pub struct ConnectivityManager<W, T, D> {
    wifi: W,
    transport: T,
    delay: D,
    state: ConnectivityState,
    /// Set by the transport's connected event, cleared on disconnect or error.
    session_open: bool,
    send_interval_ms: u64,
    reconnect_settle_ms: u32,
    last_send_ms: u64,
}

impl<W, T, D> ConnectivityManager<W, T, D>
where
    W: WifiLink,
    T: Transport,
    D: DelayNs,
{
    pub fn new(config: &NodeConfig, wifi: W, transport: T, delay: D) -> Self {
        let state = if wifi.is_connected() {
            ConnectivityState::SocketConnecting
        } else {
            ConnectivityState::Disconnected
        };

        Self {
            wifi,
            transport,
            delay,
            state,
            session_open: false,
            send_interval_ms: config.telemetry.send_interval_ms,
            reconnect_settle_ms: u32::try_from(config.network.reconnect_settle_ms)
                .unwrap_or(u32::MAX),
            last_send_ms: 0,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn wifi_mut(&mut self) -> &mut W {
        &mut self.wifi
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Runs one loop iteration. Returns the telemetry frame if one was sent.
    ///
    /// Queued socket events are handled before the WiFi check, and both before
    /// the telemetry gate, so a command received this tick is visible in the
    /// frame sent on the same tick.
    pub fn tick<S, C, P>(
        &mut self,
        now_ms: u64,
        ctx: &mut NodeContext<P>,
        sensor: &mut S,
        clock: &C,
    ) -> Option<String>
    where
        S: SensorReader,
        C: ClockSource,
        P: OutputPin,
    {
        self.pump_events(ctx);
        self.maintain_wifi();

        if now_ms.saturating_sub(self.last_send_ms) < self.send_interval_ms {
            return None;
        }
        self.last_send_ms = now_ms;
        self.send_sensor_data(ctx, sensor, clock)
    }

    fn pump_events<P: OutputPin>(&mut self, ctx: &mut NodeContext<P>) {
        while let Some(event) = self.transport.poll_event() {
            match event {
                TransportEvent::Connected => {
                    info!("websocket connected");
                    self.session_open = true;
                    self.transition(ConnectivityState::SocketUp);
                    if let Err(err) = self.transport.send_text(CONNECTED_SENTINEL) {
                        warn!("failed to announce connection: {err}");
                    }
                }
                TransportEvent::Disconnected => {
                    warn!("websocket disconnected");
                    self.socket_down();
                }
                TransportEvent::Error(reason) => {
                    warn!("websocket error: {reason}");
                    self.socket_down();
                }
                TransportEvent::Text(text) => {
                    info!("received: {text}");
                    command::dispatch(ctx, &text);
                }
            }
        }
    }

    fn socket_down(&mut self) {
        self.session_open = false;
        if self.wifi.is_connected() {
            self.transition(ConnectivityState::SocketConnecting);
        } else {
            self.transition(ConnectivityState::Disconnected);
        }
    }

    fn maintain_wifi(&mut self) {
        if self.wifi.is_connected() {
            if self.state == ConnectivityState::Disconnected {
                self.transition(ConnectivityState::WifiUp);
                if self.session_open {
                    self.transition(ConnectivityState::SocketUp);
                } else {
                    self.transition(ConnectivityState::SocketConnecting);
                }
            }
            return;
        }

        self.transition(ConnectivityState::Disconnected);
        warn!("wifi disconnected; reconnecting");
        if let Err(err) = self.wifi.begin_connect() {
            warn!("wifi reconnect request failed: {err}");
        }
        self.delay.delay_ms(self.reconnect_settle_ms);
    }

    fn send_sensor_data<S, C, P>(
        &mut self,
        ctx: &NodeContext<P>,
        sensor: &mut S,
        clock: &C,
    ) -> Option<String>
    where
        S: SensorReader,
        C: ClockSource,
        P: OutputPin,
    {
        let reading = match sensor.read() {
            Ok(reading) => reading,
            Err(err) => {
                warn!("failed to read sensor: {err}");
                return None;
            }
        };

        let timestamp = clock.now();
        let frame = match telemetry::encode(&reading, &timestamp) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("failed to encode telemetry: {err}");
                return None;
            }
        };

        // Nothing goes out before the connection has been announced.
        if self.state != ConnectivityState::SocketUp {
            debug!("websocket not up; dropping telemetry frame");
            return None;
        }

        if let Err(err) = self.transport.send_text(&frame) {
            warn!("failed to send telemetry: {err}");
            return None;
        }

        info!("sent: {frame}");
        info!(
            "{}",
            telemetry::diagnostic_line(&reading, &timestamp, ctx.actuators.state())
        );
        Some(frame)
    }

    fn transition(&mut self, next: ConnectivityState) {
        if self.state != next {
            debug!("connectivity {} -> {}", self.state.as_str(), next.as_str());
            self.state = next;
        }
    }
}
