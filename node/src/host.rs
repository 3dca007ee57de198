use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc as std_mpsc, Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin},
};
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use climate_common::{
    config::{HeartbeatConfig, ServerConfig},
    ActuatorBank, Channel, ClimateSensor, ConnectivityManager, Heartbeat, HeartbeatAction,
    HumiditySensor, LinkError, NodeConfig, NodeContext, ReconnectTimer, SensorError, SystemClock,
    Transport, TransportEvent, WifiLink,
};

const LOOP_IDLE: Duration = Duration::from_millis(10);
const HEARTBEAT_POLL: Duration = Duration::from_millis(250);

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config()?;
    let url = std::env::var("WS_URL").unwrap_or_else(|_| config.server.url());

    let (event_tx, event_rx) = std_mpsc::channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let connected = Arc::new(AtomicBool::new(false));

    tokio::spawn(run_socket(
        url,
        config.server.clone(),
        event_tx,
        outbound_rx,
        connected.clone(),
    ));

    let transport = BridgeTransport {
        events: event_rx,
        outbound: outbound_tx,
        connected,
    };
    spawn_node_loop(config, transport)?;

    info!("simulated climate node started");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");
    Ok(())
}

fn load_config() -> anyhow::Result<NodeConfig> {
    let config = match std::env::var("NODE_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read node config `{path}`"))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse node config `{path}`"))?
        }
        Err(_) => NodeConfig::default(),
    };

    config.validate().context("invalid node configuration")?;
    Ok(config)
}

fn spawn_node_loop(config: NodeConfig, transport: BridgeTransport) -> anyhow::Result<()> {
    let offset = config.time.utc_offset()?;

    thread::Builder::new()
        .name("node-loop".into())
        .spawn(move || {
            let mut ctx = NodeContext::new(ActuatorBank::new(
                LoggedRelay::new(Channel::Light),
                LoggedRelay::new(Channel::Fan),
            ));
            let mut sensor =
                ClimateSensor::new(SimulatedClimate::default(), SimulatedLightPin::default());
            let clock = SystemClock::new(offset);
            let mut manager = ConnectivityManager::new(&config, HostLink, transport, StdDelay);

            let start = Instant::now();
            loop {
                let now_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
                manager.tick(now_ms, &mut ctx, &mut sensor, &clock);
                thread::sleep(LOOP_IDLE);
            }
        })
        .context("failed to spawn node loop")?;

    Ok(())
}

enum SessionEnd {
    Dropped(String),
    Shutdown,
}

/// Owns the socket: connects, re-dials at a fixed interval and runs the
/// ping/pong heartbeat. Everything the node loop needs arrives as events.
async fn run_socket(
    url: String,
    server: ServerConfig,
    events: std_mpsc::Sender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
) {
    let start = Instant::now();
    let mut timer = ReconnectTimer::new(server.reconnect_interval_ms);

    loop {
        let wait_ms = timer.remaining_ms(elapsed_ms(start));
        if wait_ms > 0 {
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }
        timer.mark_attempt(elapsed_ms(start));

        debug!("dialing {url}");
        let stream = match connect_async(url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(err) => {
                let _ = events.send(TransportEvent::Error(err.to_string()));
                continue;
            }
        };

        while outbound.try_recv().is_ok() {}
        let _ = events.send(TransportEvent::Connected);
        connected.store(true, Ordering::Relaxed);

        let end = drive_session(stream, &server.heartbeat, &events, &mut outbound, start).await;
        connected.store(false, Ordering::Relaxed);

        match end {
            SessionEnd::Dropped(reason) => {
                debug!("websocket session ended: {reason}");
                let _ = events.send(TransportEvent::Disconnected);
            }
            SessionEnd::Shutdown => return,
        }
    }
}

async fn drive_session(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    heartbeat: &HeartbeatConfig,
    events: &std_mpsc::Sender<TransportEvent>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    start: Instant,
) -> SessionEnd {
    let (mut sink, mut source) = stream.split();
    let mut liveness = Heartbeat::new(heartbeat.clone(), elapsed_ms(start));
    let mut ticker = tokio::time::interval(HEARTBEAT_POLL);

    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if events.send(TransportEvent::Text(text)).is_err() {
                        return SessionEnd::Shutdown;
                    }
                }
                Some(Ok(Message::Pong(_))) => liveness.on_pong(),
                Some(Ok(Message::Close(frame))) => {
                    return SessionEnd::Dropped(format!("closed by server: {frame:?}"));
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return SessionEnd::Dropped(format!("read failed: {err}")),
                None => return SessionEnd::Dropped("stream ended".to_string()),
            },
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        return SessionEnd::Dropped(format!("write failed: {err}"));
                    }
                }
                None => return SessionEnd::Shutdown,
            },
            _ = ticker.tick() => match liveness.poll(elapsed_ms(start)) {
                HeartbeatAction::Idle => {}
                HeartbeatAction::SendPing => {
                    if let Err(err) = sink.send(Message::Ping(Vec::new())).await {
                        return SessionEnd::Dropped(format!("ping failed: {err}"));
                    }
                }
                HeartbeatAction::Reconnect => {
                    warn!("no pong after {} missed pings", liveness.missed());
                    return SessionEnd::Dropped("heartbeat timed out".to_string());
                }
            },
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}

/// Node-loop side of the socket task.
struct BridgeTransport {
    events: std_mpsc::Receiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
}

impl Transport for BridgeTransport {
    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Frames queued between sessions are discarded when the next one opens.
    fn send_text(&mut self, text: &str) -> Result<(), LinkError> {
        self.outbound
            .send(text.to_string())
            .map_err(|_| LinkError::Transport("socket task stopped".to_string()))
    }
}

/// The host network is assumed to be up.
struct HostLink;

impl WifiLink for HostLink {
    fn is_connected(&self) -> bool {
        true
    }

    fn begin_connect(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

struct LoggedRelay {
    channel: Channel,
}

impl LoggedRelay {
    fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

impl ErrorType for LoggedRelay {
    type Error = Infallible;
}

impl OutputPin for LoggedRelay {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        debug!("{} relay pin low", self.channel.as_str());
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        debug!("{} relay pin high", self.channel.as_str());
        Ok(())
    }
}

/// Slowly drifting readings with a periodic dropout, like a flaky DHT11.
#[derive(Default)]
struct SimulatedClimate {
    tick: u64,
}

impl HumiditySensor for SimulatedClimate {
    fn read_climate(&mut self) -> Result<(f32, f32), SensorError> {
        self.tick = self.tick.saturating_add(1);
        if self.tick % 20 == 0 {
            return Ok((f32::NAN, f32::NAN));
        }

        let temperature = 22.0 + ((self.tick % 8) as f32 * 0.3);
        let humidity = 55.0 + ((self.tick % 6) as f32 * 0.7);
        Ok((temperature, humidity))
    }
}

/// Flips between bright and dark every ten reads.
#[derive(Default)]
struct SimulatedLightPin {
    reads: u64,
}

impl ErrorType for SimulatedLightPin {
    type Error = Infallible;
}

impl InputPin for SimulatedLightPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.reads = self.reads.saturating_add(1);
        Ok((self.reads / 10) % 2 == 1)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}
