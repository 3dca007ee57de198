use core::convert::TryInto;
use std::{
    sync::{mpsc, OnceLock},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use dht_sensor::dht11;
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::{
    delay::{Ets, FreeRtos},
    gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Input, InputOutput, Output, PinDriver, Pull},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    io::EspIOError,
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    sntp::{EspSntp, SntpConf},
    wifi::{BlockingWifi, EspWifi},
    ws::{
        client::{EspWebSocketClient, EspWebSocketClientConfig, WebSocketEvent, WebSocketEventType},
        FrameType,
    },
};
use log::{info, warn};

use climate_common::{
    config::{NetworkConfig, PinConfig, ServerConfig, TimeConfig},
    ActuatorBank, ClimateSensor, ClockSource, ConnectivityManager, HumiditySensor, LinkError,
    NodeConfig, NodeContext, SensorError, SystemClock, Transport, TransportEvent, WifiLink,
};

const WATCHDOG_TIMEOUT_SEC: u32 = 30;
const LOOP_IDLE: Duration = Duration::from_millis(10);
const SOCKET_SEND_TIMEOUT: Duration = Duration::from_secs(10);

type Relay = PinDriver<'static, AnyOutputPin, Output>;
type LightInput = PinDriver<'static, AnyInputPin, Input>;

struct Dht11Driver {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    delay: Ets,
}

impl Dht11Driver {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;
        Ok(Self { pin, delay: Ets })
    }
}

impl HumiditySensor for Dht11Driver {
    fn read_climate(&mut self) -> Result<(f32, f32), SensorError> {
        self.pin
            .set_high()
            .map_err(|err| SensorError::Bus(format!("failed to release DHT11 line: {err:?}")))?;

        let reading = dht11::blocking::read(&mut self.delay, &mut self.pin)
            .map_err(|err| SensorError::Bus(format!("{err:?}")))?;
        Ok((
            f32::from(reading.temperature),
            f32::from(reading.relative_humidity),
        ))
    }
}

struct StationLink {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl WifiLink for StationLink {
    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn begin_connect(&mut self) -> Result<(), LinkError> {
        self.wifi
            .wifi_mut()
            .connect()
            .map_err(|err| LinkError::Wifi(format!("{err:?}")))
    }
}

/// The IDF client runs its own task, reconnects on its own and reports back
/// through the event callback.
struct EspTransport {
    client: EspWebSocketClient<'static>,
    events: mpsc::Receiver<TransportEvent>,
}

impl Transport for EspTransport {
    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    fn send_text(&mut self, text: &str) -> Result<(), LinkError> {
        self.client
            .send(FrameType::Text(false), text.as_bytes())
            .map_err(|err| LinkError::Transport(format!("{err:?}")))
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let config = NodeConfig::default();
    config.validate().context("invalid node configuration")?;
    if !config.has_station_credentials() {
        warn!("wifi credentials were not set at build time; set WIFI_SSID and WIFI_PASS");
    }

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals { modem, .. } = Peripherals::take()?;

    let (light_relay, fan_relay) = init_relays(&config.pins)?;
    let mut ctx = NodeContext::new(ActuatorBank::new(light_relay, fan_relay));
    let mut sensor = init_sensor(&config.pins).context("failed to initialize sensors")?;

    let wifi = connect_wifi(modem, sys_loop, nvs_partition, &config.network)
        .context("wifi startup failed")?;
    disable_wifi_power_save();

    let clock = SystemClock::new(config.time.utc_offset()?);
    let _sntp = start_sntp(&config.time)?;
    thread::sleep(Duration::from_millis(config.time.initial_sync_wait_ms));
    let boot_time = clock.now();
    if boot_time.is_synced() {
        info!("time synchronized: {boot_time}");
    } else {
        warn!("time not synchronized yet; telemetry will report an unknown timestamp");
    }

    let transport = connect_socket(&config.server).context("failed to start websocket client")?;
    info!("websocket client started for {}", config.server.url());

    let mut manager =
        ConnectivityManager::new(&config, StationLink { wifi }, transport, FreeRtos);

    init_watchdog(WATCHDOG_TIMEOUT_SEC)?;
    add_current_task_to_watchdog()?;

    loop {
        feed_watchdog();
        manager.tick(monotonic_ms(), &mut ctx, &mut sensor, &clock);
        thread::sleep(LOOP_IDLE);
    }
}

fn init_relays(pins: &PinConfig) -> anyhow::Result<(Relay, Relay)> {
    let light = unsafe { PinDriver::output(AnyOutputPin::new(pins.relay_light)) }
        .with_context(|| format!("failed to claim light relay GPIO{}", pins.relay_light))?;
    let fan = unsafe { PinDriver::output(AnyOutputPin::new(pins.relay_fan)) }
        .with_context(|| format!("failed to claim fan relay GPIO{}", pins.relay_fan))?;
    Ok((light, fan))
}

fn init_sensor(pins: &PinConfig) -> anyhow::Result<ClimateSensor<Dht11Driver, LightInput>> {
    let dht = Dht11Driver::new(unsafe { AnyIOPin::new(pins.dht) })
        .with_context(|| format!("failed to claim DHT11 GPIO{}", pins.dht))?;
    let light = unsafe { PinDriver::input(AnyInputPin::new(pins.light_sensor)) }
        .with_context(|| format!("failed to claim light sensor GPIO{}", pins.light_sensor))?;
    Ok(ClimateSensor::new(dht, light))
}

/// Blocks until the station is associated and has an address.
fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;

    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("connecting to wifi `{}`", network.wifi_ssid);

    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => break,
            Err(err) => {
                if attempt % 10 == 1 {
                    warn!("wifi not up yet (attempt {attempt}): {err:#}");
                }
                thread::sleep(Duration::from_millis(network.connect_poll_ms));
            }
        }
    }

    let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
    info!("wifi connected, ip {}", ip_info.ip);
    Ok(wifi)
}

fn start_sntp(time: &TimeConfig) -> anyhow::Result<EspSntp<'static>> {
    let mut conf = SntpConf::default();
    for (slot, server) in conf.servers.iter_mut().zip(&time.ntp_servers) {
        *slot = server.as_str();
    }

    let sntp = EspSntp::new(&conf).context("failed to start SNTP")?;
    info!("SNTP started with {:?}", time.ntp_servers);
    Ok(sntp)
}

fn connect_socket(server: &ServerConfig) -> anyhow::Result<EspTransport> {
    let heartbeat = &server.heartbeat;
    let config = EspWebSocketClientConfig {
        reconnect_timeout_ms: Duration::from_millis(server.reconnect_interval_ms),
        ping_interval_sec: Duration::from_millis(heartbeat.ping_interval_ms),
        pingpong_timeout_sec: Duration::from_millis(heartbeat.disconnect_after_ms()),
        crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
        ..Default::default()
    };

    let (tx, events) = mpsc::channel();
    let client = EspWebSocketClient::new(&server.url(), &config, SOCKET_SEND_TIMEOUT, move |event| {
        forward_event(&tx, event)
    })?;

    Ok(EspTransport { client, events })
}

fn forward_event(tx: &mpsc::Sender<TransportEvent>, event: &Result<WebSocketEvent, EspIOError>) {
    let mapped = match event {
        Ok(event) => match event.event_type {
            WebSocketEventType::Connected => TransportEvent::Connected,
            WebSocketEventType::Disconnected | WebSocketEventType::Closed => {
                TransportEvent::Disconnected
            }
            WebSocketEventType::Text(text) => TransportEvent::Text(text.to_string()),
            _ => return,
        },
        Err(err) => TransportEvent::Error(format!("{err:?}")),
    };

    // The receiver lives as long as the main loop.
    let _ = tx.send(mapped);
}

fn init_watchdog(timeout_sec: u32) -> anyhow::Result<()> {
    let config = esp_idf_svc::sys::esp_task_wdt_config_t {
        timeout_ms: timeout_sec.saturating_mul(1000),
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_init failed with code {}", rc))
}

fn add_current_task_to_watchdog() -> anyhow::Result<()> {
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_add failed with code {}", rc))
}

fn feed_watchdog() {
    let _ = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
}

fn disable_wifi_power_save() {
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(0) };
    if rc == esp_idf_svc::sys::ESP_OK {
        info!("wifi power save disabled");
    } else {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
