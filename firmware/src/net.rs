//! WiFi station and HTTP transport
//!
//! Brings up esp-radio and the embassy-net stack, joins the configured
//! network with a per-attempt timeout and runs the core HTTP client over an
//! embassy-net TCP socket.

use core::time::Duration as CoreDuration;

use embassy_executor::{SpawnError, Spawner};
use embassy_net::{dns::DnsQueryType, tcp::TcpSocket, Runner, Stack, StackResources};
use embassy_time::{with_timeout, Duration, Timer};
use esp_hal::peripherals::WIFI;
use esp_radio::{
    Controller,
    wifi::{ClientConfig, Config as WifiConfig, ModeConfig, WifiController, WifiDevice, WifiError},
};
use log::{info, warn};
use spectra_frame_core::config::{Config, ConfigError};
use spectra_frame_core::cycle::Link;
use spectra_frame_core::download::BodySink;
use spectra_frame_core::http::{self, HttpError, Method, Request, Response, Url};

// When you are okay with using a nightly compiler it's better to use https://docs.rs/static_cell/2.1.0/static_cell/macro.make_static.html
macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

/// Socket-level inactivity timeout; the request timeout bounds the total
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
const TCP_RX_BUF_SIZE: usize = 4096;
const TCP_TX_BUF_SIZE: usize = 1024;
/// Response headers
const HEADER_BUF_SIZE: usize = 2048;

#[derive(Debug)]
pub enum LinkError {
    Radio(esp_radio::InitializationError),
    Wifi(WifiError),
    Config(ConfigError),
    /// Network runner task could not be started
    Spawn(SpawnError),
    /// No association or no DHCP lease in time
    Timeout,
}

fn to_embassy(duration: CoreDuration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

/// WiFi station plus network stack
pub struct WifiLink {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    server: Url<'static>,
    ssid: &'static str,
    password: &'static str,
    attempt_timeout: Duration,
}

impl WifiLink {
    /// Initialize the radio and spawn the network runner.
    /// Association happens in [`Link::join`].
    pub fn new(
        spawner: Spawner,
        wifi: WIFI<'static>,
        seed: u64,
        config: &Config<'static>,
    ) -> Result<Self, LinkError> {
        let server = config.server().map_err(LinkError::Config)?;

        info!("Initializing WiFi...");
        let ctrl = esp_radio::init().map_err(LinkError::Radio)?;
        let ctrl = mk_static!(Controller<'static>, ctrl);

        let (controller, ifaces) =
            esp_radio::wifi::new(ctrl, wifi, WifiConfig::default()).map_err(LinkError::Wifi)?;

        let net_config = embassy_net::Config::dhcpv4(Default::default());
        let (stack, runner) = embassy_net::new(
            ifaces.sta,
            net_config,
            mk_static!(StackResources<3>, StackResources::<3>::new()),
            seed,
        );
        spawner.spawn(net_task(runner)).map_err(LinkError::Spawn)?;

        Ok(Self {
            controller,
            stack,
            server,
            ssid: config.wifi_ssid,
            password: config.wifi_password,
            attempt_timeout: to_embassy(config.wifi_attempt_timeout),
        })
    }

    async fn associate(&mut self) -> Result<(), LinkError> {
        if !matches!(self.controller.is_started(), Ok(true)) {
            let client_config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(self.ssid.into())
                    .with_password(self.password.into()),
            );
            self.controller
                .set_config(&client_config)
                .map_err(LinkError::Wifi)?;
            info!("Starting WiFi...");
            self.controller.start_async().await.map_err(LinkError::Wifi)?;
        }

        info!("Connecting to {}...", self.ssid);
        self.controller
            .connect_async()
            .await
            .map_err(LinkError::Wifi)?;
        wait_for_ip(self.stack).await;
        Ok(())
    }
}

impl Link for WifiLink {
    type Error = LinkError;

    async fn join(&mut self) -> Result<(), LinkError> {
        let timeout = self.attempt_timeout;
        match with_timeout(timeout, self.associate()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                // Drop a half-finished association before the next attempt
                let _ = self.controller.disconnect_async().await;
                Err(LinkError::Timeout)
            }
        }
    }

    async fn request<B: BodySink>(
        &mut self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        timeout: CoreDuration,
        sink: &mut B,
    ) -> Result<Response, HttpError> {
        let full_path = http::join_path(self.server.path, path)?;
        let request = Request::new(method, self.server.with_path(&full_path)).with_headers(headers);

        match with_timeout(to_embassy(timeout), exchange(self.stack, &request, sink)).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout),
        }
    }

    async fn disconnect(&mut self) {
        info!("Disconnecting WiFi for deep sleep...");
        if let Err(e) = self.controller.disconnect_async().await {
            warn!("Disconnect error (may already be disconnected): {:?}", e);
        }
        if let Err(e) = self.controller.stop_async().await {
            warn!("Stop error: {:?}", e);
        }
        info!("WiFi stopped");
    }
}

/// One request on a fresh TCP connection
async fn exchange<B: BodySink>(
    stack: Stack<'static>,
    request: &Request<'_>,
    sink: &mut B,
) -> Result<Response, HttpError> {
    let ip = resolve_host(stack, request.url.host).await?;

    let mut rx_buf = [0u8; TCP_RX_BUF_SIZE];
    let mut tx_buf = [0u8; TCP_TX_BUF_SIZE];
    let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
    socket.set_timeout(Some(SOCKET_TIMEOUT));

    info!(
        "{} http://{}:{}{}",
        request.method.as_str(),
        request.url.host,
        request.url.port,
        request.url.path
    );
    socket
        .connect((ip, request.url.port))
        .await
        .map_err(|_| HttpError::Connect)?;

    let mut header_buf = [0u8; HEADER_BUF_SIZE];
    let result = http::send(&mut socket, request, &mut header_buf, sink).await;
    socket.close();
    result
}

/// Resolve a hostname to an IPv4 address
/// Tries parsing as IPv4 first, falls back to DNS lookup
async fn resolve_host(stack: Stack<'static>, host: &str) -> Result<core::net::Ipv4Addr, HttpError> {
    if let Some(ip) = http::parse_ipv4(host) {
        return Ok(ip);
    }

    info!("Resolving hostname: {}", host);
    let addrs = stack
        .dns_query(host, DnsQueryType::A)
        .await
        .map_err(|_| HttpError::Dns)?;

    match addrs.first() {
        Some(embassy_net::IpAddress::Ipv4(v4)) => {
            let octets = v4.octets();
            Ok(core::net::Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
        }
        _ => Err(HttpError::Dns),
    }
}

/// Wait for network stack to get an IP address
async fn wait_for_ip(stack: Stack<'static>) {
    info!("Waiting for link...");
    while !stack.is_link_up() {
        Timer::after(Duration::from_millis(500)).await;
    }

    info!("Waiting for IP...");
    loop {
        if let Some(config) = stack.config_v4() {
            info!("Got IP: {}", config.address);
            break;
        }
        Timer::after(Duration::from_millis(500)).await;
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
