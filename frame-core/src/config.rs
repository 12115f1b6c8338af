//! Frame configuration
//!
//! The firmware fills this from build-time environment variables; every
//! timing knob has a default suited to a battery-powered frame.

use core::time::Duration;

use crate::http::{Scheme, Url};

/// Refresh interval between display updates (15 minutes)
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);
/// Sleep after a failed WiFi association
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// WiFi association attempts per wake
pub const DEFAULT_WIFI_ATTEMPTS: u8 = 5;
/// Pause between WiFi association attempts
pub const DEFAULT_WIFI_RETRY_DELAY: Duration = Duration::from_secs(2);
/// Budget for one association attempt including DHCP
pub const DEFAULT_WIFI_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
/// Budget for a control POST
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(5);
/// Budget for the image download
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_NEXT_PATH: &str = "/api/next_image";
pub const DEFAULT_REFRESH_PATH: &str = "/api/refresh_image";
pub const DEFAULT_IMAGE_PATH: &str = "/api/current_image?format=spectra6";

/// Panel waveform choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshSpeed {
    /// Slower refresh, best image quality
    #[default]
    Standard,
    /// Shorter refresh at slightly reduced quality
    Fast,
}

/// Configuration error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    MissingSsid,
    InvalidServerUrl,
    /// TLS is not supported
    HttpsUnsupported,
    ZeroInterval,
    ZeroTimeout,
    /// Retry interval must not exceed the refresh interval
    RetryLongerThanRefresh,
    ZeroAttempts,
    InvalidNumber,
    UnknownRefreshSpeed,
}

#[derive(Debug, Clone, Copy)]
pub struct Config<'a> {
    pub wifi_ssid: &'a str,
    pub wifi_password: &'a str,
    /// Base URL of the content server, e.g. `http://192.168.1.10:5000`
    pub server_url: &'a str,
    pub refresh_interval: Duration,
    pub retry_interval: Duration,
    pub wifi_attempts: u8,
    pub wifi_retry_delay: Duration,
    pub wifi_attempt_timeout: Duration,
    pub control_timeout: Duration,
    pub fetch_timeout: Duration,
    pub refresh_speed: RefreshSpeed,
    pub next_path: &'a str,
    pub refresh_path: &'a str,
    pub image_path: &'a str,
}

impl<'a> Config<'a> {
    pub const fn new(wifi_ssid: &'a str, wifi_password: &'a str, server_url: &'a str) -> Self {
        Self {
            wifi_ssid,
            wifi_password,
            server_url,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            wifi_attempts: DEFAULT_WIFI_ATTEMPTS,
            wifi_retry_delay: DEFAULT_WIFI_RETRY_DELAY,
            wifi_attempt_timeout: DEFAULT_WIFI_ATTEMPT_TIMEOUT,
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            refresh_speed: RefreshSpeed::Standard,
            next_path: DEFAULT_NEXT_PATH,
            refresh_path: DEFAULT_REFRESH_PATH,
            image_path: DEFAULT_IMAGE_PATH,
        }
    }

    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub const fn with_wifi_attempts(mut self, attempts: u8) -> Self {
        self.wifi_attempts = attempts;
        self
    }

    pub const fn with_wifi_retry_delay(mut self, delay: Duration) -> Self {
        self.wifi_retry_delay = delay;
        self
    }

    pub const fn with_control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub const fn with_refresh_speed(mut self, speed: RefreshSpeed) -> Self {
        self.refresh_speed = speed;
        self
    }

    pub const fn with_next_path(mut self, path: &'a str) -> Self {
        self.next_path = path;
        self
    }

    pub const fn with_refresh_path(mut self, path: &'a str) -> Self {
        self.refresh_path = path;
        self
    }

    pub const fn with_image_path(mut self, path: &'a str) -> Self {
        self.image_path = path;
        self
    }

    /// Parsed server URL
    pub fn server(&self) -> Result<Url<'a>, ConfigError> {
        let url = Url::parse(self.server_url).map_err(|_| ConfigError::InvalidServerUrl)?;
        if url.scheme == Scheme::Https {
            return Err(ConfigError::HttpsUnsupported);
        }
        Ok(url)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi_ssid.is_empty() {
            return Err(ConfigError::MissingSsid);
        }
        self.server()?;
        if self.refresh_interval.is_zero() || self.retry_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.control_timeout.is_zero() || self.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.retry_interval > self.refresh_interval {
            return Err(ConfigError::RetryLongerThanRefresh);
        }
        if self.wifi_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

/// Parse an optional seconds override such as `option_env!("REFRESH_INTERVAL_SECS")`
pub fn parse_secs(value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ConfigError::InvalidNumber),
    }
}

/// Parse an optional count override such as `option_env!("WIFI_ATTEMPTS")`
pub fn parse_count(value: Option<&str>) -> Result<Option<u8>, ConfigError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidNumber),
    }
}

/// Parse an optional `standard`/`fast` override
pub fn parse_refresh_speed(value: Option<&str>) -> Result<Option<RefreshSpeed>, ConfigError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("standard") => Ok(Some(RefreshSpeed::Standard)),
        Some(v) if v.eq_ignore_ascii_case("fast") => Ok(Some(RefreshSpeed::Fast)),
        Some(_) => Err(ConfigError::UnknownRefreshSpeed),
    }
}
