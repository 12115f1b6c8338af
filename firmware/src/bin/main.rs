//! Spectra Frame Firmware - ESP32-S3 E-Paper Picture Frame
//!
//! Environment variables required:
//! - WIFI_SSID: WiFi network name
//! - WIFI_PASS: WiFi password
//! - SERVER_URL: Content server URL (e.g., http://192.168.1.100:5000)
//!
//! Optional overrides:
//! - REFRESH_INTERVAL_SECS / RETRY_INTERVAL_SECS: sleep lengths
//! - WIFI_ATTEMPTS / WIFI_RETRY_DELAY_SECS: association retries
//! - CONTROL_TIMEOUT_SECS / FETCH_TIMEOUT_SECS: request budgets
//! - REFRESH_MODE: `standard` or `fast` panel waveform
//! - NEXT_PATH / REFRESH_PATH / IMAGE_PATH: server endpoints

#![no_std]
#![no_main]

extern crate alloc;

use core::time::Duration;

use embassy_executor::Spawner;
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{
    clock::CpuClock,
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    ram,
    rng::Rng,
    rtc_cntl::Rtc,
    spi::{
        Mode,
        master::{Config as SpiConfig, Spi},
    },
    time::Rate,
    timer::timg::TimerGroup,
};
use log::{error, info, warn};
use spectra_frame_core::config::{self, Config, ConfigError};
use spectra_frame_core::cycle;
use spectra_frame_core::state::SleepState;
use spectra_frame_core::wake::WakeReason;
use spectra_frame_firmware::display::PanelSink;
use spectra_frame_firmware::epd::{Epd7in3e, RefreshMode};
use spectra_frame_firmware::net::WifiLink;
use spectra_frame_firmware::{power, sleep};

esp_bootloader_esp_idf::esp_app_desc!();

const SSID: &str = env!("WIFI_SSID");
const PASSWORD: &str = env!("WIFI_PASS");
const SERVER_URL: &str = env!("SERVER_URL");

/// RTC fast memory state - persists across deep sleep
#[esp_hal::ram(unstable(rtc_fast))]
static mut SLEEP_STATE: SleepState = SleepState::new();

/// Parsed override, or `None` (with a warning) when it is malformed
fn override_value<T>(name: &str, parsed: Result<Option<T>, ConfigError>) -> Option<T> {
    parsed.unwrap_or_else(|e| {
        warn!("Ignoring {}: {:?}", name, e);
        None
    })
}

fn secs(name: &str, value: Option<&str>) -> Option<Duration> {
    override_value(name, config::parse_secs(value))
}

/// Assemble the configuration from build-time environment
fn load_config() -> Config<'static> {
    let mut config = Config::new(SSID, PASSWORD, SERVER_URL);

    if let Some(interval) = secs("REFRESH_INTERVAL_SECS", option_env!("REFRESH_INTERVAL_SECS")) {
        config = config.with_refresh_interval(interval);
    }
    if let Some(interval) = secs("RETRY_INTERVAL_SECS", option_env!("RETRY_INTERVAL_SECS")) {
        config = config.with_retry_interval(interval);
    }
    if let Some(delay) = secs("WIFI_RETRY_DELAY_SECS", option_env!("WIFI_RETRY_DELAY_SECS")) {
        config = config.with_wifi_retry_delay(delay);
    }
    if let Some(timeout) = secs("CONTROL_TIMEOUT_SECS", option_env!("CONTROL_TIMEOUT_SECS")) {
        config = config.with_control_timeout(timeout);
    }
    if let Some(timeout) = secs("FETCH_TIMEOUT_SECS", option_env!("FETCH_TIMEOUT_SECS")) {
        config = config.with_fetch_timeout(timeout);
    }
    if let Some(attempts) = override_value(
        "WIFI_ATTEMPTS",
        config::parse_count(option_env!("WIFI_ATTEMPTS")),
    ) {
        config = config.with_wifi_attempts(attempts);
    }
    if let Some(speed) = override_value(
        "REFRESH_MODE",
        config::parse_refresh_speed(option_env!("REFRESH_MODE")),
    ) {
        config = config.with_refresh_speed(speed);
    }
    if let Some(path) = option_env!("NEXT_PATH") {
        config = config.with_next_path(path);
    }
    if let Some(path) = option_env!("REFRESH_PATH") {
        config = config.with_refresh_path(path);
    }
    if let Some(path) = option_env!("IMAGE_PATH") {
        config = config.with_image_path(path);
    }

    config
}

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // Init logger first so we can see any early crashes
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let cause = esp_hal::rtc_cntl::wakeup_cause();
    let wake = WakeReason::classify(sleep::wake_source(cause));
    info!("Boot! Wake cause: {:?} ({:?})", cause, wake);

    // Internal RAM for small allocations, PSRAM for the framebuffer
    esp_alloc::heap_allocator!(#[ram(reclaimed)] size: 64 * 1024);
    esp_alloc::heap_allocator!(size: 36 * 1024);
    esp_alloc::psram_allocator!(&peripherals.PSRAM, esp_hal::psram);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(
        timg0.timer0,
        #[cfg(target_arch = "riscv32")]
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT)
            .software_interrupt0,
    );

    let mut rtc = Rtc::new(peripherals.LPWR);
    let mut delay = Delay;

    // SAFETY: single task, and nothing else touches the RTC record
    let state = unsafe { &mut *(&raw mut SLEEP_STATE) };

    let config = load_config();
    let sleep_for = if let Err(e) = config.validate() {
        error!("Invalid configuration: {:?}", e);
        info!("Wake #{}", state.begin_cycle());
        config::DEFAULT_RETRY_INTERVAL
    } else {
        info!("Server URL: {}", config.server_url);

        // ==================== Power Management (AXP2101) ====================
        let mut i2c = I2c::new(
            peripherals.I2C0,
            I2cConfig::default().with_frequency(Rate::from_khz(400)),
        )
        .expect("I2C init failed")
        .with_sda(peripherals.GPIO47)
        .with_scl(peripherals.GPIO48);

        match power::enable_panel_rails(&mut i2c) {
            Ok(()) => info!("PMIC configured - ALDO3/ALDO4 enabled at 3.3V"),
            Err(e) => warn!("PMIC config skipped (may be pre-configured): {:?}", e),
        }
        match power::battery_percent(&mut i2c) {
            Ok(percent) => info!("Battery: {}%", percent),
            Err(e) => warn!("Failed to read battery: {:?}", e),
        }

        // ==================== E-Paper Display Setup ====================
        // DC=GPIO8, CS=GPIO9, SCK=GPIO10, MOSI=GPIO11, RST=GPIO12, BUSY=GPIO13
        let spi = Spi::new(
            peripherals.SPI3,
            SpiConfig::default()
                .with_frequency(Rate::from_mhz(10))
                .with_mode(Mode::_0),
        )
        .expect("SPI init failed")
        .with_sck(peripherals.GPIO10)
        .with_mosi(peripherals.GPIO11);

        let cs = Output::new(peripherals.GPIO9, Level::High, OutputConfig::default());
        let spi_device = ExclusiveDevice::new_no_delay(spi, cs).expect("SPI device init failed");
        let busy = Input::new(
            peripherals.GPIO13,
            InputConfig::default().with_pull(Pull::Up),
        );
        let dc = Output::new(peripherals.GPIO8, Level::Low, OutputConfig::default());
        let rst = Output::new(peripherals.GPIO12, Level::High, OutputConfig::default());
        let mode = RefreshMode::from(config.refresh_speed);
        info!("Panel refresh mode: {:?}", mode);
        let mut panel = PanelSink::new(Epd7in3e::new(spi_device, busy, dc, rst, mode));

        // ==================== Wake Cycle ====================
        let rng = Rng::new();
        let seed = (rng.random() as u64) << 32 | rng.random() as u64;

        match WifiLink::new(spawner, peripherals.WIFI, seed, &config) {
            Ok(mut link) => {
                let report = cycle::run(&config, state, wake, &mut link, &mut panel, &mut delay).await;
                info!("Cycle finished: {:?}", report);
                report.sleep_duration(&config)
            }
            Err(e) => {
                error!("Radio init failed: {:?}", e);
                info!("Wake #{}", state.begin_cycle());
                config.retry_interval
            }
        }
    };

    // The framebuffer and network buffers are already released here
    info!(
        "Entering deep sleep for {} seconds (press a button to wake early)...",
        sleep_for.as_secs()
    );
    sleep::enter_deep_sleep(
        &mut rtc,
        peripherals.GPIO4,
        peripherals.GPIO5,
        &mut delay,
        sleep_for,
    )
}
