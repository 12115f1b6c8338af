//! Panel side of the wake cycle
//!
//! Wakes the Spectra 6 controller, streams the frame, waits for the refresh
//! (polling BUSY asynchronously so the network runner keeps running) and puts
//! the panel back into deep sleep.

use embassy_time::{Delay, Duration, Instant, Timer};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use log::{info, warn};
use spectra_frame_core::cycle::DisplaySink;

use crate::epd::{Epd7in3e, EpdError};

/// A standard Spectra 6 refresh takes up to ~20s
const REFRESH_TIMEOUT: Duration = Duration::from_secs(60);
const BUSY_POLL: Duration = Duration::from_millis(50);

pub struct PanelSink<SPI, BUSY, DC, RST> {
    epd: Epd7in3e<SPI, BUSY, DC, RST>,
    delay: Delay,
}

impl<SPI, BUSY, DC, RST> PanelSink<SPI, BUSY, DC, RST>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
{
    pub fn new(epd: Epd7in3e<SPI, BUSY, DC, RST>) -> Self {
        Self { epd, delay: Delay }
    }

    async fn refresh(&mut self, frame: &[u8]) -> Result<(), EpdError<SPI::Error>> {
        info!("Waking up display...");
        self.epd.wake_up(&mut self.delay)?;

        info!("Updating display (full refresh)...");
        self.epd.display_start(frame, &mut self.delay)?;

        let started = Instant::now();
        while self.epd.is_busy() {
            if started.elapsed() > REFRESH_TIMEOUT {
                return Err(EpdError::BusyTimeout);
            }
            Timer::after(BUSY_POLL).await;
        }
        info!("Refresh took {}ms", started.elapsed().as_millis());

        self.epd.finish_display(&mut self.delay)
    }
}

impl<SPI, BUSY, DC, RST> DisplaySink for PanelSink<SPI, BUSY, DC, RST>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
{
    type Error = EpdError<SPI::Error>;

    async fn show(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        let result = self.refresh(frame).await;

        // The panel must sleep even after a failed refresh
        info!("Putting display to sleep...");
        if let Err(e) = self.epd.sleep(&mut self.delay) {
            warn!("Display sleep failed: {:?}", e);
        }

        result
    }
}
