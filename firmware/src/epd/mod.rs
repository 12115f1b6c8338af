//! Driver for Good Display GDEP073E01 / Waveshare 7.3inch e-Paper HAT (E)
//! using E Ink Spectra 6 technology (6-color e-paper).
//!
//! The driver only streams whole frames: the frame never draws on the panel,
//! it pushes a packed 4-bpp buffer and refreshes.

mod command;

use command::{BTST2_FAST, BTST2_STANDARD, Command, DEEP_SLEEP_CHECK, FAST_INIT, STANDARD_INIT, Step};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use spectra_frame_core::config::RefreshSpeed;
use spectra_frame_core::framebuffer::BUFFER_SIZE;

/// Longest blocking wait on BUSY (power on/off), in 10ms polls
const MAX_IDLE_POLLS: u32 = 1_000;

/// Initialization/refresh mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    #[default]
    Standard,
    Fast,
}

impl From<RefreshSpeed> for RefreshMode {
    fn from(speed: RefreshSpeed) -> Self {
        match speed {
            RefreshSpeed::Standard => RefreshMode::Standard,
            RefreshSpeed::Fast => RefreshMode::Fast,
        }
    }
}

impl RefreshMode {
    fn init_sequence(self) -> &'static [Step] {
        match self {
            RefreshMode::Standard => STANDARD_INIT,
            RefreshMode::Fast => FAST_INIT,
        }
    }

    fn booster(self) -> &'static [u8] {
        match self {
            RefreshMode::Standard => BTST2_STANDARD,
            RefreshMode::Fast => BTST2_FAST,
        }
    }
}

#[derive(Debug)]
pub enum EpdError<E> {
    Spi(E),
    /// BUSY never released
    BusyTimeout,
    /// Frame is not `BUFFER_SIZE` bytes
    FrameSize(usize),
}

impl<E> From<E> for EpdError<E> {
    fn from(e: E) -> Self {
        EpdError::Spi(e)
    }
}

/// Driver for the 7.3" Spectra 6 e-paper display
pub struct Epd7in3e<SPI, BUSY, DC, RST> {
    spi: SPI,
    busy: BUSY,
    dc: DC,
    rst: RST,
    refresh_mode: RefreshMode,
}

impl<SPI, BUSY, DC, RST> Epd7in3e<SPI, BUSY, DC, RST>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
{
    /// Take ownership of the bus and pins. The panel stays untouched until
    /// [`Epd7in3e::wake_up`].
    pub fn new(spi: SPI, busy: BUSY, dc: DC, rst: RST, refresh_mode: RefreshMode) -> Self {
        Self {
            spi,
            busy,
            dc,
            rst,
            refresh_mode,
        }
    }

    /// Hardware reset sequence
    fn hardware_reset<DELAY: DelayNs>(&mut self, delay: &mut DELAY) {
        let _ = self.rst.set_high();
        delay.delay_ms(10);
        let _ = self.rst.set_low();
        delay.delay_ms(10);
        let _ = self.rst.set_high();
        delay.delay_ms(10);
    }

    /// Wait for the display to become idle (BUSY pin high)
    fn wait_until_idle<DELAY: DelayNs>(&mut self, delay: &mut DELAY) -> Result<(), EpdError<SPI::Error>> {
        for _ in 0..MAX_IDLE_POLLS {
            if !self.is_busy() {
                return Ok(());
            }
            delay.delay_ms(10);
        }
        Err(EpdError::BusyTimeout)
    }

    fn send_command(&mut self, command: Command) -> Result<(), SPI::Error> {
        let _ = self.dc.set_low();
        self.spi.write(&[command.addr()])
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), SPI::Error> {
        let _ = self.dc.set_high();
        self.spi.write(data)
    }

    fn cmd_with_data(&mut self, command: Command, data: &[u8]) -> Result<(), SPI::Error> {
        self.send_command(command)?;
        self.send_data(data)
    }

    fn power_on<DELAY: DelayNs>(&mut self, delay: &mut DELAY) -> Result<(), EpdError<SPI::Error>> {
        self.send_command(Command::PON)?;
        self.wait_until_idle(delay)
    }

    fn power_off<DELAY: DelayNs>(&mut self, delay: &mut DELAY) -> Result<(), EpdError<SPI::Error>> {
        self.cmd_with_data(Command::POF, &[0x00])?;
        self.wait_until_idle(delay)
    }

    /// Reset and initialize the controller, leaving it powered on
    pub fn wake_up<DELAY: DelayNs>(&mut self, delay: &mut DELAY) -> Result<(), EpdError<SPI::Error>> {
        self.hardware_reset(delay);
        for (command, data) in self.refresh_mode.init_sequence() {
            self.cmd_with_data(*command, data)?;
        }
        self.power_on(delay)
    }

    /// Send a packed frame and start the refresh without waiting for it.
    /// Poll [`Epd7in3e::is_busy`], then call [`Epd7in3e::finish_display`].
    pub fn display_start<DELAY: DelayNs>(
        &mut self,
        buffer: &[u8],
        delay: &mut DELAY,
    ) -> Result<(), EpdError<SPI::Error>> {
        if buffer.len() != BUFFER_SIZE {
            return Err(EpdError::FrameSize(buffer.len()));
        }
        self.send_command(Command::DTM)?;
        self.send_data(buffer)?;

        // Display may be off from the previous operation
        self.power_on(delay)?;
        let booster = self.refresh_mode.booster();
        self.cmd_with_data(Command::BTST2, booster)?;

        self.cmd_with_data(Command::DRF, &[0x00])?;
        delay.delay_ms(1); // min 200us before BUSY is valid
        Ok(())
    }

    /// Check if display is still busy refreshing.
    pub fn is_busy(&mut self) -> bool {
        // BUSY is active low on this display
        self.busy.is_low().unwrap_or(true)
    }

    /// Finish display refresh after polling `is_busy()` returns false.
    pub fn finish_display<DELAY: DelayNs>(&mut self, delay: &mut DELAY) -> Result<(), EpdError<SPI::Error>> {
        self.power_off(delay)
    }

    /// Power off and enter deep sleep; only a reset wakes the controller
    pub fn sleep<DELAY: DelayNs>(&mut self, delay: &mut DELAY) -> Result<(), EpdError<SPI::Error>> {
        self.power_off(delay)?;
        self.cmd_with_data(Command::DSLP, &[DEEP_SLEEP_CHECK])?;
        delay.delay_ms(100);
        Ok(())
    }
}
