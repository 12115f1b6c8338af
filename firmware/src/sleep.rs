//! Deep sleep entry and wake cause mapping
//!
//! Wake circuits:
//! - timer: next scheduled refresh
//! - ext0 on GPIO4 (KEY, active low): show the next image
//! - ext1 on GPIO5 (active low): re-render the current image
//!
//! All three are armed on every sleep, whichever one woke us.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use esp_hal::gpio::{RtcPin, RtcPinWithResistors};
use esp_hal::rtc_cntl::{
    Rtc,
    sleep::{Ext0WakeupSource, Ext1WakeupSource, TimerWakeupSource, WakeupLevel},
};
use esp_hal::system::SleepSource;
use spectra_frame_core::wake::WakeSource;

/// Map the RTC wake cause onto the frame's wake sources
pub fn wake_source(cause: SleepSource) -> WakeSource {
    match cause {
        SleepSource::Timer => WakeSource::Timer,
        SleepSource::Ext0 => WakeSource::Ext0,
        SleepSource::Ext1 => WakeSource::Ext1,
        SleepSource::Undefined => WakeSource::PowerOn,
        _ => WakeSource::Other,
    }
}

/// Arm timer + both button circuits and enter deep sleep (never returns)
pub fn enter_deep_sleep<N, R, D>(
    rtc: &mut Rtc,
    next_key: N,
    mut refresh_key: R,
    delay: &mut D,
    interval: Duration,
) -> !
where
    N: RtcPinWithResistors,
    R: RtcPinWithResistors + 'static,
    D: DelayNs,
{
    let timer = TimerWakeupSource::new(interval);

    // Pull-ups keep the idle lines high so they don't float and trigger spurious wakes
    next_key.rtcio_pullup(true);
    next_key.rtcio_pulldown(false);
    refresh_key.rtcio_pullup(true);
    refresh_key.rtcio_pulldown(false);

    let ext0 = Ext0WakeupSource::new(next_key, WakeupLevel::Low);
    let mut ext1_pins: [&mut dyn RtcPin; 1] = [&mut refresh_key];
    let ext1 = Ext1WakeupSource::new(&mut ext1_pins, WakeupLevel::Low);

    // Let serial output flush
    delay.delay_ms(100);

    // Device reboots on wake
    rtc.sleep_deep(&[&timer, &ext0, &ext1])
}
