//! Wake cause classification
//!
//! The frame has three ways out of deep sleep: the RTC timer, the "next"
//! button on the ext0 circuit and the "refresh" button on the ext1 circuit.

use crate::config::Config;

/// Hardware wake source as reported by the RTC controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSource {
    /// Cold boot, reset or brown-out
    PowerOn,
    Timer,
    /// Single-pin wake circuit (next button)
    Ext0,
    /// Pin-mask wake circuit (refresh button)
    Ext1,
    Other,
}

/// Why this cycle is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    TimerOrBoot,
    ButtonNext,
    ButtonRefresh,
}

impl WakeReason {
    pub fn classify(source: WakeSource) -> Self {
        match source {
            WakeSource::Ext0 => WakeReason::ButtonNext,
            WakeSource::Ext1 => WakeReason::ButtonRefresh,
            WakeSource::PowerOn | WakeSource::Timer | WakeSource::Other => WakeReason::TimerOrBoot,
        }
    }

    /// Control request to send before fetching content
    pub fn control(self) -> Option<Control> {
        match self {
            WakeReason::TimerOrBoot => None,
            WakeReason::ButtonNext => Some(Control::Next),
            WakeReason::ButtonRefresh => Some(Control::Refresh),
        }
    }
}

impl From<WakeSource> for WakeReason {
    fn from(source: WakeSource) -> Self {
        WakeReason::classify(source)
    }
}

/// Content server trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Advance to the next image
    Next,
    /// Re-render the current image
    Refresh,
}

impl Control {
    pub fn path<'a>(&self, config: &Config<'a>) -> &'a str {
        match self {
            Control::Next => config.next_path,
            Control::Refresh => config.refresh_path,
        }
    }

    /// Control requests succeed with 200 or 204 only
    pub fn is_success(status: u16) -> bool {
        matches!(status, 200 | 204)
    }
}
