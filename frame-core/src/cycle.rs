//! One wake cycle, start to finish
//!
//! Handles the join → control → fetch → remap → display flow:
//! 1. Join the WiFi network (bounded attempts)
//! 2. Send the control request for a button wake
//! 3. Download the packed image into a fresh framebuffer
//! 4. Remap the palette and push the frame to the panel
//!
//! Every failure is logged and the cycle continues towards sleep. The
//! returned [`CycleReport`] decides how long to sleep.

use core::fmt::Debug;
use core::time::Duration;

use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

use crate::config::Config;
use crate::download::{BodySink, Discard, Download, DownloadSummary};
use crate::framebuffer::Framebuffer;
use crate::http::{HttpError, Method, Response};
use crate::state::SleepState;
use crate::wake::{Control, WakeReason};

/// Network side of a cycle
#[allow(async_fn_in_trait)]
pub trait Link {
    type Error: Debug;

    /// One association attempt, including address assignment
    async fn join(&mut self) -> Result<(), Self::Error>;

    /// Send a body-less request to `path` on the content server
    async fn request<B: BodySink>(
        &mut self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
        sink: &mut B,
    ) -> Result<Response, HttpError>;

    /// Drop the association and power the radio down
    async fn disconnect(&mut self);
}

/// Panel side of a cycle
#[allow(async_fn_in_trait)]
pub trait DisplaySink {
    type Error: Debug;

    /// Push a packed, remapped frame and refresh the panel
    async fn show(&mut self, frame: &[u8]) -> Result<(), Self::Error>;
}

/// Outcome of the control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Accepted(u16),
    Rejected(u16),
    Failed(HttpError),
}

/// Outcome of the content fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOutcome {
    /// Network never came up
    Skipped,
    /// Server says the panel is already current
    NotModified,
    /// Request failed, returned a status other than 200, or returned nothing
    FetchFailed(Option<HttpError>),
    /// Image downloaded but the panel refused it
    DisplayFailed(DownloadSummary),
    Rendered(DownloadSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub boot_count: u32,
    pub wake: WakeReason,
    pub network: bool,
    pub control: Option<(Control, ControlOutcome)>,
    pub content: ContentOutcome,
}

impl CycleReport {
    /// Sleep length before the next timer wake
    pub fn sleep_duration(&self, config: &Config<'_>) -> Duration {
        if self.network {
            config.refresh_interval
        } else {
            config.retry_interval
        }
    }
}

/// Run one wake cycle
pub async fn run<L, D, T>(
    config: &Config<'_>,
    state: &mut SleepState,
    wake: WakeReason,
    link: &mut L,
    display: &mut D,
    delay: &mut T,
) -> CycleReport
where
    L: Link,
    D: DisplaySink,
    T: DelayNs,
{
    let boot_count = state.begin_cycle();
    info!("Wake #{}: {:?}", boot_count, wake);

    let mut report = CycleReport {
        boot_count,
        wake,
        network: false,
        control: None,
        content: ContentOutcome::Skipped,
    };

    if !join_network(config, link, delay).await {
        warn!(
            "WiFi unavailable after {} attempts, retrying in {}s",
            config.wifi_attempts,
            config.retry_interval.as_secs()
        );
        link.disconnect().await;
        return report;
    }
    report.network = true;

    if let Some(control) = wake.control() {
        let outcome = send_control(config, control, link).await;
        report.control = Some((control, outcome));
    }

    report.content = fetch_and_render(config, state, wake, link, display).await;

    link.disconnect().await;
    report
}

async fn join_network<L: Link, T: DelayNs>(config: &Config<'_>, link: &mut L, delay: &mut T) -> bool {
    for attempt in 1..=config.wifi_attempts {
        match link.join().await {
            Ok(()) => {
                info!("WiFi connected (attempt {})", attempt);
                return true;
            }
            Err(e) => {
                warn!("WiFi attempt {}/{} failed: {:?}", attempt, config.wifi_attempts, e);
                if attempt < config.wifi_attempts {
                    let pause = u32::try_from(config.wifi_retry_delay.as_millis()).unwrap_or(u32::MAX);
                    delay.delay_ms(pause).await;
                }
            }
        }
    }
    false
}

/// Best effort: a single attempt whose result never gates the fetch
async fn send_control<L: Link>(config: &Config<'_>, control: Control, link: &mut L) -> ControlOutcome {
    let path = control.path(config);
    info!("Sending {:?} request to {}", control, path);

    match link
        .request(Method::Post, path, &[], config.control_timeout, &mut Discard)
        .await
    {
        Ok(response) if Control::is_success(response.status) => {
            info!("{:?} accepted ({})", control, response.status);
            ControlOutcome::Accepted(response.status)
        }
        Ok(response) => {
            warn!("{:?} returned unexpected status {}", control, response.status);
            ControlOutcome::Rejected(response.status)
        }
        Err(HttpError::Status(status)) => {
            warn!("{:?} rejected with status {}", control, status);
            ControlOutcome::Rejected(status)
        }
        Err(e) => {
            warn!("{:?} request failed: {:?}", control, e);
            ControlOutcome::Failed(e)
        }
    }
}

async fn fetch_and_render<L: Link, D: DisplaySink>(
    config: &Config<'_>,
    state: &mut SleepState,
    wake: WakeReason,
    link: &mut L,
    display: &mut D,
) -> ContentOutcome {
    // Button wakes change the content, so only timer wakes may skip
    let validator = match wake {
        WakeReason::TimerOrBoot => state.last_modified(),
        _ => None,
    };
    let conditional;
    let headers: &[(&str, &str)] = match validator {
        Some(value) => {
            info!("Fetching image (If-Modified-Since: {})", value);
            conditional = [("If-Modified-Since", value)];
            &conditional
        }
        None => {
            info!("Fetching image");
            &[]
        }
    };

    // Fresh buffer for this cycle, dropped before returning
    let mut framebuffer = Framebuffer::new();
    let mut download = Download::new(framebuffer.as_mut_slice());

    let result = link
        .request(Method::Get, config.image_path, headers, config.fetch_timeout, &mut download)
        .await;
    let summary = download.finish();

    let response = match result {
        Ok(response) if response.is_not_modified() => {
            info!("Image not modified, keeping current panel contents");
            return ContentOutcome::NotModified;
        }
        // Redirect pages and partial bodies are not frames
        Ok(response) if response.status != 200 => {
            warn!("Unexpected image status {}, keeping current panel contents", response.status);
            return ContentOutcome::FetchFailed(Some(HttpError::Status(response.status)));
        }
        Ok(response) => response,
        Err(e) => {
            warn!("Image fetch failed: {:?}", e);
            return ContentOutcome::FetchFailed(Some(e));
        }
    };

    if summary.received == 0 {
        warn!("Image response was empty (status {})", response.status);
        return ContentOutcome::FetchFailed(None);
    }
    if summary.is_short() {
        warn!(
            "Short image: {} of {} bytes, padded {}",
            summary.received, summary.expected, summary.padded
        );
    } else {
        info!("Received {} bytes, padded {}", summary.received, summary.padded);
    }

    framebuffer.remap();

    match display.show(framebuffer.as_slice()).await {
        Ok(()) => {
            info!("Display refresh successful");
            state.set_last_modified(response.last_modified.as_deref());
            ContentOutcome::Rendered(summary)
        }
        Err(e) => {
            warn!("Display refresh failed: {:?}", e);
            state.clear_last_modified();
            ContentOutcome::DisplayFailed(summary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::BUFFER_SIZE;
    use crate::palette::BLANK;
    use alloc::string::{String, ToString};
    use alloc::vec::Vec;
    use embassy_futures::block_on;

    const LAST_MODIFIED: &str = "Sat, 17 Oct 2026 10:00:00 GMT";

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        method: Method,
        path: String,
        headers: Vec<(String, String)>,
        timeout: Duration,
    }

    /// Canned reply for a request
    enum Reply {
        Body {
            status: u16,
            body: Vec<u8>,
            content_length: Option<usize>,
            last_modified: Option<&'static str>,
        },
        Status(u16),
        Error(HttpError),
    }

    struct FakeLink {
        joins_before_success: Option<u8>,
        join_calls: u8,
        control_reply: Reply,
        image_reply: Reply,
        calls: Vec<Call>,
        disconnected: bool,
    }

    impl FakeLink {
        fn new(image_reply: Reply) -> Self {
            Self {
                joins_before_success: Some(0),
                join_calls: 0,
                control_reply: Reply::Status(204),
                image_reply,
                calls: Vec::new(),
                disconnected: false,
            }
        }

        fn image(body: &[u8]) -> Reply {
            Reply::Body {
                status: 200,
                body: body.to_vec(),
                content_length: Some(body.len()),
                last_modified: Some(LAST_MODIFIED),
            }
        }
    }

    impl Link for FakeLink {
        type Error = &'static str;

        async fn join(&mut self) -> Result<(), Self::Error> {
            self.join_calls += 1;
            match self.joins_before_success {
                Some(failures) if self.join_calls > failures => Ok(()),
                _ => Err("no AP"),
            }
        }

        async fn request<B: BodySink>(
            &mut self,
            method: Method,
            path: &str,
            headers: &[(&str, &str)],
            timeout: Duration,
            sink: &mut B,
        ) -> Result<Response, HttpError> {
            self.calls.push(Call {
                method,
                path: path.to_string(),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                timeout,
            });
            let reply = match method {
                Method::Post => &self.control_reply,
                Method::Get => &self.image_reply,
            };
            match reply {
                Reply::Body {
                    status,
                    body,
                    content_length,
                    last_modified,
                } => {
                    let mut response = Response::new(*status, *content_length);
                    if let Some(lm) = last_modified {
                        response.last_modified = Some(heapless::String::try_from(*lm).unwrap());
                    }
                    sink.begin(*content_length);
                    for chunk in body.chunks(7) {
                        response.body_read += chunk.len();
                        if !sink.write(chunk) {
                            break;
                        }
                    }
                    Ok(response)
                }
                Reply::Status(status) if *status >= 400 => Err(HttpError::Status(*status)),
                Reply::Status(status) => Ok(Response::new(*status, Some(0))),
                Reply::Error(e) => Err(*e),
            }
        }

        async fn disconnect(&mut self) {
            self.disconnected = true;
        }
    }

    #[derive(Default)]
    struct FakePanel {
        frames: Vec<Vec<u8>>,
        fail: bool,
    }

    impl DisplaySink for FakePanel {
        type Error = &'static str;

        async fn show(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
            if self.fail {
                return Err("busy timeout");
            }
            self.frames.push(frame.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDelay {
        total_ms: u64,
    }

    impl DelayNs for FakeDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.total_ms += ns as u64 / 1_000_000;
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms as u64;
        }
    }

    fn config() -> Config<'static> {
        Config::new("home", "hunter2", "http://192.168.1.10:5000")
    }

    fn run_cycle(
        state: &mut SleepState,
        wake: WakeReason,
        link: &mut FakeLink,
        panel: &mut FakePanel,
    ) -> (CycleReport, FakeDelay) {
        let mut delay = FakeDelay::default();
        let report = block_on(run(&config(), state, wake, link, panel, &mut delay));
        (report, delay)
    }

    #[test]
    fn test_timer_wake_renders_remapped_image() {
        let mut state = SleepState::new();
        let mut link = FakeLink::new(FakeLink::image(&[0x23, 0x45, 0x01]));
        let mut panel = FakePanel::default();

        let (report, _) = run_cycle(&mut state, WakeReason::TimerOrBoot, &mut link, &mut panel);

        assert_eq!(report.boot_count, 1);
        assert!(report.network);
        assert_eq!(report.control, None);
        assert_eq!(
            report.content,
            ContentOutcome::Rendered(DownloadSummary {
                received: 3,
                expected: 3,
                padded: BUFFER_SIZE - 3
            })
        );
        assert_eq!(report.sleep_duration(&config()), config().refresh_interval);

        assert_eq!(link.calls.len(), 1);
        assert_eq!(link.calls[0].method, Method::Get);
        assert_eq!(link.calls[0].path, "/api/current_image?format=spectra6");
        assert!(link.calls[0].headers.is_empty());
        assert!(link.disconnected);

        let frame = &panel.frames[0];
        assert_eq!(frame.len(), BUFFER_SIZE);
        // green|blue, red|yellow, black|white in panel codes
        assert_eq!(frame[0], 0x65);
        assert_eq!(frame[1], 0x32);
        assert_eq!(frame[2], 0x01);
        assert!(frame[3..].iter().all(|&b| b == BLANK));

        assert_eq!(state.last_modified(), Some(LAST_MODIFIED));
    }

    #[test]
    fn test_wifi_failure_skips_fetch_and_shortens_sleep() {
        let mut state = SleepState::new();
        let mut link = FakeLink::new(FakeLink::image(&[0x00]));
        link.joins_before_success = None;
        let mut panel = FakePanel::default();

        let (report, delay) = run_cycle(&mut state, WakeReason::ButtonNext, &mut link, &mut panel);

        assert!(!report.network);
        assert_eq!(report.content, ContentOutcome::Skipped);
        assert_eq!(report.control, None);
        assert_eq!(report.sleep_duration(&config()), config().retry_interval);
        assert_eq!(link.join_calls, config().wifi_attempts);
        assert!(link.calls.is_empty());
        assert!(panel.frames.is_empty());
        assert!(link.disconnected);
        // pauses between attempts only
        let pauses = config().wifi_attempts as u64 - 1;
        assert_eq!(delay.total_ms, pauses * config().wifi_retry_delay.as_millis() as u64);
    }

    #[test]
    fn test_wifi_recovers_within_bound() {
        let mut state = SleepState::new();
        let mut link = FakeLink::new(FakeLink::image(&[0x11]));
        link.joins_before_success = Some(2);
        let mut panel = FakePanel::default();

        let (report, _) = run_cycle(&mut state, WakeReason::TimerOrBoot, &mut link, &mut panel);

        assert!(report.network);
        assert_eq!(link.join_calls, 3);
        assert_eq!(panel.frames.len(), 1);
    }

    #[test]
    fn test_next_button_posts_before_fetch() {
        let mut state = SleepState::new();
        state.begin_cycle();
        state.set_last_modified(Some(LAST_MODIFIED));
        let mut link = FakeLink::new(FakeLink::image(&[0x55]));
        let mut panel = FakePanel::default();

        let (report, _) = run_cycle(&mut state, WakeReason::ButtonNext, &mut link, &mut panel);

        assert_eq!(report.boot_count, 2);
        assert_eq!(report.control, Some((Control::Next, ControlOutcome::Accepted(204))));
        assert_eq!(link.calls.len(), 2);
        assert_eq!(link.calls[0].method, Method::Post);
        assert_eq!(link.calls[0].path, "/api/next_image");
        assert_eq!(link.calls[0].timeout, config().control_timeout);
        // button wakes never fetch conditionally
        assert_eq!(link.calls[1].method, Method::Get);
        assert!(link.calls[1].headers.is_empty());
        assert_eq!(panel.frames.len(), 1);
    }

    #[test]
    fn test_failed_control_does_not_block_fetch() {
        let mut state = SleepState::new();
        let mut link = FakeLink::new(FakeLink::image(&[0x44]));
        link.control_reply = Reply::Error(HttpError::Timeout);
        let mut panel = FakePanel::default();

        let (report, _) = run_cycle(&mut state, WakeReason::ButtonRefresh, &mut link, &mut panel);

        assert_eq!(
            report.control,
            Some((Control::Refresh, ControlOutcome::Failed(HttpError::Timeout)))
        );
        assert_eq!(link.calls[0].path, "/api/refresh_image");
        assert!(matches!(report.content, ContentOutcome::Rendered(_)));
    }

    #[test]
    fn test_control_status_is_reported() {
        let mut state = SleepState::new();
        let mut link = FakeLink::new(FakeLink::image(&[0x44]));
        link.control_reply = Reply::Status(202);
        let mut panel = FakePanel::default();
        let (report, _) = run_cycle(&mut state, WakeReason::ButtonNext, &mut link, &mut panel);
        assert_eq!(report.control, Some((Control::Next, ControlOutcome::Rejected(202))));

        link.control_reply = Reply::Status(500);
        let (report, _) = run_cycle(&mut state, WakeReason::ButtonNext, &mut link, &mut panel);
        assert_eq!(report.control, Some((Control::Next, ControlOutcome::Rejected(500))));
        assert_eq!(panel.frames.len(), 2);
    }

    #[test]
    fn test_fetch_failure_leaves_panel_alone() {
        let mut state = SleepState::new();
        state.begin_cycle();
        state.set_last_modified(Some(LAST_MODIFIED));
        let mut link = FakeLink::new(Reply::Error(HttpError::Connect));
        let mut panel = FakePanel::default();

        let (report, _) = run_cycle(&mut state, WakeReason::TimerOrBoot, &mut link, &mut panel);

        assert_eq!(report.content, ContentOutcome::FetchFailed(Some(HttpError::Connect)));
        assert_eq!(report.sleep_duration(&config()), config().refresh_interval);
        assert!(panel.frames.is_empty());
        assert_eq!(state.last_modified(), Some(LAST_MODIFIED));
    }

    #[test]
    fn test_non_200_image_reply_is_not_rendered() {
        for status in [302, 206] {
            let mut state = SleepState::new();
            state.begin_cycle();
            state.set_last_modified(Some(LAST_MODIFIED));
            let mut link = FakeLink::new(Reply::Body {
                status,
                body: b"<html>moved</html>".to_vec(),
                content_length: Some(18),
                last_modified: None,
            });
            let mut panel = FakePanel::default();

            let (report, _) = run_cycle(&mut state, WakeReason::TimerOrBoot, &mut link, &mut panel);

            assert_eq!(report.content, ContentOutcome::FetchFailed(Some(HttpError::Status(status))));
            assert!(panel.frames.is_empty());
            assert_eq!(state.last_modified(), Some(LAST_MODIFIED));
        }
    }

    #[test]
    fn test_long_retry_delay_saturates() {
        let mut state = SleepState::new();
        let mut link = FakeLink::new(FakeLink::image(&[0x00]));
        link.joins_before_success = None;
        let mut panel = FakePanel::default();
        let config = config()
            .with_wifi_attempts(2)
            .with_wifi_retry_delay(Duration::from_secs(5_000_000));
        let mut delay = FakeDelay::default();

        let report = block_on(run(&config, &mut state, WakeReason::TimerOrBoot, &mut link, &mut panel, &mut delay));

        assert!(!report.network);
        assert_eq!(delay.total_ms, u32::MAX as u64);
    }

    #[test]
    fn test_empty_body_is_not_rendered() {
        let mut state = SleepState::new();
        let mut link = FakeLink::new(FakeLink::image(&[]));
        let mut panel = FakePanel::default();

        let (report, _) = run_cycle(&mut state, WakeReason::TimerOrBoot, &mut link, &mut panel);

        assert_eq!(report.content, ContentOutcome::FetchFailed(None));
        assert!(panel.frames.is_empty());
    }

    #[test]
    fn test_timer_wake_sends_validator_and_honours_304() {
        let mut state = SleepState::new();
        state.begin_cycle();
        state.set_last_modified(Some(LAST_MODIFIED));
        let mut link = FakeLink::new(Reply::Status(304));
        let mut panel = FakePanel::default();

        let (report, _) = run_cycle(&mut state, WakeReason::TimerOrBoot, &mut link, &mut panel);

        assert_eq!(report.content, ContentOutcome::NotModified);
        assert_eq!(
            link.calls[0].headers,
            [("If-Modified-Since".to_string(), LAST_MODIFIED.to_string())]
        );
        assert!(panel.frames.is_empty());
        assert_eq!(state.last_modified(), Some(LAST_MODIFIED));
    }

    #[test]
    fn test_oversized_body_is_truncated() {
        let mut state = SleepState::new();
        let body = alloc::vec![0x23u8; BUFFER_SIZE + 100];
        let mut link = FakeLink::new(Reply::Body {
            status: 200,
            body,
            content_length: None,
            last_modified: None,
        });
        let mut panel = FakePanel::default();

        let (report, _) = run_cycle(&mut state, WakeReason::TimerOrBoot, &mut link, &mut panel);

        assert_eq!(
            report.content,
            ContentOutcome::Rendered(DownloadSummary {
                received: BUFFER_SIZE,
                expected: BUFFER_SIZE,
                padded: 0
            })
        );
        assert!(panel.frames[0].iter().all(|&b| b == 0x65));
        assert_eq!(state.last_modified(), None);
    }

    #[test]
    fn test_display_failure_forgets_validator() {
        let mut state = SleepState::new();
        state.begin_cycle();
        state.set_last_modified(Some("Fri, 16 Oct 2026 10:00:00 GMT"));
        let mut link = FakeLink::new(FakeLink::image(&[0x01]));
        let mut panel = FakePanel {
            fail: true,
            ..Default::default()
        };

        let (report, _) = run_cycle(&mut state, WakeReason::ButtonRefresh, &mut link, &mut panel);

        assert!(matches!(report.content, ContentOutcome::DisplayFailed(_)));
        assert_eq!(state.last_modified(), None);
    }
}
