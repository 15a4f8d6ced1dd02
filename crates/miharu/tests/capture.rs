use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use miharu::{
    capture,
    error::{MiharuError, MiharuResult},
    ledger::CandidateSource,
    session::{FrameHandle, NavigationStatus, NetworkEvent, PageSession},
    CaptureConfig, CaptureOutcome, ManifestKind,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

enum NavBehavior {
    Loaded,
    TimedOut,
    ConnectionRefused,
}

/// Scripted stand-in for a browser session: emits a fixed event sequence
/// after navigation, optionally more events when a given selector is
/// clicked, and exposes static DOM media sources.
struct MockSession {
    nav: NavBehavior,
    nav_delay: Duration,
    nav_events: Vec<NetworkEvent>,
    nav_event_delay: Duration,
    dom_sources: Vec<String>,
    click_events: HashMap<String, Vec<NetworkEvent>>,
    space_key_works: bool,
    tx: Mutex<Option<UnboundedSender<NetworkEvent>>>,
    rx: Mutex<Option<UnboundedReceiver<NetworkEvent>>>,
    close_count: AtomicUsize,
    scrolled: AtomicBool,
    scrolled_at: Mutex<Option<Instant>>,
}

impl MockSession {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            nav: NavBehavior::Loaded,
            nav_delay: Duration::ZERO,
            nav_events: Vec::new(),
            nav_event_delay: Duration::ZERO,
            dom_sources: Vec::new(),
            click_events: HashMap::new(),
            space_key_works: false,
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            close_count: AtomicUsize::new(0),
            scrolled: AtomicBool::new(false),
            scrolled_at: Mutex::new(None),
        }
    }

    fn emit_later(&self, events: Vec<NetworkEvent>, delay: Duration) {
        let Some(tx) = self.tx.lock().unwrap().clone() else {
            return;
        };
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            for event in events {
                let _ = tx.send(event);
            }
        });
    }
}

#[async_trait]
impl PageSession for MockSession {
    fn network_events(&self) -> MiharuResult<UnboundedReceiver<NetworkEvent>> {
        self.rx
            .lock()
            .unwrap()
            .take()
            .ok_or(MiharuError::SessionClosed)
    }

    async fn navigate(&self, _url: &str, _timeout: Duration) -> MiharuResult<NavigationStatus> {
        if !self.nav_delay.is_zero() {
            tokio::time::sleep(self.nav_delay).await;
        }
        match self.nav {
            NavBehavior::ConnectionRefused => {
                return Err(MiharuError::Navigation("net::ERR_CONNECTION_REFUSED".into()))
            }
            NavBehavior::Loaded | NavBehavior::TimedOut => {
                self.emit_later(self.nav_events.clone(), self.nav_event_delay);
            }
        }
        Ok(match self.nav {
            NavBehavior::TimedOut => NavigationStatus::TimedOut,
            _ => NavigationStatus::Loaded,
        })
    }

    async fn frames(&self) -> Vec<FrameHandle> {
        vec![FrameHandle::MAIN]
    }

    async fn click(&self, _frame: FrameHandle, selector: &str) -> MiharuResult<()> {
        match self.click_events.get(selector) {
            Some(events) => {
                self.emit_later(events.clone(), Duration::ZERO);
                Ok(())
            }
            None => Err(MiharuError::Interaction(format!(
                "no element matching {selector}"
            ))),
        }
    }

    async fn press_space(&self, _frame: FrameHandle) -> MiharuResult<()> {
        if self.space_key_works {
            Ok(())
        } else {
            Err(MiharuError::Interaction("keyboard not available".into()))
        }
    }

    async fn click_center(&self, _frame: FrameHandle) -> MiharuResult<()> {
        Ok(())
    }

    async fn scroll_by(&self, _delta_x: f64, _delta_y: f64) -> MiharuResult<()> {
        self.scrolled.store(true, Ordering::SeqCst);
        self.scrolled_at
            .lock()
            .unwrap()
            .get_or_insert_with(Instant::now);
        Ok(())
    }

    async fn media_element_sources(&self) -> MiharuResult<Vec<String>> {
        Ok(self.dom_sources.clone())
    }

    async fn close(&self) -> MiharuResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        // Closing the session ends the event stream.
        self.tx.lock().unwrap().take();
        Ok(())
    }
}

fn fast_config() -> CaptureConfig {
    let mut config = CaptureConfig::new("https://example.com/watch");
    config.deadline = Duration::from_millis(2_000);
    config.activation_grace = Duration::from_millis(500);
    config.navigation_timeout = Duration::from_millis(500);
    config.poll_interval = Duration::from_millis(50);
    config
}

#[tokio::test]
async fn test_manifest_request_shortly_after_navigation() {
    let mut session = MockSession::new();
    session.nav_events = vec![
        NetworkEvent::Request {
            url: "https://example.com/app.js".to_string(),
        },
        NetworkEvent::Request {
            url: "https://cdn.example.com/stream/master.m3u8?token=abc".to_string(),
        },
    ];
    session.nav_event_delay = Duration::from_millis(100);
    let session = Arc::new(session);

    let report = capture(&fast_config(), session.clone()).await.unwrap();

    assert_eq!(report.outcome, CaptureOutcome::Found);
    assert_eq!(
        report.manifest_url.as_deref(),
        Some("https://cdn.example.com/stream/master.m3u8?token=abc")
    );
    assert_eq!(report.manifest_kind, Some(ManifestKind::HLS));
    assert_eq!(report.all_candidates.len(), 1);
    assert_eq!(report.all_candidates[0].source, CandidateSource::Request);
    assert_eq!(report.raw_requests.len(), 2);
    assert_eq!(session.close_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_manifest_from_dom_probe_only() {
    let mut session = MockSession::new();
    session.dom_sources = vec!["https://cdn.example.com/v.m3u8".to_string()];
    let session = Arc::new(session);

    let report = capture(&fast_config(), session).await.unwrap();

    assert_eq!(report.outcome, CaptureOutcome::Found);
    assert_eq!(
        report.manifest_url.as_deref(),
        Some("https://cdn.example.com/v.m3u8")
    );
    assert_eq!(report.all_candidates[0].source, CandidateSource::DomProbe);
}

#[tokio::test]
async fn test_deadline_exceeded_without_traffic() {
    let mut config = fast_config();
    config.deadline = Duration::from_millis(400);
    config.activation_grace = Duration::from_millis(100);

    let session = Arc::new(MockSession::new());
    let started = Instant::now();
    let report = capture(&config, session.clone()).await.unwrap();

    assert!(started.elapsed() >= config.deadline);
    assert_eq!(report.outcome, CaptureOutcome::DeadlineExceeded);
    assert!(report.manifest_url.is_none());
    assert!(report.all_candidates.is_empty());
    // The grace period elapsed with nothing observed, so the page was
    // nudged with a scroll before the deadline.
    assert!(session.scrolled.load(Ordering::SeqCst));
    assert_eq!(session.close_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_scroll_nudge_waits_for_grace_after_activation() {
    let mut session = MockSession::new();
    session.nav_delay = Duration::from_millis(600);
    let session = Arc::new(session);

    let mut config = fast_config();
    config.deadline = Duration::from_millis(2_000);
    config.navigation_timeout = Duration::from_millis(1_000);
    config.activation_grace = Duration::from_millis(700);

    let started = Instant::now();
    let report = capture(&config, session.clone()).await.unwrap();

    assert_eq!(report.outcome, CaptureOutcome::DeadlineExceeded);
    assert!(session.scrolled.load(Ordering::SeqCst));

    // The grace window opens after activation, so a slow navigation must
    // push the nudge out rather than eat into the window.
    let scrolled_at = session.scrolled_at.lock().unwrap().unwrap();
    let nudge_after = scrolled_at.duration_since(started);
    assert!(
        nudge_after >= session.nav_delay + config.activation_grace,
        "scroll nudge fired {}ms after start, expected at least {}ms",
        nudge_after.as_millis(),
        (session.nav_delay + config.activation_grace).as_millis()
    );
}

#[tokio::test]
async fn test_click_gated_player() {
    let mut session = MockSession::new();
    session.click_events.insert(
        ".vjs-big-play-button".to_string(),
        vec![NetworkEvent::Request {
            url: "https://cdn.example.com/live/index.m3u8".to_string(),
        }],
    );
    let session = Arc::new(session);

    let report = capture(&fast_config(), session).await.unwrap();

    assert_eq!(report.outcome, CaptureOutcome::Found);
    assert_eq!(
        report.manifest_url.as_deref(),
        Some("https://cdn.example.com/live/index.m3u8")
    );

    let winning = report
        .activation_log
        .iter()
        .find(|attempt| attempt.action == "click:.vjs-big-play-button")
        .unwrap();
    assert!(winning.succeeded);
    // The higher-priority selectors were tried and failed first.
    assert!(report.activation_log.iter().any(|attempt| {
        attempt.action == "click:button[aria-label*='play' i]" && !attempt.succeeded
    }));
}

#[tokio::test]
async fn test_hard_navigation_failure() {
    let mut session = MockSession::new();
    session.nav = NavBehavior::ConnectionRefused;
    let session = Arc::new(session);

    let report = capture(&fast_config(), session.clone()).await.unwrap();

    assert_eq!(report.outcome, CaptureOutcome::NavigationFailed);
    assert!(report.manifest_url.is_none());
    assert!(report.all_candidates.is_empty());
    assert!(report.activation_log.is_empty());
    assert_eq!(session.close_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_navigation_timeout_still_observes_traffic() {
    let mut session = MockSession::new();
    session.nav = NavBehavior::TimedOut;
    session.nav_events = vec![NetworkEvent::Response {
        url: "https://cdn.example.com/playlist".to_string(),
        content_type: Some("application/vnd.apple.mpegurl".to_string()),
    }];
    session.nav_event_delay = Duration::from_millis(100);
    let session = Arc::new(session);

    let report = capture(&fast_config(), session).await.unwrap();

    assert_eq!(report.outcome, CaptureOutcome::Found);
    assert_eq!(report.all_candidates[0].source, CandidateSource::Response);
    assert_eq!(
        report.all_candidates[0].content_type.as_deref(),
        Some("application/vnd.apple.mpegurl")
    );
}

#[tokio::test]
async fn test_rotating_tokens_deduplicate() {
    let mut session = MockSession::new();
    session.nav_events = vec![
        NetworkEvent::Request {
            url: "https://cdn.example.com/live.m3u8?token=first".to_string(),
        },
        NetworkEvent::Request {
            url: "https://cdn.example.com/live.m3u8?token=second".to_string(),
        },
    ];
    let session = Arc::new(session);

    let report = capture(&fast_config(), session).await.unwrap();

    assert_eq!(report.all_candidates.len(), 1);
    assert_eq!(
        report.manifest_url.as_deref(),
        Some("https://cdn.example.com/live.m3u8?token=first")
    );
}

#[tokio::test]
async fn test_master_playlist_preferred_over_earlier_variant() {
    let mut session = MockSession::new();
    session.nav_events = vec![
        NetworkEvent::Request {
            url: "https://cdn.example.com/stream/variant_720.m3u8".to_string(),
        },
        NetworkEvent::Request {
            url: "https://cdn.example.com/stream/master.m3u8".to_string(),
        },
    ];
    let session = Arc::new(session);

    let report = capture(&fast_config(), session).await.unwrap();

    assert_eq!(report.outcome, CaptureOutcome::Found);
    assert_eq!(
        report.manifest_url.as_deref(),
        Some("https://cdn.example.com/stream/master.m3u8")
    );
    assert_eq!(report.all_candidates.len(), 2);
}

#[tokio::test]
async fn test_user_selector_tried_before_builtins() {
    let mut session = MockSession::new();
    session.click_events.insert(
        ".custom-play".to_string(),
        vec![NetworkEvent::Request {
            url: "https://cdn.example.com/live.m3u8".to_string(),
        }],
    );
    let session = Arc::new(session);

    let mut config = fast_config();
    config.extra_selectors = vec![".custom-play".to_string()];

    let report = capture(&config, session).await.unwrap();

    assert_eq!(report.outcome, CaptureOutcome::Found);
    // The user selector succeeded, so nothing after it was attempted.
    assert_eq!(report.activation_log.len(), 1);
    assert_eq!(report.activation_log[0].action, "click:.custom-play");
    assert!(report.activation_log[0].succeeded);
}
