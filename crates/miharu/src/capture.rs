use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::{
    activate::{ActivationAttempt, PlaybackActivator},
    classify::ManifestKind,
    error::MiharuResult,
    ledger::{Candidate, CandidateLedger},
    observe::TrafficObserver,
    session::{NavigationStatus, PageSession},
};

/// All tunables of one capture run, passed explicitly to [`capture`].
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub page_url: String,

    /// Wall-clock budget for the whole run, authoritative over every
    /// inner timeout.
    pub deadline: Duration,

    /// How long to wait after activation before nudging the page with a
    /// scroll. Clamped to the deadline.
    pub activation_grace: Duration,

    pub navigation_timeout: Duration,

    pub poll_interval: Duration,

    /// Tried by the activator before the built-in play selectors.
    pub extra_selectors: Vec<String>,

    /// Selection tie-break: the first candidate containing one of these
    /// substrings wins, in list order. Common naming for top-level HLS
    /// playlists, not a protocol guarantee.
    pub prefer_url_substrings: Vec<String>,
}

impl CaptureConfig {
    pub fn new(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            deadline: Duration::from_millis(30_000),
            activation_grace: Duration::from_millis(8_000),
            navigation_timeout: Duration::from_millis(10_000),
            poll_interval: Duration::from_millis(250),
            extra_selectors: Vec::new(),
            prefer_url_substrings: vec!["master".to_string(), "index".to_string()],
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureOutcome {
    Found,
    DeadlineExceeded,
    NavigationFailed,
}

/// Terminal artifact of a run. Produced exactly once, on every exit path.
#[derive(Debug)]
pub struct CaptureReport {
    pub page_url: String,
    pub manifest_url: Option<String>,
    pub manifest_kind: Option<ManifestKind>,
    pub all_candidates: Vec<Candidate>,
    pub activation_log: Vec<ActivationAttempt>,
    pub outcome: CaptureOutcome,
    /// Raw request URLs in observation order, for the debug log.
    pub raw_requests: Vec<String>,
}

const OBSERVER_DRAIN: Duration = Duration::from_millis(500);

enum Detection {
    Observed(Vec<ActivationAttempt>),
    NavigationFailed,
}

/// Run the detection race against a live session.
///
/// ```text
/// INIT -> NAVIGATING -> (NAV_OK | NAV_TIMEOUT)
/// NAV_OK -> OBSERVING -> (RESOLVED | DEADLINE_EXCEEDED)
/// all    -> TEARDOWN  -> DONE
/// ```
///
/// The observer is attached before navigation so early requests are not
/// missed, and the session is closed on every path before the report is
/// assembled.
pub async fn capture(
    config: &CaptureConfig,
    session: Arc<dyn PageSession>,
) -> MiharuResult<CaptureReport> {
    let ledger = Arc::new(CandidateLedger::new());
    let observer = TrafficObserver::new(ledger.clone());
    let mut observer_task = match observer.attach(session.as_ref()) {
        Ok(task) => task,
        Err(error) => {
            if let Err(close_error) = session.close().await {
                log::warn!("failed to close browser session: {close_error}");
            }
            return Err(error);
        }
    };

    let detection = run_detection(config, session.as_ref(), &observer, &ledger).await;

    // Teardown is unconditional; closing the session is also the
    // cancellation signal for anything still pending inside it.
    if let Err(error) = session.close().await {
        log::warn!("failed to close browser session: {error}");
    }

    // The closed session ends the event stream; give the observer a short
    // window to drain whatever was already queued before the snapshot.
    if tokio::time::timeout(OBSERVER_DRAIN, &mut observer_task)
        .await
        .is_err()
    {
        observer_task.abort();
    }

    let all_candidates = ledger.snapshot();
    let (manifest_url, manifest_kind, outcome, activation_log) = match detection {
        Detection::NavigationFailed => (None, None, CaptureOutcome::NavigationFailed, Vec::new()),
        Detection::Observed(activation_log) => {
            match select_manifest(&all_candidates, &config.prefer_url_substrings) {
                Some(chosen) => (
                    Some(chosen.url.clone()),
                    Some(chosen.kind),
                    CaptureOutcome::Found,
                    activation_log,
                ),
                None => (None, None, CaptureOutcome::DeadlineExceeded, activation_log),
            }
        }
    };

    Ok(CaptureReport {
        page_url: config.page_url.clone(),
        manifest_url,
        manifest_kind,
        all_candidates,
        activation_log,
        outcome,
        raw_requests: observer.requests_seen(),
    })
}

async fn run_detection(
    config: &CaptureConfig,
    session: &dyn PageSession,
    observer: &TrafficObserver,
    ledger: &CandidateLedger,
) -> Detection {
    let started = Instant::now();

    let navigation_timeout = config.navigation_timeout.min(config.deadline);
    match session.navigate(&config.page_url, navigation_timeout).await {
        Ok(NavigationStatus::Loaded) => {}
        Ok(NavigationStatus::TimedOut) => {
            log::warn!("navigation timed out; continuing to observe network traffic");
        }
        Err(error) => {
            log::error!("navigation to {} failed: {error}", config.page_url);
            return Detection::NavigationFailed;
        }
    }

    observer.probe_dom(session).await;

    let activator = PlaybackActivator::new(&config.extra_selectors);
    let activation_log = activator.activate_all(session).await;

    // The grace window starts once activation is done; a slow navigation
    // must not eat into it.
    let activated = Instant::now();

    let mut nudged = false;
    loop {
        if !ledger.is_empty() {
            return Detection::Observed(activation_log);
        }

        let elapsed = started.elapsed();
        if elapsed >= config.deadline {
            log::warn!(
                "deadline elapsed after {}ms with {} candidates and {} requests observed",
                elapsed.as_millis(),
                ledger.len(),
                observer.requests_seen().len()
            );
            return Detection::Observed(activation_log);
        }

        if !nudged && activated.elapsed() >= config.activation_grace {
            nudged = true;
            if let Err(error) = session.scroll_by(0.0, 800.0).await {
                log::debug!("scroll nudge failed: {error}");
            }
        }

        let remaining = config.deadline - elapsed;
        tokio::time::sleep(remaining.min(config.poll_interval)).await;
    }
}

/// Prefer a candidate whose URL contains one of the configured substrings
/// (in list order); otherwise fall back to discovery order.
fn select_manifest<'a>(candidates: &'a [Candidate], prefer: &[String]) -> Option<&'a Candidate> {
    for needle in prefer {
        let needle = needle.to_ascii_lowercase();
        if let Some(candidate) = candidates
            .iter()
            .find(|candidate| candidate.url.to_ascii_lowercase().contains(&needle))
        {
            return Some(candidate);
        }
    }
    candidates.first()
}
