use std::{
    collections::HashSet,
    sync::Mutex,
    time::Instant,
};

use serde::Serialize;
use url::Url;

use crate::classify::ManifestKind;

/// How a candidate URL was discovered.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Request,
    Response,
    DomProbe,
}

/// An observed URL that may be a manifest. Immutable once recorded.
#[derive(Serialize, Debug, Clone)]
pub struct Candidate {
    pub url: String,
    pub kind: ManifestKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub source: CandidateSource,
    #[serde(skip)]
    pub observed_at: Instant,
}

impl Candidate {
    pub fn new(
        url: impl Into<String>,
        kind: ManifestKind,
        content_type: Option<String>,
        source: CandidateSource,
    ) -> Self {
        Self {
            url: url.into(),
            kind,
            content_type,
            source,
            observed_at: Instant::now(),
        }
    }
}

/// Insertion-ordered set of candidates, deduplicated by [`normalize_key`].
///
/// The first observation of a resource wins; later duplicates are dropped
/// so the ledger reflects discovery order. Safe to use from the network
/// event task and the controller at the same time, and `record` never
/// blocks beyond the inner lock.
#[derive(Default)]
pub struct CandidateLedger {
    inner: Mutex<LedgerInner>,
}

#[derive(Default)]
struct LedgerInner {
    keys: HashSet<String>,
    candidates: Vec<Candidate>,
}

impl CandidateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-insert in one step. Returns `true` if the candidate was
    /// newly recorded.
    pub fn record(&self, candidate: Candidate) -> bool {
        if candidate.url.is_empty() {
            return false;
        }

        let key = normalize_key(&candidate.url);
        let mut inner = self.inner.lock().unwrap();
        if !inner.keys.insert(key) {
            return false;
        }
        inner.candidates.push(candidate);
        true
    }

    pub fn snapshot(&self) -> Vec<Candidate> {
        self.inner.lock().unwrap().candidates.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().candidates.len()
    }
}

/// Dedup key: scheme, host and path lowercased, query and fragment
/// stripped. Signed-token query parameters rotate per request but still
/// name the same manifest, so they must not split the key.
pub fn normalize_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let port = parsed
                .port()
                .map(|port| format!(":{port}"))
                .unwrap_or_default();
            format!(
                "{}://{}{}{}",
                parsed.scheme().to_ascii_lowercase(),
                parsed.host_str().unwrap_or("").to_ascii_lowercase(),
                port,
                parsed.path().to_ascii_lowercase()
            )
        }
        // Not parseable as an absolute URL; fall back to a plain strip.
        Err(_) => url
            .split(&['?', '#'][..])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase(),
    }
}
