use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::{
    classify::classify,
    error::MiharuResult,
    ledger::{Candidate, CandidateLedger, CandidateSource},
    session::{NetworkEvent, PageSession},
};

/// Feeds every observed URL through the classifier into the ledger.
///
/// Requests are recorded the moment they are issued: some manifests never
/// get an inspectable response, e.g. when the session is torn down while
/// the fetch is still in flight. Responses are classified again with their
/// content-type, which catches extensionless playlist endpoints.
pub struct TrafficObserver {
    ledger: Arc<CandidateLedger>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl TrafficObserver {
    pub fn new(ledger: Arc<CandidateLedger>) -> Self {
        Self {
            ledger,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Take the session's event stream and consume it on a spawned task
    /// until the session closes. Nothing in the handler can abort the
    /// capture; a malformed observation is dropped, not propagated.
    pub fn attach(&self, session: &dyn PageSession) -> MiharuResult<JoinHandle<()>> {
        let mut events = session.network_events()?;
        let ledger = self.ledger.clone();
        let seen = self.seen.clone();

        Ok(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    NetworkEvent::Request { url } => {
                        seen.lock().unwrap().push(url.clone());
                        if let Some(kind) = classify(&url, None) {
                            let recorded = ledger.record(Candidate::new(
                                url.clone(),
                                kind,
                                None,
                                CandidateSource::Request,
                            ));
                            if recorded {
                                log::info!("manifest candidate from request: {url}");
                            }
                        }
                    }
                    NetworkEvent::Response { url, content_type } => {
                        if let Some(kind) = classify(&url, content_type.as_deref()) {
                            let recorded = ledger.record(Candidate::new(
                                url.clone(),
                                kind,
                                content_type,
                                CandidateSource::Response,
                            ));
                            if recorded {
                                log::info!("manifest candidate from response: {url}");
                            }
                        }
                    }
                }
            }
        }))
    }

    /// One-shot inspection of `<video>`/`<source>` elements after the
    /// initial load. Covers players that set the manifest URL as a DOM
    /// property without ever issuing an observable request for it.
    pub async fn probe_dom(&self, session: &dyn PageSession) {
        let sources = match session.media_element_sources().await {
            Ok(sources) => sources,
            Err(error) => {
                log::warn!("DOM media probe failed: {error}");
                return;
            }
        };

        for url in sources {
            if let Some(kind) = classify(&url, None) {
                let recorded =
                    self.ledger
                        .record(Candidate::new(url.clone(), kind, None, CandidateSource::DomProbe));
                if recorded {
                    log::info!("manifest candidate from DOM probe: {url}");
                }
            }
        }
    }

    /// Every raw request URL observed so far, in order.
    pub fn requests_seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}
