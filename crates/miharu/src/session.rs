pub mod chromium;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::MiharuResult;

/// A frame inside the page. `FrameHandle(0)` is the main frame; higher
/// indices address the child iframes in document order at the time of the
/// `frames` call.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct FrameHandle(pub usize);

impl FrameHandle {
    pub const MAIN: FrameHandle = FrameHandle(0);

    pub fn is_main(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_main() {
            write!(f, "main")
        } else {
            write!(f, "iframe#{}", self.0 - 1)
        }
    }
}

/// Network lifecycle notification delivered by the browser session.
///
/// Requests are visible before their response arrives; a manifest fetched
/// right before teardown may only ever surface as a `Request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Request {
        url: String,
    },
    Response {
        url: String,
        content_type: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationStatus {
    Loaded,
    /// The load event did not fire in time. Not fatal: pages keep issuing
    /// subsidiary requests well past "page load" semantics.
    TimedOut,
}

/// The controllable browser session the capture engine runs against.
///
/// Implementations expose request/response observability plus the minimal
/// DOM and input surface the engine needs. The session is created and
/// closed by the controller only; observers and activators borrow it.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Take the stream of network lifecycle events. The channel stays open
    /// for the lifetime of the session and can only be taken once.
    fn network_events(&self) -> MiharuResult<UnboundedReceiver<NetworkEvent>>;

    /// Navigate the main frame. `Err` means a hard failure (DNS failure,
    /// connection refused); a timeout is a normal `Ok(TimedOut)`.
    async fn navigate(&self, url: &str, timeout: Duration) -> MiharuResult<NavigationStatus>;

    /// Main frame plus every child frame reachable right now.
    async fn frames(&self) -> Vec<FrameHandle>;

    /// Click the first element matching `selector` inside `frame`.
    async fn click(&self, frame: FrameHandle, selector: &str) -> MiharuResult<()>;

    /// Dispatch a space key press. Key events go to the focused document,
    /// so the frame is advisory.
    async fn press_space(&self, frame: FrameHandle) -> MiharuResult<()>;

    /// Synthetic pointer click at the visual center of the viewport.
    async fn click_center(&self, frame: FrameHandle) -> MiharuResult<()>;

    /// Mouse-wheel scroll on the main frame.
    async fn scroll_by(&self, delta_x: f64, delta_y: f64) -> MiharuResult<()>;

    /// `src`/`currentSrc` of every `<video>` element and its `<source>`
    /// children, for players that never issue an observable request.
    async fn media_element_sources(&self) -> MiharuResult<Vec<String>>;

    /// Tear the session down. Must be idempotent.
    async fn close(&self) -> MiharuResult<()>;
}
