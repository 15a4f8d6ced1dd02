//! Chromium-backed [`PageSession`] implementation on top of chromiumoxide.

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::{
        input::{
            DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
            DispatchMouseEventType, MouseButton,
        },
        network::{EventRequestWillBeSent, EventResponseReceived, SetUserAgentOverrideParams},
    },
    Page,
};
use futures::StreamExt;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use super::{FrameHandle, NavigationStatus, NetworkEvent, PageSession};
use crate::error::{MiharuError, MiharuResult};

/// Fixed, realistic identity. Bot-detection heuristics degrade the player
/// experience for the default headless user agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

pub const DEFAULT_VIEWPORT: (u32, u32) = (1280, 720);

const MEDIA_SOURCES_SCRIPT: &str = r#"(() => {
    const urls = [];
    for (const video of document.querySelectorAll('video')) {
        if (video.currentSrc) urls.push(video.currentSrc);
        if (video.src) urls.push(video.src);
        for (const source of video.querySelectorAll('source')) {
            if (source.src) urls.push(source.src);
        }
    }
    return urls;
})()"#;

#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub headless: bool,
    pub user_agent: String,
    pub viewport: (u32, u32),
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport: DEFAULT_VIEWPORT,
        }
    }
}

pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    page: Page,
    events: Mutex<Option<UnboundedReceiver<NetworkEvent>>>,
    viewport: (u32, u32),
}

impl ChromiumSession {
    /// Launch a browser, open one page with the configured identity, and
    /// start forwarding its network lifecycle events.
    pub async fn launch(options: ChromiumOptions) -> MiharuResult<Self> {
        let (width, height) = options.viewport;
        let mut builder = BrowserConfig::builder().window_size(width, height);
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(MiharuError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        let identity = SetUserAgentOverrideParams::builder()
            .user_agent(options.user_agent.as_str())
            .build()
            .map_err(MiharuError::BrowserLaunch)?;
        page.set_user_agent(identity).await?;

        let (tx, rx) = mpsc::unbounded_channel();

        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let request_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let sent = request_tx.send(NetworkEvent::Request {
                    url: event.request.url.clone(),
                });
                if sent.is_err() {
                    break;
                }
            }
        });

        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let content_type = match event.response.mime_type.as_str() {
                    "" => None,
                    mime_type => Some(mime_type.to_string()),
                };
                let sent = tx.send(NetworkEvent::Response {
                    url: event.response.url.clone(),
                    content_type,
                });
                if sent.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            events: Mutex::new(Some(rx)),
            viewport: options.viewport,
        })
    }

    fn viewport_center(&self) -> (f64, f64) {
        let (width, height) = self.viewport;
        (f64::from(width) / 2.0, f64::from(height) / 2.0)
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    fn network_events(&self) -> MiharuResult<UnboundedReceiver<NetworkEvent>> {
        self.events
            .lock()
            .unwrap()
            .take()
            .ok_or(MiharuError::SessionClosed)
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> MiharuResult<NavigationStatus> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(NavigationStatus::Loaded),
            Ok(Err(error)) => Err(MiharuError::Navigation(error.to_string())),
            Err(_) => Ok(NavigationStatus::TimedOut),
        }
    }

    async fn frames(&self) -> Vec<FrameHandle> {
        let child_count: usize = self
            .page
            .evaluate("document.querySelectorAll('iframe').length")
            .await
            .ok()
            .and_then(|value| value.into_value().ok())
            .unwrap_or(0);
        (0..=child_count).map(FrameHandle).collect()
    }

    async fn click(&self, frame: FrameHandle, selector: &str) -> MiharuResult<()> {
        if frame.is_main() {
            self.page.find_element(selector).await?.click().await?;
            return Ok(());
        }

        // Cross-origin iframes have no reachable contentDocument; the
        // thrown error surfaces as a failed attempt for this strategy.
        let script = format!(
            r#"(() => {{
                const frame = document.querySelectorAll('iframe')[{index}];
                const doc = frame && frame.contentDocument;
                const el = doc && doc.querySelector({selector});
                if (!el) throw new Error('no element matching selector in frame');
                el.click();
                return true;
            }})()"#,
            index = frame.0 - 1,
            selector = serde_json::to_string(selector)?,
        );
        self.page.evaluate(script).await?;
        Ok(())
    }

    async fn press_space(&self, _frame: FrameHandle) -> MiharuResult<()> {
        for event_type in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let event = DispatchKeyEventParams::builder()
                .r#type(event_type)
                .key(" ")
                .code("Space")
                .text(" ")
                .build()
                .map_err(MiharuError::InputEvent)?;
            self.page.execute(event).await?;
        }
        Ok(())
    }

    async fn click_center(&self, _frame: FrameHandle) -> MiharuResult<()> {
        let (x, y) = self.viewport_center();
        for event_type in [
            DispatchMouseEventType::MousePressed,
            DispatchMouseEventType::MouseReleased,
        ] {
            let event = DispatchMouseEventParams::builder()
                .r#type(event_type)
                .x(x)
                .y(y)
                .button(MouseButton::Left)
                .click_count(1)
                .build()
                .map_err(MiharuError::InputEvent)?;
            self.page.execute(event).await?;
        }
        Ok(())
    }

    async fn scroll_by(&self, delta_x: f64, delta_y: f64) -> MiharuResult<()> {
        let (x, y) = self.viewport_center();
        let event = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(x)
            .y(y)
            .delta_x(delta_x)
            .delta_y(delta_y)
            .build()
            .map_err(MiharuError::InputEvent)?;
        self.page.execute(event).await?;
        Ok(())
    }

    async fn media_element_sources(&self) -> MiharuResult<Vec<String>> {
        let sources: Vec<String> = self
            .page
            .evaluate(MEDIA_SOURCES_SCRIPT)
            .await?
            .into_value()?;
        Ok(sources)
    }

    async fn close(&self) -> MiharuResult<()> {
        let browser = { self.browser.lock().unwrap().take() };
        if let Some(mut browser) = browser {
            browser.close().await?;
            let _ = browser.wait().await;
        }
        Ok(())
    }
}
