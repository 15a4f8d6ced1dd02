use serde::Serialize;

use crate::session::{FrameHandle, PageSession};

/// Play controls of common player widgets, most specific first. A bare
/// `<video>` element reacts to a direct click in several players, so it
/// stays in as the last selector resort.
pub const DEFAULT_PLAY_SELECTORS: &[&str] = &[
    "button[aria-label*='play' i]",
    "button[title*='play' i]",
    ".vjs-big-play-button",
    ".ytp-large-play-button",
    ".jw-display-icon-display",
    "video",
];

/// One (frame, strategy) pair the activator tried.
#[derive(Serialize, Debug, Clone)]
pub struct ActivationAttempt {
    pub frame: FrameHandle,
    pub action: String,
    pub succeeded: bool,
}

/// Best-effort engine that nudges lazy or gesture-gated players into
/// starting playback. "Success" only means the gesture was delivered
/// without the session reporting an error; whether media actually started
/// is confirmed by the traffic observer, not here.
pub struct PlaybackActivator {
    selectors: Vec<String>,
}

impl PlaybackActivator {
    /// User-supplied selectors are tried before the built-in list.
    pub fn new(extra_selectors: &[String]) -> Self {
        let selectors = extra_selectors
            .iter()
            .cloned()
            .chain(DEFAULT_PLAY_SELECTORS.iter().map(|s| s.to_string()))
            .collect();
        Self { selectors }
    }

    /// Run the strategies against every frame currently attached to the
    /// page. Never fails; every attempt lands in the returned log.
    pub async fn activate_all(&self, session: &dyn PageSession) -> Vec<ActivationAttempt> {
        let mut attempts = Vec::new();
        for frame in session.frames().await {
            self.attempt(session, frame, &mut attempts).await;
        }
        attempts
    }

    /// Strategies in priority order, stopping at the first success:
    /// selector clicks, then a space key press, then a pointer click at
    /// the viewport center.
    async fn attempt(
        &self,
        session: &dyn PageSession,
        frame: FrameHandle,
        attempts: &mut Vec<ActivationAttempt>,
    ) {
        for selector in &self.selectors {
            match session.click(frame, selector).await {
                Ok(()) => {
                    log::info!("activation click succeeded on {frame}: {selector}");
                    attempts.push(ActivationAttempt {
                        frame,
                        action: format!("click:{selector}"),
                        succeeded: true,
                    });
                    return;
                }
                Err(error) => {
                    log::debug!("activation click failed on {frame}: {selector}: {error}");
                    attempts.push(ActivationAttempt {
                        frame,
                        action: format!("click:{selector}"),
                        succeeded: false,
                    });
                }
            }
        }

        match session.press_space(frame).await {
            Ok(()) => {
                attempts.push(ActivationAttempt {
                    frame,
                    action: "key:space".to_string(),
                    succeeded: true,
                });
                return;
            }
            Err(error) => {
                log::debug!("space key press failed on {frame}: {error}");
                attempts.push(ActivationAttempt {
                    frame,
                    action: "key:space".to_string(),
                    succeeded: false,
                });
            }
        }

        let succeeded = match session.click_center(frame).await {
            Ok(()) => true,
            Err(error) => {
                log::debug!("center click failed on {frame}: {error}");
                false
            }
        };
        attempts.push(ActivationAttempt {
            frame,
            action: "click:viewport-center".to_string(),
            succeeded,
        });
    }
}
