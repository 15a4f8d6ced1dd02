use thiserror::Error;

#[derive(Error, Debug)]
pub enum MiharuError {
    #[error("failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("invalid input event: {0}")]
    InputEvent(String),

    #[error("element interaction failed: {0}")]
    Interaction(String),

    #[error("browser session is already closed")]
    SessionClosed,

    #[error(transparent)]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

pub type MiharuResult<T> = Result<T, MiharuError>;
