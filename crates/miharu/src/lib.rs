//! Browser-driven capture of streaming-media manifest URLs (HLS `.m3u8`,
//! DASH `.mpd`) from dynamically rendered web pages, under a wall-clock
//! deadline.
//!
//! ```text
//! ┌──────────────────┐  request / response   ┌──────────────────┐
//! │                  ├───────────────────────►                  │
//! │  Browser Session │                       │ Traffic Observer │
//! │   [PageSession]  │   DOM probe           │   + Classifier   │
//! │                  ◄───────────────────────┤                  │
//! └───▲──────────▲───┘                       └────────┬─────────┘
//!     │          │                                    │ record
//!     │ gestures │ navigate / poll / close   ┌────────▼─────────┐
//! ┌───┴──────┐ ┌─┴────────────────┐ snapshot │                  │
//! │ Playback │ │     Session      ◄──────────┤ Candidate Ledger │
//! │ Activator│ │    Controller    │          │                  │
//! └───▲──────┘ └─┬──────────────┬─┘          └──────────────────┘
//!     └──────────┘              │ CaptureReport
//!                      ┌────────▼─────────┐
//!                      │  Result Exporter │
//!                      └──────────────────┘
//! ```

pub mod activate;
pub mod capture;
pub mod classify;
pub mod error;
pub mod export;
pub mod ledger;
pub mod observe;
pub mod session;

pub use capture::{capture, CaptureConfig, CaptureOutcome, CaptureReport};
pub use classify::{classify, ManifestKind};
pub use error::{MiharuError, MiharuResult};
