use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use miharu::{
    capture,
    export::ResultExporter,
    session::chromium::{ChromiumOptions, ChromiumSession},
    CaptureConfig, CaptureOutcome,
};

// Exit codes are part of the interface: downstream automation needs to
// tell "retry with more time" from "this page is unreachable".
const EXIT_FOUND: u8 = 0;
const EXIT_NO_MANIFEST: u8 = 2;
const EXIT_NAVIGATION_FAILED: u8 = 3;

#[derive(Parser, Debug, Clone)]
#[clap(name = "miharu")]
struct MiharuArgs {
    /// Directory to write session_info.json and requests.log into
    #[clap(short, long, env = "OUT_DIR", default_value = "out")]
    output_dir: PathBuf,

    /// Overall capture deadline in milliseconds
    #[clap(long, env = "TIMEOUT_MS", default_value = "30000")]
    deadline_ms: u64,

    /// Time to keep observing after playback activation before nudging
    /// the page with a scroll, in milliseconds
    #[clap(long, env = "WAIT_MS", default_value = "8000")]
    grace_ms: u64,

    /// Navigation timeout in milliseconds
    #[clap(long, default_value = "10000")]
    nav_timeout_ms: u64,

    /// Extra CSS selectors to try before the built-in play controls
    #[clap(short = 's', long = "selector")]
    selectors: Vec<String>,

    /// Custom User-Agent string
    #[clap(long)]
    user_agent: Option<String>,

    /// Run with a visible browser window
    #[clap(long)]
    headed: bool,

    /// Page to inspect
    page_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    pretty_env_logger::init();
    let args = MiharuArgs::parse();

    let mut config = CaptureConfig::new(&args.page_url);
    config.deadline = Duration::from_millis(args.deadline_ms);
    config.activation_grace = Duration::from_millis(args.grace_ms).min(config.deadline);
    config.navigation_timeout = Duration::from_millis(args.nav_timeout_ms);
    config.extra_selectors = args.selectors;

    let mut options = ChromiumOptions {
        headless: !args.headed,
        ..Default::default()
    };
    if let Some(user_agent) = args.user_agent {
        options.user_agent = user_agent;
    }

    let session = ChromiumSession::launch(options).await?;
    let report = capture(&config, Arc::new(session)).await?;

    // Export failure does not change the detection outcome.
    match ResultExporter::new(&args.output_dir).export(&report) {
        Ok(path) => log::info!("capture summary written to {}", path.display()),
        Err(error) => log::error!("failed to write capture artifacts: {error}"),
    }

    Ok(match report.outcome {
        CaptureOutcome::Found => {
            let manifest_url = report.manifest_url.as_deref().unwrap_or_default();
            log::info!("captured manifest URL: {manifest_url}");
            println!("{manifest_url}");
            ExitCode::from(EXIT_FOUND)
        }
        CaptureOutcome::DeadlineExceeded => {
            log::error!(
                "no manifest detected within {}ms ({} activation attempts, {} requests seen); \
                 check auth gates, playback triggers, or increase the deadline",
                args.deadline_ms,
                report.activation_log.len(),
                report.raw_requests.len()
            );
            ExitCode::from(EXIT_NO_MANIFEST)
        }
        CaptureOutcome::NavigationFailed => {
            log::error!("page could not be loaded: {}", args.page_url);
            ExitCode::from(EXIT_NAVIGATION_FAILED)
        }
    })
}
