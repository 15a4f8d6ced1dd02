use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    activate::ActivationAttempt,
    capture::{CaptureOutcome, CaptureReport},
    classify::ManifestKind,
    error::MiharuResult,
    ledger::Candidate,
};

#[derive(Serialize)]
struct SessionSummary<'a> {
    page_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest_kind: Option<ManifestKind>,
    outcome: CaptureOutcome,
    all_candidates: &'a [Candidate],
    activation_log: &'a [ActivationAttempt],
    requests_seen: usize,
    captured_at: String,
}

/// Writes the capture artifacts into one output directory:
/// `session_info.json` with the structured summary and `requests.log`
/// with every raw URL observed, one per line.
///
/// Export is a side effect: a write failure is reported to the caller but
/// never changes the outcome the controller already determined.
pub struct ResultExporter {
    output_dir: PathBuf,
}

impl ResultExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Returns the path of the written summary.
    pub fn export(&self, report: &CaptureReport) -> MiharuResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        // The debug log is written on every outcome, before the summary,
        // so a later failure still leaves the raw traffic on disk.
        fs::write(
            self.output_dir.join("requests.log"),
            report.raw_requests.join("\n"),
        )?;

        let summary = SessionSummary {
            page_url: &report.page_url,
            manifest_url: report.manifest_url.as_deref(),
            manifest_kind: report.manifest_kind,
            outcome: report.outcome,
            all_candidates: &report.all_candidates,
            activation_log: &report.activation_log,
            requests_seen: report.raw_requests.len(),
            captured_at: Utc::now().to_rfc3339(),
        };

        let path = self.output_dir.join("session_info.json");
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, &summary)?;
        Ok(path)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
