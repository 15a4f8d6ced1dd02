use serde::{Deserialize, Serialize};

/// MIME types that identify an HLS playlist regardless of the URL shape.
pub const HLS_MIME_TYPES: &[&str] = &[
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
];

/// MIME type registered for MPEG-DASH MPDs.
pub const DASH_MIME_TYPES: &[&str] = &["application/dash+xml"];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    HLS,
    DASH,
}

/// Decide whether a URL observed on the wire is a manifest candidate.
///
/// A present content-type from the manifest MIME sets wins over the URL
/// shape, so a playlist served from an extensionless endpoint is still
/// caught once its response arrives.
///
/// A bare `m3u8` substring anywhere in the URL is accepted as a looser HLS
/// signal: some players pass the playlist as a query value instead of a
/// path extension. This trades precision for recall.
pub fn classify(url: &str, content_type: Option<&str>) -> Option<ManifestKind> {
    if url.is_empty() {
        return None;
    }

    if let Some(content_type) = content_type {
        // Strip any "; charset=..." parameter before matching.
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim()
            .to_ascii_lowercase();
        if HLS_MIME_TYPES.contains(&essence.as_str()) {
            return Some(ManifestKind::HLS);
        }
        if DASH_MIME_TYPES.contains(&essence.as_str()) {
            return Some(ManifestKind::DASH);
        }
    }

    let lower = url.to_ascii_lowercase();
    if has_extension(&lower, ".m3u8") {
        return Some(ManifestKind::HLS);
    }
    if has_extension(&lower, ".mpd") {
        return Some(ManifestKind::DASH);
    }
    if lower.contains("m3u8") {
        return Some(ManifestKind::HLS);
    }

    None
}

/// Matches `ext` at the end of the path or at the end of the query string.
fn has_extension(url_lower: &str, ext: &str) -> bool {
    let without_fragment = url_lower.split('#').next().unwrap_or(url_lower);
    let path = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    path.ends_with(ext) || without_fragment.ends_with(ext)
}
