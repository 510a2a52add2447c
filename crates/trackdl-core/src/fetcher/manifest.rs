//! HLS media playlist parsing for the manual fallback.

use url::Url;

/// Segment URLs listed in `body`, in order. Comment and blank lines are
/// skipped; relative references are resolved against `base`.
pub fn segment_urls(body: &str, base: &Url) -> Vec<Url> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match base.join(line) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(reference = line, "unusable segment reference: {}", e);
                None
            }
        })
        .collect()
}
