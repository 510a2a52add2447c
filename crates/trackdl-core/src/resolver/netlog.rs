//! Network-log fallback: pick the stream URL out of requests the page made.

use crate::config::ResolverConfig;

/// Best URL among `urls` (oldest first).
///
/// Scans newest-first. A manifest request wins outright. Otherwise the newest
/// request to the media host is kept; if it is a segment URL it is rewritten
/// to the manifest next to it.
pub fn pick_stream_url(urls: &[String], cfg: &ResolverConfig) -> Option<String> {
    let mut media_candidate: Option<&str> = None;
    for url in urls.iter().rev() {
        if url.contains(&cfg.manifest_marker) {
            tracing::debug!(
                url = %crate::logging::url_prefix(url),
                "manifest request in network log"
            );
            return Some(url.clone());
        }
        if media_candidate.is_none() && url.contains(&cfg.media_host_marker) {
            media_candidate = Some(url);
        }
    }

    let candidate = media_candidate?;
    match synthesize_manifest(candidate, &cfg.segment_marker, &cfg.manifest_filename) {
        Some(manifest) => {
            tracing::debug!(
                from = %crate::logging::url_prefix(candidate),
                to = %crate::logging::url_prefix(&manifest),
                "synthesized manifest from segment request"
            );
            Some(manifest)
        }
        None => Some(candidate.to_string()),
    }
}

/// `.../seg-1-a1.ts?x` → `.../index.m3u8`. None if `url` has no segment suffix.
pub fn synthesize_manifest(
    url: &str,
    segment_marker: &str,
    manifest_filename: &str,
) -> Option<String> {
    let cut = url.rfind(segment_marker)?;
    Some(format!("{}/{}", &url[..cut], manifest_filename))
}
