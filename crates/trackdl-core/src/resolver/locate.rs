//! Finding a track's row on the page and starting its playback.

use crate::browser::{BrowserError, BrowserSession, ElementRef};
use crate::config::ResolverConfig;

/// `div.audio_row[data-full-id="123_456"]`.
pub fn primary_selector(cfg: &ResolverConfig, catalog_id: &str) -> String {
    format!(
        "{}[{}=\"{}\"]",
        cfg.row_selector,
        cfg.id_attribute,
        escape_attribute_value(catalog_id)
    )
}

/// Escapes `\` and `"` for use inside a double-quoted CSS attribute value.
fn escape_attribute_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Row element for `catalog_id`: primary selector first, then a linear scan
/// of all rows comparing the embedded identifier attribute.
pub fn locate_row<S: BrowserSession + ?Sized>(
    session: &S,
    cfg: &ResolverConfig,
    catalog_id: &str,
) -> Result<Option<ElementRef>, BrowserError> {
    if let Some(row) = session.find_element(&primary_selector(cfg, catalog_id))? {
        return Ok(Some(row));
    }

    let rows = session.find_elements(&cfg.row_selector)?;
    tracing::debug!(catalog_id, rows = rows.len(), "primary selector missed, scanning rows");
    for row in rows {
        match session.attribute(&row, &cfg.embedded_id_attribute) {
            Ok(Some(blob)) if blob.contains(catalog_id) => return Ok(Some(row)),
            Ok(_) => {}
            // Rows re-render while the list scrolls; a stale one is just skipped.
            Err(e) => tracing::debug!("row attribute read failed: {}", e),
        }
    }
    Ok(None)
}

/// Clicks the row's play affordance, or the row itself when it has none.
/// Best-effort: failures are logged and polling proceeds anyway.
pub fn trigger_playback<S: BrowserSession + ?Sized>(
    session: &S,
    cfg: &ResolverConfig,
    row: &ElementRef,
) {
    let play = match session.find_child(row, &cfg.play_selector) {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!("play affordance lookup failed: {}", e);
            None
        }
    };

    if let Some(button) = play {
        match session.click(&button) {
            Ok(()) => return,
            Err(e) => tracing::debug!("play button click failed, clicking row: {}", e),
        }
    }
    if let Err(e) = session.click(row) {
        tracing::warn!("could not trigger playback: {}", e);
    }
}
