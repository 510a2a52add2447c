//! Attaching to the configured browser session.

use anyhow::{Context, Result};
use trackdl_core::browser::{SessionSlot, WebDriverSession};
use trackdl_core::config::SessionConfig;

/// Session held in `slot`, attaching on first use.
pub(crate) fn attach<'a>(
    slot: &'a mut SessionSlot<WebDriverSession>,
    cfg: &SessionConfig,
) -> Result<&'a WebDriverSession> {
    let session_id = cfg
        .session_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .context("no browser session: pass --session-id or set session.session_id in the config")?;
    slot.ensure(|| WebDriverSession::attach(&cfg.webdriver_url, session_id))
        .with_context(|| format!("attach to session {} at {}", session_id, cfg.webdriver_url))
}
