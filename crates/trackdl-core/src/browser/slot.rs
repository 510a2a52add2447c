//! Owned holder for the single browser session of an application instance.

use super::{BrowserError, BrowserSession};

/// Holds at most one session. The owner passes it around explicitly.
pub struct SessionSlot<S> {
    session: Option<S>,
}

impl<S> Default for SessionSlot<S> {
    fn default() -> Self {
        Self { session: None }
    }
}

impl<S: BrowserSession> SessionSlot<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.session.is_some()
    }

    /// Returns the held session, attaching with `attach` on first use.
    ///
    /// When a session is already held, it is focused instead and `attach` is
    /// not called. A failed focus is logged and the session is still returned.
    pub fn ensure<F>(&mut self, attach: F) -> Result<&S, BrowserError>
    where
        F: FnOnce() -> Result<S, BrowserError>,
    {
        match self.session {
            Some(ref session) => {
                if let Err(e) = session.focus() {
                    tracing::warn!("could not focus existing session: {}", e);
                }
            }
            None => self.session = Some(attach()?),
        }
        self.get()
    }

    pub fn get(&self) -> Result<&S, BrowserError> {
        self.session.as_ref().ok_or(BrowserError::Detached)
    }

    /// Drops the held session (e.g. the window was closed).
    pub fn release(&mut self) -> Option<S> {
        self.session.take()
    }
}
