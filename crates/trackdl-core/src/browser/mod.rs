//! Browser session seam.
//!
//! The resolver only depends on the `BrowserSession` trait and does not know
//! how the browser was launched or logged in. `WebDriverSession` attaches to a
//! running W3C WebDriver session; tests use an in-memory fake.

mod perf_log;
mod slot;
mod webdriver;
mod wire;

#[cfg(test)]
pub(crate) mod fake;

pub use perf_log::{network_request_urls, PerfLogEntry};
pub use slot::SessionSlot;
pub use webdriver::WebDriverSession;

use serde::Deserialize;

/// Opaque handle to a DOM element inside the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

/// Browser cookie as reported by the session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    /// Seconds since the epoch; session cookies have none.
    pub expiry: Option<f64>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: default_cookie_path(),
            secure: false,
            expiry: None,
        }
    }
}

/// `Cookie` request header value: `a=1; b=2`. Empty when there are no cookies.
pub fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// The WebDriver endpoint could not be reached or the connection broke.
    #[error("webdriver transport: {0}")]
    Transport(#[from] curl::Error),
    /// The endpoint answered with a WebDriver error object.
    #[error("webdriver returned HTTP {status} ({error}): {message}")]
    Protocol {
        status: u32,
        error: String,
        message: String,
    },
    /// The response did not have the expected shape.
    #[error("unexpected webdriver response: {0}")]
    Decode(String),
    /// No session is attached.
    #[error("no browser session attached")]
    Detached,
}

/// Capabilities the resolver needs from a live, already-authenticated session.
///
/// Implementations are not expected to be safe for concurrent use; callers
/// drive one session from one task.
pub trait BrowserSession {
    /// First element matching `selector`, or `None` when nothing matches.
    fn find_element(&self, selector: &str) -> Result<Option<ElementRef>, BrowserError>;
    fn find_elements(&self, selector: &str) -> Result<Vec<ElementRef>, BrowserError>;
    /// First descendant of `parent` matching `selector`.
    fn find_child(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, BrowserError>;
    fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>, BrowserError>;
    fn click(&self, element: &ElementRef) -> Result<(), BrowserError>;
    /// Runs `script` synchronously in the page and returns its JSON result.
    fn evaluate_script(
        &self,
        script: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, BrowserError>;
    /// Performance log entries recorded since the previous call.
    fn performance_log(&self) -> Result<Vec<PerfLogEntry>, BrowserError>;
    fn cookies(&self) -> Result<Vec<Cookie>, BrowserError>;
    fn navigate(&self, url: &str) -> Result<(), BrowserError>;
    /// Brings the session's window to the foreground.
    fn focus(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

impl<T: BrowserSession + ?Sized> BrowserSession for Box<T> {
    fn find_element(&self, selector: &str) -> Result<Option<ElementRef>, BrowserError> {
        (**self).find_element(selector)
    }
    fn find_elements(&self, selector: &str) -> Result<Vec<ElementRef>, BrowserError> {
        (**self).find_elements(selector)
    }
    fn find_child(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, BrowserError> {
        (**self).find_child(parent, selector)
    }
    fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>, BrowserError> {
        (**self).attribute(element, name)
    }
    fn click(&self, element: &ElementRef) -> Result<(), BrowserError> {
        (**self).click(element)
    }
    fn evaluate_script(
        &self,
        script: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, BrowserError> {
        (**self).evaluate_script(script, args)
    }
    fn performance_log(&self) -> Result<Vec<PerfLogEntry>, BrowserError> {
        (**self).performance_log()
    }
    fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        (**self).cookies()
    }
    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        (**self).navigate(url)
    }
    fn focus(&self) -> Result<(), BrowserError> {
        (**self).focus()
    }
}
