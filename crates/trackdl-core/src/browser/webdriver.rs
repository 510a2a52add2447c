//! W3C WebDriver client attached to an existing session.
//!
//! The browser is launched and logged in elsewhere; this client only issues
//! commands against `{webdriver_url}/session/{session_id}`. Performance log
//! access uses the chromedriver log endpoint, so the session must have been
//! created with `goog:loggingPrefs = {"performance": "ALL"}`.

use serde_json::{json, Value};
use std::time::Duration;

use super::perf_log::PerfLogEntry;
use super::wire::{self, Method};
use super::{BrowserError, BrowserSession, Cookie, ElementRef};

/// Key of a W3C element reference object.
const ELEMENT_KEY: &str = "element-6066-11e4-a94c-4a5e45e4b7b4";

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct WebDriverSession {
    base: String,
    session_id: String,
}

impl WebDriverSession {
    /// Attaches to `session_id` on the driver at `webdriver_url`. Verifies the
    /// session answers before returning.
    pub fn attach(webdriver_url: &str, session_id: &str) -> Result<Self, BrowserError> {
        let session = Self {
            base: webdriver_url.trim_end_matches('/').to_string(),
            session_id: session_id.to_string(),
        };
        let current = session.command(Method::Get, "/url", None)?;
        tracing::info!(
            session_id,
            page = %current.as_str().map(crate::logging::url_prefix).unwrap_or(""),
            "attached to browser session"
        );
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, BrowserError> {
        let url = format!("{}/session/{}{}", self.base, self.session_id, path);
        wire::call(method, &url, body.as_ref(), COMMAND_TIMEOUT)
    }

    fn locate(&self, path: &str, selector: &str) -> Result<Option<ElementRef>, BrowserError> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.command(Method::Post, path, Some(body)) {
            Ok(value) => element_from_value(&value).map(Some),
            Err(e) if wire::is_no_such_element(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn element_json(element: &ElementRef) -> Value {
    json!({ ELEMENT_KEY: element.0 })
}

fn element_from_value(value: &Value) -> Result<ElementRef, BrowserError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementRef(id.to_string()))
        .ok_or_else(|| BrowserError::Decode(format!("not an element reference: {}", value)))
}

fn elements_from_value(value: &Value) -> Result<Vec<ElementRef>, BrowserError> {
    value
        .as_array()
        .ok_or_else(|| BrowserError::Decode(format!("expected element array: {}", value)))?
        .iter()
        .map(element_from_value)
        .collect()
}

impl BrowserSession for WebDriverSession {
    fn find_element(&self, selector: &str) -> Result<Option<ElementRef>, BrowserError> {
        self.locate("/element", selector)
    }

    fn find_elements(&self, selector: &str) -> Result<Vec<ElementRef>, BrowserError> {
        let body = json!({ "using": "css selector", "value": selector });
        let value = self.command(Method::Post, "/elements", Some(body))?;
        elements_from_value(&value)
    }

    fn find_child(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, BrowserError> {
        self.locate(&format!("/element/{}/element", parent.0), selector)
    }

    fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>, BrowserError> {
        let value = self.command(
            Method::Get,
            &format!("/element/{}/attribute/{}", element.0, name),
            None,
        )?;
        Ok(value.as_str().map(str::to_string))
    }

    fn click(&self, element: &ElementRef) -> Result<(), BrowserError> {
        // Script click fires on covered or zero-size play buttons too.
        self.evaluate_script("arguments[0].click();", &[element_json(element)])?;
        Ok(())
    }

    fn evaluate_script(&self, script: &str, args: &[Value]) -> Result<Value, BrowserError> {
        let body = json!({ "script": script, "args": args });
        self.command(Method::Post, "/execute/sync", Some(body))
    }

    fn performance_log(&self) -> Result<Vec<PerfLogEntry>, BrowserError> {
        let value = self.command(Method::Post, "/se/log", Some(json!({ "type": "performance" })))?;
        serde_json::from_value(value)
            .map_err(|e| BrowserError::Decode(format!("performance log: {}", e)))
    }

    fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        let value = self.command(Method::Get, "/cookie", None)?;
        serde_json::from_value(value)
            .map_err(|e| BrowserError::Decode(format!("cookies: {}", e)))
    }

    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.command(Method::Post, "/url", Some(json!({ "url": url })))?;
        Ok(())
    }

    fn focus(&self) -> Result<(), BrowserError> {
        let handle = self.command(Method::Get, "/window", None)?;
        self.command(Method::Post, "/window", Some(json!({ "handle": handle })))?;
        Ok(())
    }
}
