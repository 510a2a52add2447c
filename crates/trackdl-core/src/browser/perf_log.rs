//! Chrome performance log entries and the network requests they record.
//!
//! Each entry's `message` is itself a JSON document wrapping a DevTools event:
//! `{"message": {"method": "Network.requestWillBeSent", "params": {"request": {"url": ...}}}}`.

use serde::Deserialize;

/// One raw performance log entry as returned by the driver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PerfLogEntry {
    /// JSON-encoded DevTools event.
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub level: String,
}

impl PerfLogEntry {
    /// Entry wrapping a `Network.requestWillBeSent` event for `url`.
    pub fn request_will_be_sent(url: &str, timestamp: i64) -> Self {
        let message = serde_json::json!({
            "message": {
                "method": "Network.requestWillBeSent",
                "params": { "request": { "url": url } }
            }
        });
        Self {
            message: message.to_string(),
            timestamp,
            level: "INFO".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DevtoolsWrapper {
    message: DevtoolsEvent,
}

#[derive(Debug, Deserialize)]
struct DevtoolsEvent {
    #[serde(default)]
    method: String,
    #[serde(default)]
    params: Option<RequestParams>,
}

#[derive(Debug, Deserialize)]
struct RequestParams {
    #[serde(default)]
    request: Option<RequestInfo>,
}

#[derive(Debug, Deserialize)]
struct RequestInfo {
    #[serde(default)]
    url: String,
}

const REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";

/// URLs of outgoing requests, in log order. Entries that are not request
/// events or do not parse are skipped.
pub fn network_request_urls(entries: &[PerfLogEntry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| {
            let wrapper: DevtoolsWrapper = serde_json::from_str(&entry.message).ok()?;
            if wrapper.message.method != REQUEST_WILL_BE_SENT {
                return None;
            }
            let url = wrapper.message.params?.request?.url;
            if url.is_empty() {
                None
            } else {
                Some(url)
            }
        })
        .collect()
}
