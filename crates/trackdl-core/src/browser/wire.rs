//! WebDriver wire calls over libcurl: JSON in, `value` out.

use serde_json::Value;
use std::time::Duration;

use super::BrowserError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Performs one WebDriver command and returns the response's `value` member.
pub(super) fn call(
    method: Method,
    url: &str,
    body: Option<&Value>,
    timeout: Duration,
) -> Result<Value, BrowserError> {
    let mut response = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.custom_request(method.as_str())?;
    easy.connect_timeout(Duration::from_secs(5))?;
    easy.timeout(timeout)?;

    let mut list = curl::easy::List::new();
    list.append("Content-Type: application/json; charset=utf-8")?;
    list.append("Accept: application/json")?;
    easy.http_headers(list)?;

    if method == Method::Post {
        let payload = body.cloned().unwrap_or_else(|| Value::Object(Default::default()));
        easy.post(true)?;
        easy.post_fields_copy(payload.to_string().as_bytes())?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            response.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    decode_response(status, &response)
}

/// Splits a WebDriver response into its `value` or a protocol error.
pub(super) fn decode_response(status: u32, body: &[u8]) -> Result<Value, BrowserError> {
    let parsed: Value = serde_json::from_slice(body).map_err(|e| {
        BrowserError::Decode(format!("HTTP {} with non-JSON body: {}", status, e))
    })?;
    let value = parsed.get("value").cloned().unwrap_or(Value::Null);

    if (200..300).contains(&status) {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    Err(BrowserError::Protocol {
        status,
        error,
        message,
    })
}

/// True for the W3C "no such element" error code.
pub(super) fn is_no_such_element(err: &BrowserError) -> bool {
    matches!(err, BrowserError::Protocol { error, .. } if error == "no such element")
}
