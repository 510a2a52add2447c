//! Shared curl plumbing for the HTTP fetch paths.

use anyhow::anyhow;
use std::time::Duration;

use crate::browser::{cookie_header, Cookie};
use crate::config::SessionConfig;
use crate::error::TrackError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Request headers sent with every media request: the page's own identity
/// plus the session cookies.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    lines: Vec<String>,
}

impl RequestHeaders {
    pub fn new(session: &SessionConfig, cookies: &[Cookie]) -> Self {
        let mut lines = vec!["Accept: */*".to_string()];
        if !session.user_agent.is_empty() {
            lines.push(format!("User-Agent: {}", session.user_agent));
        }
        if !session.referer.is_empty() {
            lines.push(format!("Referer: {}", session.referer));
        }
        if !session.origin.is_empty() {
            lines.push(format!("Origin: {}", session.origin));
        }
        if !cookies.is_empty() {
            lines.push(format!("Cookie: {}", cookie_header(cookies)));
        }
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn to_list(&self) -> Result<curl::easy::List, curl::Error> {
        let mut list = curl::easy::List::new();
        for line in &self.lines {
            list.append(line)?;
        }
        Ok(list)
    }
}

/// GET handle with redirects, the common headers and an overall deadline.
pub(super) fn get_handle(
    url: &str,
    headers: &RequestHeaders,
    timeout: Duration,
) -> Result<curl::easy::Easy, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.timeout(timeout)?;
    easy.http_headers(headers.to_list()?)?;
    Ok(easy)
}

/// Buffers a whole response body. Non-2xx is an error.
pub fn get_bytes(
    url: &str,
    headers: &RequestHeaders,
    timeout: Duration,
    what: &'static str,
) -> Result<Vec<u8>, TrackError> {
    let mut body = Vec::new();
    let mut easy =
        get_handle(url, headers, timeout).map_err(|e| curl_failure(e, what, timeout))?;
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(|e| curl_failure(e, what, timeout))?;
        transfer.perform().map_err(|e| curl_failure(e, what, timeout))?;
    }
    let code = easy.response_code().map_err(|e| curl_failure(e, what, timeout))?;
    if !is_success(code) {
        return Err(TrackError::Fetch(anyhow!(
            "{} returned HTTP {} for {}",
            what,
            code,
            crate::logging::url_prefix(url)
        )));
    }
    Ok(body)
}

pub(super) fn is_success(code: u32) -> bool {
    (200..300).contains(&code)
}

/// Maps a curl failure, keeping timeouts distinct.
pub(super) fn curl_failure(e: curl::Error, what: &'static str, limit: Duration) -> TrackError {
    if e.is_operation_timedout() {
        TrackError::Timeout { what, limit }
    } else {
        TrackError::Fetch(anyhow::Error::new(e).context(format!("{} request failed", what)))
    }
}
