//! Netscape cookie jar for handing session cookies to the download tool.

use anyhow::{Context, Result};
use std::io::Write;

use crate::browser::Cookie;

/// Writes `cookies` to a temporary cookie file. The file is removed when the
/// returned handle is dropped. Cookies without a domain get `fallback_domain`.
pub fn write_cookie_file(
    cookies: &[Cookie],
    fallback_domain: &str,
) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("trackdl-cookies-")
        .suffix(".txt")
        .tempfile()
        .context("create cookie file")?;
    file.write_all(render(cookies, fallback_domain).as_bytes())
        .context("write cookie file")?;
    file.flush().context("flush cookie file")?;
    tracing::debug!(count = cookies.len(), "wrote cookie file for download tool");
    Ok(file)
}

fn render(cookies: &[Cookie], fallback_domain: &str) -> String {
    let mut out = String::from("# Netscape HTTP Cookie File\n");
    for c in cookies {
        let domain = if c.domain.is_empty() { fallback_domain } else { c.domain.as_str() };
        let include_subdomains = if domain.starts_with('.') { "TRUE" } else { "FALSE" };
        let secure = if c.secure { "TRUE" } else { "FALSE" };
        let expiry = c.expiry.map(|e| e.max(0.0) as u64).unwrap_or(0);
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            domain, include_subdomains, c.path, secure, expiry, c.name, c.value
        ));
    }
    out
}

/// Host part of `url` with a leading dot, for cookies the session reported
/// without a domain.
pub fn cookie_domain_for(url: &str) -> String {
    match url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
        Some(host) => format!(".{}", host.trim_start_matches("www.")),
        None => String::new(),
    }
}
