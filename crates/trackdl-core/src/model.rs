//! Track descriptors and resolved stream locators.

use serde::{Deserialize, Serialize};

/// Metadata identifying a selectable catalog item before its stream URL is known.
///
/// Produced by catalog discovery; the core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub owner: String,
    /// Opaque `owner_audio` composite key used to find the track on the page.
    pub catalog_id: String,
    /// URL observed at discovery time. May have expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_url: Option<String>,
}

impl TrackDescriptor {
    pub fn new(
        artist: impl Into<String>,
        title: impl Into<String>,
        catalog_id: impl Into<String>,
    ) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            owner: String::new(),
            catalog_id: catalog_id.into(),
            hint_url: None,
        }
    }

    pub fn with_hint_url(mut self, url: impl Into<String>) -> Self {
        self.hint_url = Some(url.into());
        self
    }

    /// Hint URL if it looks fetchable over HTTP.
    pub fn usable_hint_url(&self) -> Option<&str> {
        self.hint_url
            .as_deref()
            .map(str::trim)
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
    }
}

/// How a locator's content must be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    /// Segmented manifest (HLS `.m3u8`).
    Playlist,
    /// A single media file.
    DirectFile,
}

/// Resolved, time-bounded URL for one track.
///
/// Valid only while the browser session that produced it is alive. Not `Clone`:
/// a locator is handed to exactly one fetch.
#[derive(Debug, PartialEq, Eq)]
pub struct StreamLocator {
    url: String,
    kind: LocatorKind,
}

impl StreamLocator {
    /// Builds a locator, tagging it by the shape of the URL path.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = kind_for_url(&url);
        Self { url, kind }
    }

    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: LocatorKind::DirectFile,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    pub fn into_url(self) -> String {
        self.url
    }
}

/// `Playlist` iff the URL path ends in the manifest extension.
pub fn kind_for_url(url: &str) -> LocatorKind {
    let path_is_manifest = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase().ends_with(".m3u8"),
        Err(_) => url
            .split(|c: char| c == '?' || c == '#')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase()
            .ends_with(".m3u8"),
    };
    if path_is_manifest {
        LocatorKind::Playlist
    } else {
        LocatorKind::DirectFile
    }
}
