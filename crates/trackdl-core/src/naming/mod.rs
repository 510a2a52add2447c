//! Destination naming for downloaded tracks.
//!
//! Derives a filesystem-safe base name from artist + title and picks a path
//! that collides neither with files on disk nor with paths already handed out
//! in the current run.

mod sanitize;

pub use sanitize::sanitize_base_name;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::model::TrackDescriptor;

/// Base name used when artist and title sanitize to nothing.
const DEFAULT_BASE: &str = "track";

/// `"Artist - Title"`, sanitized; falls back to `"track"`.
pub fn base_name(descriptor: &TrackDescriptor) -> String {
    let raw = format!("{} - {}", descriptor.artist.trim(), descriptor.title.trim());
    let sanitized = sanitize_base_name(&raw);
    if sanitized.is_empty() {
        DEFAULT_BASE.to_string()
    } else {
        sanitized
    }
}

/// First free path among `base.ext`, `base (1).ext`, `base (2).ext`, ...
///
/// A path is taken if it exists on disk or is in `reserved`. The returned path
/// is not inserted into `reserved`; callers that hand out several paths in one
/// run do that themselves.
pub fn unique_destination(
    dir: &Path,
    base: &str,
    ext: &str,
    reserved: &HashSet<PathBuf>,
) -> PathBuf {
    let candidate = dir.join(with_ext(base, ext));
    if is_free(&candidate, reserved) {
        return candidate;
    }
    let mut k = 1u32;
    loop {
        let candidate = dir.join(with_ext(&format!("{} ({})", base, k), ext));
        if is_free(&candidate, reserved) {
            return candidate;
        }
        k += 1;
    }
}

/// Hands out unique destinations for one run.
#[derive(Debug, Default)]
pub struct DestinationAllocator {
    reserved: HashSet<PathBuf>,
}

impl DestinationAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves and returns a fresh path for `descriptor` under `dir`.
    pub fn allocate(&mut self, dir: &Path, descriptor: &TrackDescriptor, ext: &str) -> PathBuf {
        let path = unique_destination(dir, &base_name(descriptor), ext, &self.reserved);
        self.reserved.insert(path.clone());
        path
    }

    /// Replaces `previous` (which has appeared on disk) with a fresh path.
    pub fn reallocate(
        &mut self,
        previous: &Path,
        dir: &Path,
        descriptor: &TrackDescriptor,
        ext: &str,
    ) -> PathBuf {
        let path = self.allocate(dir, descriptor, ext);
        tracing::debug!(
            previous = %previous.display(),
            path = %path.display(),
            "destination taken before retry, renamed"
        );
        path
    }
}

fn with_ext(base: &str, ext: &str) -> String {
    if ext.is_empty() {
        base.to_string()
    } else {
        format!("{}.{}", base, ext)
    }
}

fn is_free(path: &Path, reserved: &HashSet<PathBuf>) -> bool {
    !reserved.contains(path) && !path.exists()
}
