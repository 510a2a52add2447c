use std::path::PathBuf;

use crate::error::TrackError;
use crate::model::TrackDescriptor;

/// One unit of batch work. The destination is fixed once allocated, unless
/// it has appeared on disk before a retry.
#[derive(Debug)]
pub struct DownloadTask {
    pub descriptor: TrackDescriptor,
    pub destination: PathBuf,
    pub attempt_count: u32,
    pub last_error: Option<TrackError>,
}

impl DownloadTask {
    pub fn new(descriptor: TrackDescriptor, destination: PathBuf) -> Self {
        Self {
            descriptor,
            destination,
            attempt_count: 0,
            last_error: None,
        }
    }

    /// "Artist - Title" for status lines.
    pub fn label(&self) -> String {
        format!("{} - {}", self.descriptor.artist, self.descriptor.title)
    }
}
