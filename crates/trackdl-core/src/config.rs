use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// How to reach the already-authenticated browser session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the WebDriver endpoint that owns the session.
    pub webdriver_url: String,
    /// Existing WebDriver session id to attach to.
    pub session_id: Option<String>,
    /// Headers sent with every HTTP fetch so CDN requests look like the page's own.
    pub user_agent: String,
    pub referer: String,
    pub origin: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://127.0.0.1:9515".to_string(),
            session_id: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            referer: "https://vk.com/".to_string(),
            origin: "https://vk.com".to_string(),
        }
    }
}

/// Page structure and polling parameters for stream resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Number of in-page probe rounds after playback is triggered.
    pub poll_attempts: u32,
    /// Delay before each probe round, in milliseconds.
    pub poll_interval_ms: u64,
    /// CSS selector matching every track row on the page.
    pub row_selector: String,
    /// Attribute on a row holding the catalog id verbatim.
    pub id_attribute: String,
    /// Attribute on a row holding an embedded blob that contains the catalog id.
    pub embedded_id_attribute: String,
    /// Selector (relative to the row) of the play affordance.
    pub play_selector: String,
    /// Substring identifying a manifest request in the network log.
    pub manifest_marker: String,
    /// Substring identifying any request to the media host.
    pub media_host_marker: String,
    /// Path fragment that starts the segment-specific suffix of a media URL.
    pub segment_marker: String,
    /// Canonical manifest filename used when synthesizing from a segment URL.
    pub manifest_filename: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 7,
            poll_interval_ms: 300,
            row_selector: "div.audio_row".to_string(),
            id_attribute: "data-full-id".to_string(),
            embedded_id_attribute: "data-audio".to_string(),
            play_selector: ".audio_play_wrap, .audio_row__play_btn, .audio_row__cover".to_string(),
            manifest_marker: "index.m3u8".to_string(),
            media_host_marker: "vkuseraudio".to_string(),
            segment_marker: "/seg-".to_string(),
            manifest_filename: "index.m3u8".to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// External tools, target format and per-path timeouts for the fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Segmented-stream downloader invoked for playlists (yt-dlp compatible CLI).
    pub tool_program: String,
    /// Transcoder used after a manual segment fetch (ffmpeg compatible CLI).
    pub transcoder_program: String,
    /// Target audio container/extension, e.g. "mp3".
    pub audio_format: String,
    /// Quality argument passed through to the tools ("0" = best VBR).
    pub audio_quality: String,
    pub tool_timeout_secs: u64,
    pub transcode_timeout_secs: u64,
    pub manifest_timeout_secs: u64,
    pub segment_timeout_secs: u64,
    /// Bound on the whole manual playlist fetch, manifest included.
    pub manual_timeout_secs: u64,
    pub direct_timeout_secs: u64,
    /// Minimum spacing between progress events on the direct-file path.
    pub progress_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            tool_program: "yt-dlp".to_string(),
            transcoder_program: "ffmpeg".to_string(),
            audio_format: "mp3".to_string(),
            audio_quality: "0".to_string(),
            tool_timeout_secs: 180,
            transcode_timeout_secs: 120,
            manifest_timeout_secs: 30,
            segment_timeout_secs: 60,
            manual_timeout_secs: 180,
            direct_timeout_secs: 120,
            progress_interval_ms: 200,
        }
    }
}

impl FetchConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    pub fn segment_timeout(&self) -> Duration {
        Duration::from_secs(self.segment_timeout_secs)
    }

    pub fn manual_timeout(&self) -> Duration {
        Duration::from_secs(self.manual_timeout_secs)
    }

    pub fn direct_timeout(&self) -> Duration {
        Duration::from_secs(self.direct_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Batch sequencing and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Extra passes over the failed set after the initial pass.
    pub retry_passes: u32,
    /// Pause between tasks so the site settles before the next click.
    pub inter_task_pause_ms: u64,
    /// Pause between retry passes.
    pub inter_pass_pause_ms: u64,
    /// File name of the failure ledger inside the batch destination.
    pub ledger_filename: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            retry_passes: 2,
            inter_task_pause_ms: 500,
            inter_pass_pause_ms: 1000,
            ledger_filename: "failed_tracks.json".to_string(),
        }
    }
}

impl BatchConfig {
    pub fn inter_task_pause(&self) -> Duration {
        Duration::from_millis(self.inter_task_pause_ms)
    }

    pub fn inter_pass_pause(&self) -> Duration {
        Duration::from_millis(self.inter_pass_pause_ms)
    }
}

/// Global configuration loaded from `~/.config/trackdl/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackdlConfig {
    pub session: SessionConfig,
    pub resolver: ResolverConfig,
    pub fetch: FetchConfig,
    pub batch: BatchConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("trackdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TrackdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TrackdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: TrackdlConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
