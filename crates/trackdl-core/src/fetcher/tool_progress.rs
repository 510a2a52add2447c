//! Reading progress out of the segmented-stream tool's `--newline` output.
//!
//! Typical lines:
//!
//! ```text
//! [download]  45.3% of ~  3.51MiB at  512.00KiB/s ETA 00:05 (frag 3/10)
//! [download] Destination: /music/Artist - Title.mp4
//! [ExtractAudio] Destination: /music/Artist - Title.mp3
//! Deleting original file /music/Artist - Title.mp4 (pass -k to keep)
//! ```

use crate::progress::Phase;

#[derive(Debug, Clone, PartialEq)]
pub enum ToolLine {
    /// Whole-file percent, already adjusted for fragments.
    Progress {
        percent: f64,
        speed: Option<String>,
        eta: Option<String>,
    },
    Phase(Phase),
}

pub fn parse_tool_line(line: &str) -> Option<ToolLine> {
    if line.contains("[download]") && line.contains('%') {
        if let Some(progress) = parse_progress(line) {
            return Some(progress);
        }
    }
    if line.contains("Deleting original file") {
        return Some(ToolLine::Phase(Phase::Finalizing));
    }
    if line.contains("[ExtractAudio]")
        || line.contains("Post-process")
        || line.contains("[ffmpeg]")
        || line.contains("Converting")
    {
        return Some(ToolLine::Phase(Phase::Converting));
    }
    if line.contains("[download] Destination") {
        return Some(ToolLine::Phase(Phase::Downloading));
    }
    None
}

fn parse_progress(line: &str) -> Option<ToolLine> {
    let before_pct = &line[..line.find('%')?];
    let fragment_percent: f64 = before_pct.split_whitespace().last()?.parse().ok()?;

    let percent = match fragment_position(line) {
        Some((index, count)) => overall_percent(fragment_percent, index, count),
        None => fragment_percent,
    };

    let tokens: Vec<&str> = line.split_whitespace().collect();
    Some(ToolLine::Progress {
        percent,
        speed: token_after(&tokens, "at"),
        eta: token_after(&tokens, "ETA"),
    })
}

/// `(frag i/N)` → (i, N).
fn fragment_position(line: &str) -> Option<(u32, u32)> {
    let start = line.find("(frag ")? + "(frag ".len();
    let rest = &line[start..];
    let inner = &rest[..rest.find(')')?];
    let (index, count) = inner.split_once('/')?;
    let index: u32 = index.trim().parse().ok()?;
    let count: u32 = count.trim().parse().ok()?;
    if count == 0 {
        return None;
    }
    Some((index, count))
}

/// Fragment `index` of `count` (1-based) at `fragment_percent`.
pub fn overall_percent(fragment_percent: f64, index: u32, count: u32) -> f64 {
    let done = f64::from(index.saturating_sub(1)) + fragment_percent / 100.0;
    (done / f64::from(count) * 100.0).clamp(0.0, 100.0)
}

fn token_after(tokens: &[&str], key: &str) -> Option<String> {
    let pos = tokens.iter().position(|t| *t == key)?;
    let value = tokens.get(pos + 1)?;
    if value.starts_with("Unknown") || value.starts_with('(') {
        None
    } else {
        Some(value.to_string())
    }
}
