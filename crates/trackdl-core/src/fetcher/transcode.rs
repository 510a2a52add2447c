//! Container → target format conversion with the transcoder.

use std::ffi::OsString;
use std::path::Path;

use super::tool::run_tool;
use crate::config::FetchConfig;
use crate::error::ToolError;

pub fn transcoder_args(cfg: &FetchConfig, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.into(),
        "-vn".into(),
    ];
    if cfg.audio_format.eq_ignore_ascii_case("mp3") {
        args.push("-acodec".into());
        args.push("libmp3lame".into());
    }
    args.push("-q:a".into());
    args.push(cfg.audio_quality.as_str().into());
    args.push(output.into());
    args
}

/// Converts `input` into `output`. A failed run leaves no `output` behind.
pub fn transcode(cfg: &FetchConfig, input: &Path, output: &Path) -> Result<(), ToolError> {
    let program = cfg.transcoder_program.as_str();
    let result = run_tool(
        program,
        &transcoder_args(cfg, input, output),
        cfg.transcode_timeout(),
        |_| {},
    )
    .and_then(|()| {
        if output.exists() {
            Ok(())
        } else {
            Err(ToolError::MissingOutput {
                program: program.to_string(),
                path: output.to_path_buf(),
            })
        }
    });
    if result.is_err() && output.exists() {
        if let Err(e) = std::fs::remove_file(output) {
            tracing::debug!(path = %output.display(), "could not remove partial output: {}", e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn mp3_uses_lame_encoder() {
        let cfg = FetchConfig::default();
        let args = transcoder_args(&cfg, Path::new("/t/a.ts"), Path::new("/t/a.mp3"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert!(args.windows(2).any(|w| w[0] == "-i" && w[1] == "/t/a.ts"));
        assert!(args.windows(2).any(|w| w[0] == "-acodec" && w[1] == "libmp3lame"));
        assert!(args.windows(2).any(|w| w[0] == "-q:a" && w[1] == "0"));
        assert_eq!(args.last().map(String::as_str), Some("/t/a.mp3"));
    }

    #[test]
    fn other_formats_let_the_transcoder_pick() {
        let cfg = FetchConfig {
            audio_format: "opus".to_string(),
            ..FetchConfig::default()
        };
        let args = transcoder_args(&cfg, &PathBuf::from("a.ts"), &PathBuf::from("a.opus"));
        assert!(!args.iter().any(|a| a == "libmp3lame"));
    }

    #[test]
    fn missing_transcoder_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FetchConfig {
            transcoder_program: "trackdl-no-such-transcoder".to_string(),
            ..FetchConfig::default()
        };
        let err = transcode(&cfg, &dir.path().join("a.ts"), &dir.path().join("a.mp3")).unwrap_err();
        assert!(matches!(err, ToolError::Unavailable { .. }));
    }
}
