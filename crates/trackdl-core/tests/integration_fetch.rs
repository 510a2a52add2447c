//! Fetcher and batch runs against a local HTTP server.

mod common;

use common::media_server::{MediaServer, Route};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use trackdl_core::batch::BatchOrchestrator;
use trackdl_core::browser::Cookie;
use trackdl_core::config::{BatchConfig, FetchConfig, SessionConfig};
use trackdl_core::error::TrackError;
use trackdl_core::fetcher::{FetchOutcome, MediaFetcher, StreamFetcher};
use trackdl_core::ledger::FailureLedger;
use trackdl_core::model::{LocatorKind, StreamLocator, TrackDescriptor};
use trackdl_core::progress::{Phase, ProgressReporter};
use trackdl_core::resolver::StreamResolver;

const PLAYLIST: &str = "application/vnd.apple.mpegurl";

fn audio_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// No download tool and no transcoder on PATH.
fn toolless_config() -> FetchConfig {
    FetchConfig {
        tool_program: "trackdl-test-missing-extractor".to_string(),
        transcoder_program: "trackdl-test-missing-transcoder".to_string(),
        progress_interval_ms: 0,
        ..FetchConfig::default()
    }
}

fn fetcher(cfg: FetchConfig) -> MediaFetcher {
    MediaFetcher::new(cfg, SessionConfig::default())
}

fn fetch(cfg: FetchConfig, url: String, dest: &Path) -> Result<FetchOutcome, TrackError> {
    fetcher(cfg).fetch(StreamLocator::from_url(url), dest, &[], &ProgressReporter::new())
}

fn no_part_files(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .all(|e| !e.file_name().to_string_lossy().ends_with(".part"))
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn direct_file_is_streamed_with_session_headers() {
    let body = audio_body(200_000);
    let server = MediaServer::start(vec![(
        "/p1/track.mp3",
        Route::ok("audio/mpeg", body.clone()),
    )]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("Artist - Song.mp3");
    let reporter = ProgressReporter::new();

    let outcome = fetcher(toolless_config())
        .fetch(
            StreamLocator::from_url(server.url("/p1/track.mp3?extra=abc")),
            &dest,
            &[Cookie::new("remixsid", "s3cr3t")],
            &reporter,
        )
        .unwrap();

    assert_eq!(outcome, FetchOutcome::Complete(dest.clone()));
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert!(no_part_files(dir.path()));
    assert_eq!(reporter.snapshot().track.unwrap().phase, Phase::Finalizing);

    let req = &server.requests_for("/p1/track.mp3")[0];
    assert_eq!(
        req.headers.get("cookie").map(String::as_str),
        Some("remixsid=s3cr3t")
    );
    assert_eq!(
        req.headers.get("referer").map(String::as_str),
        Some("https://vk.com/")
    );
}

#[test]
fn markup_response_is_rejected() {
    let server = MediaServer::start(vec![(
        "/login.mp3",
        Route::ok("text/html; charset=utf-8", "<html><body>log in</body></html>"),
    )]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("a.mp3");

    let err = fetch(toolless_config(), server.url("/login.mp3"), &dest).unwrap_err();

    assert!(matches!(err, TrackError::Fetch(_)));
    assert!(err.to_string().contains("text/html"));
    assert!(!dest.exists());
    assert!(no_part_files(dir.path()));
}

#[test]
fn http_error_status_fails_direct_fetch() {
    let server = MediaServer::start(vec![("/gone.mp3", Route::status(403))]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("a.mp3");
    let err = fetch(toolless_config(), server.url("/gone.mp3"), &dest).unwrap_err();
    assert!(err.to_string().contains("403"));
    assert!(!dest.exists());
}

#[test]
fn stalled_direct_response_is_timeout() {
    let server = MediaServer::start(vec![(
        "/slow.mp3",
        Route::ok("audio/mpeg", audio_body(100)).delayed(Duration::from_secs(4)),
    )]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("a.mp3");
    let cfg = FetchConfig {
        direct_timeout_secs: 1,
        ..toolless_config()
    };

    let started = Instant::now();
    let err = fetch(cfg, server.url("/slow.mp3"), &dest).unwrap_err();

    assert!(
        matches!(err, TrackError::Timeout { what: "download", .. }),
        "got {err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!dest.exists());
    assert!(no_part_files(dir.path()));
}

#[test]
fn playlist_falls_back_to_segments_and_keeps_container() {
    let manifest = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n\
                    #EXTINF:10.0,\nseg-1-a1.ts\n\
                    #EXTINF:10.0,\nseg-2-a1.ts\n\
                    #EXTINF:10.0,\nseg-3-a1.ts\n\
                    #EXT-X-ENDLIST\n";
    let server = MediaServer::start(vec![
        ("/hls/index.m3u8", Route::ok(PLAYLIST, manifest)),
        ("/hls/seg-1-a1.ts", Route::ok("video/mp2t", b"AAAA".to_vec())),
        ("/hls/seg-3-a1.ts", Route::ok("video/mp2t", b"CCCC".to_vec())),
    ]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("Artist - Song.mp3");
    let locator = StreamLocator::from_url(server.url("/hls/index.m3u8?extra=1"));
    assert_eq!(locator.kind(), LocatorKind::Playlist);

    let outcome = fetcher(toolless_config())
        .fetch(
            locator,
            &dest,
            &[Cookie::new("remixsid", "x")],
            &ProgressReporter::new(),
        )
        .unwrap();

    let container = dir.path().join("Artist - Song.ts");
    assert_eq!(outcome, FetchOutcome::Partial(container.clone()));
    assert_eq!(std::fs::read(&container).unwrap(), b"AAAACCCC");
    assert!(!dest.exists());
    // Segment 2 was requested and skipped, not fatal.
    assert_eq!(server.requests_for("/hls/seg-2-a1.ts").len(), 1);
    assert!(server.requests_for("/hls/index.m3u8")[0]
        .headers
        .contains_key("cookie"));
}

/// Resolves every descriptor to the same URL.
struct FixedResolver(String);

impl StreamResolver for FixedResolver {
    fn resolve(
        &self,
        _d: &TrackDescriptor,
        _r: &ProgressReporter,
    ) -> Result<StreamLocator, TrackError> {
        Ok(StreamLocator::from_url(self.0.clone()))
    }
}

#[test]
fn rerun_keeps_container_left_by_earlier_run() {
    let server = MediaServer::start(vec![
        ("/hls/index.m3u8", Route::ok(PLAYLIST, "#EXTM3U\nseg-1.ts\n")),
        ("/hls/seg-1.ts", Route::ok("video/mp2t", b"NEWDATA".to_vec())),
    ]);
    let dir = tempdir().unwrap();
    let earlier = dir.path().join("Artist - Song.ts");
    std::fs::write(&earlier, b"FIRST-RUN-ARTIFACT").unwrap();

    let orchestrator = BatchOrchestrator::new(
        FixedResolver(server.url("/hls/index.m3u8")),
        fetcher(toolless_config()),
        BatchConfig {
            inter_task_pause_ms: 0,
            inter_pass_pause_ms: 0,
            ..BatchConfig::default()
        },
        "mp3",
    );
    let result = orchestrator
        .run(
            &[TrackDescriptor::new("Artist", "Song", "1_1")],
            dir.path(),
            &ProgressReporter::new(),
        )
        .unwrap();

    let fresh = dir.path().join("Artist - Song (1).ts");
    assert_eq!(result.outcomes, vec![FetchOutcome::Partial(fresh.clone())]);
    assert_eq!(std::fs::read(&earlier).unwrap(), b"FIRST-RUN-ARTIFACT");
    assert_eq!(std::fs::read(&fresh).unwrap(), b"NEWDATA");
    assert!(no_part_files(dir.path()));
}

#[test]
fn playlist_with_no_fetchable_segment_fails() {
    let server = MediaServer::start(vec![(
        "/hls/index.m3u8",
        Route::ok(PLAYLIST, "#EXTM3U\nseg-1.ts\nseg-2.ts\n"),
    )]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("a.mp3");
    let err = fetch(toolless_config(), server.url("/hls/index.m3u8"), &dest).unwrap_err();
    assert!(matches!(err, TrackError::Fetch(_)));
    assert!(!dir.path().join("a.ts").exists());
    assert!(no_part_files(dir.path()));
}

#[test]
fn slow_segments_hit_the_manual_fetch_deadline() {
    let slow = Duration::from_secs(3);
    let server = MediaServer::start(vec![
        (
            "/hls/index.m3u8",
            Route::ok(PLAYLIST, "#EXTM3U\nseg-1.ts\nseg-2.ts\nseg-3.ts\n"),
        ),
        ("/hls/seg-1.ts", Route::ok("video/mp2t", b"A".to_vec()).delayed(slow)),
        ("/hls/seg-2.ts", Route::ok("video/mp2t", b"B".to_vec()).delayed(slow)),
        ("/hls/seg-3.ts", Route::ok("video/mp2t", b"C".to_vec()).delayed(slow)),
    ]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("a.mp3");
    let cfg = FetchConfig {
        manual_timeout_secs: 1,
        ..toolless_config()
    };

    let started = Instant::now();
    let err = fetch(cfg, server.url("/hls/index.m3u8"), &dest).unwrap_err();

    assert!(
        matches!(err, TrackError::Timeout { what: "manual segment fetch", .. }),
        "got {err:?}"
    );
    assert!(started.elapsed() < slow);
    assert!(server.requests_for("/hls/seg-3.ts").is_empty());
    assert!(!dir.path().join("a.ts").exists());
    assert!(no_part_files(dir.path()));
}

#[cfg(unix)]
#[test]
fn extractor_timeout_does_not_fall_back() {
    let server = MediaServer::start(vec![
        ("/hls/index.m3u8", Route::ok(PLAYLIST, "#EXTM3U\nseg-1.ts\n")),
        ("/hls/seg-1.ts", Route::ok("video/mp2t", b"TSDATA".to_vec())),
    ]);
    let dir = tempdir().unwrap();
    let extractor = dir.path().join("hanging-extractor");
    write_script(&extractor, "#!/bin/sh\nexec sleep 30\n");
    let dest = dir.path().join("a.mp3");
    let cfg = FetchConfig {
        tool_program: extractor.to_string_lossy().into_owned(),
        tool_timeout_secs: 1,
        ..toolless_config()
    };

    let started = Instant::now();
    let err = fetch(cfg, server.url("/hls/index.m3u8"), &dest).unwrap_err();

    assert!(
        matches!(err, TrackError::Timeout { what: "stream download tool", .. }),
        "got {err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(10));
    // The manual path never started.
    assert!(server.requests().is_empty());
    assert!(!dir.path().join("a.ts").exists());
}

#[cfg(unix)]
#[test]
fn playlist_fallback_transcodes_when_transcoder_works() {
    let server = MediaServer::start(vec![
        ("/hls/index.m3u8", Route::ok(PLAYLIST, "#EXTM3U\nseg-1.ts\n")),
        ("/hls/seg-1.ts", Route::ok("video/mp2t", b"TSDATA".to_vec())),
    ]);
    let dir = tempdir().unwrap();
    // Stand-in transcoder: copies the -i input to the last argument.
    let transcoder = dir.path().join("fake-transcoder");
    write_script(
        &transcoder,
        r#"#!/bin/sh
in=''
while [ $# -gt 1 ]; do
  if [ "$1" = "-i" ]; then in="$2"; fi
  shift
done
cp "$in" "$1"
"#,
    );

    let out_dir = dir.path().join("music");
    let dest = out_dir.join("a.mp3");
    let cfg = FetchConfig {
        transcoder_program: transcoder.to_string_lossy().into_owned(),
        ..toolless_config()
    };
    let outcome = fetch(cfg, server.url("/hls/index.m3u8"), &dest).unwrap();

    assert_eq!(outcome, FetchOutcome::Complete(dest.clone()));
    assert_eq!(std::fs::read(&dest).unwrap(), b"TSDATA");
    assert!(!out_dir.join("a.ts").exists());
}

/// Resolves every catalog id to `<base>/<catalog_id>.mp3`.
struct ServerResolver {
    base: String,
}

impl StreamResolver for ServerResolver {
    fn resolve(
        &self,
        d: &TrackDescriptor,
        _r: &ProgressReporter,
    ) -> Result<StreamLocator, TrackError> {
        Ok(StreamLocator::from_url(format!(
            "{}/{}.mp3",
            self.base, d.catalog_id
        )))
    }
}

#[test]
fn batch_against_server_writes_ledger_for_markup_tracks() {
    let server = MediaServer::start(vec![
        ("/1_1.mp3", Route::ok("audio/mpeg", audio_body(1000))),
        ("/1_2.mp3", Route::ok("text/html", "<html>expired</html>")),
        ("/1_3.mp3", Route::ok("audio/mpeg", audio_body(2000))),
    ]);
    let dir = tempdir().unwrap();
    let descriptors = vec![
        TrackDescriptor::new("Band", "One", "1_1"),
        TrackDescriptor::new("Band", "Two", "1_2"),
        TrackDescriptor::new("Band", "Three", "1_3"),
    ];
    let cfg = BatchConfig {
        retry_passes: 1,
        inter_task_pause_ms: 0,
        inter_pass_pause_ms: 0,
        ..BatchConfig::default()
    };
    let orchestrator = BatchOrchestrator::new(
        ServerResolver {
            base: server.url(""),
        },
        fetcher(toolless_config()),
        cfg,
        "mp3",
    );

    let result = orchestrator
        .run(&descriptors, dir.path(), &ProgressReporter::new())
        .unwrap();

    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert!(dir.path().join("Band - One.mp3").exists());
    assert!(dir.path().join("Band - Three.mp3").exists());
    assert!(!dir.path().join("Band - Two.mp3").exists());
    // Initial attempt plus one retry pass.
    assert_eq!(server.requests_for("/1_2.mp3").len(), 2);

    let stored = FailureLedger::in_dir(dir.path(), "failed_tracks.json")
        .load()
        .unwrap();
    assert_eq!(stored, vec![descriptors[1].clone()]);
}

#[tokio::test]
async fn progress_reaches_async_receiver_while_batch_runs_on_worker() {
    let server = MediaServer::start(vec![(
        "/1_1.mp3",
        Route::ok("audio/mpeg", audio_body(50_000)),
    )]);
    let dir = tempdir().unwrap();
    let dest_dir = dir.path().to_path_buf();
    let base = server.url("");

    let reporter = ProgressReporter::new();
    let mut rx = reporter.subscribe();
    let worker = tokio::task::spawn_blocking(move || {
        let orchestrator = BatchOrchestrator::new(
            ServerResolver { base },
            fetcher(toolless_config()),
            BatchConfig::default(),
            "mp3",
        );
        orchestrator.run(&[TrackDescriptor::new("A", "B", "1_1")], &dest_dir, &reporter)
    });

    // Intermediate values may be skipped, but the loop sees at least one
    // change and ends once the worker drops the reporter.
    let mut changes = 0;
    while rx.changed().await.is_ok() {
        rx.borrow_and_update();
        changes += 1;
    }
    let result = worker.await.unwrap().unwrap();
    assert_eq!(result.success_count, 1);
    assert!(changes >= 1);
    assert_eq!(*rx.borrow(), Default::default());
    assert!(dir.path().join("A - B.mp3").exists());
}
