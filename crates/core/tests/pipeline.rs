use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ingest_core::config::{
    AllowConfig, AppConfig, BehaviorConfig, LimitsConfig, PathsConfig, WatchConfig,
};
use ingest_core::monitor::{Monitor, WatchEvent};
use providers::{AudioProbe, AudioProber, MagicSniffer, ProbeError, StreamInfo, TypeSniffer};
use tokio::sync::mpsc;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Prober stub reporting a decodable stream with a fixed duration, optionally
/// stalling to keep a batch in flight or deleting the file mid-probe.
struct StubProber {
    duration: f64,
    has_audio: bool,
    delay: Duration,
    vanish: bool,
}

impl StubProber {
    fn good() -> Self {
        Self {
            duration: 180.0,
            has_audio: true,
            delay: Duration::ZERO,
            vanish: false,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::good()
        }
    }

    fn no_stream() -> Self {
        Self {
            has_audio: false,
            ..Self::good()
        }
    }

    fn vanishing() -> Self {
        Self {
            vanish: true,
            ..Self::good()
        }
    }
}

#[async_trait::async_trait]
impl AudioProber for StubProber {
    async fn probe(&self, path: &Path) -> Result<AudioProbe, ProbeError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.vanish {
            let _ = std::fs::remove_file(path);
        }
        let streams = if self.has_audio {
            vec![StreamInfo {
                codec_type: "audio".to_string(),
                codec_name: Some("mp3".to_string()),
            }]
        } else {
            vec![]
        };
        Ok(AudioProbe {
            streams,
            duration: self.duration,
            bitrate: Some(192_000),
        })
    }
}

fn test_config(base: &Path) -> AppConfig {
    AppConfig {
        paths: PathsConfig {
            source: base.join("in").to_string_lossy().into_owned(),
            destination: base.join("out").to_string_lossy().into_owned(),
            rejection_log: base.join("rejections.log").to_string_lossy().into_owned(),
        },
        watch: WatchConfig {
            debounce_ms: 150,
            quiet_ms: 50,
            exclude: vec![],
        },
        limits: LimitsConfig {
            max_file_size_mb: None,
            min_image_bytes: 16,
            min_audio_duration_secs: 0.5,
            probe_timeout_secs: 5,
        },
        allow: AllowConfig {
            extensions: vec![
                "mp3".into(),
                "wav".into(),
                "png".into(),
                "jpg".into(),
                "txt".into(),
            ],
            audio: vec!["mp3".into(), "wav".into()],
            image: vec!["png".into(), "jpg".into()],
        },
        behavior: BehaviorConfig {
            verbose: false,
            strict: true,
        },
    }
}

fn monitor_with(base: &Path, prober: Arc<dyn AudioProber>) -> Monitor {
    let cfg = test_config(base);
    let sniffer: Arc<dyn TypeSniffer> = Arc::new(MagicSniffer);
    Monitor::new(&cfg, prober, sniffer).unwrap()
}

fn rejection_reasons(base: &Path) -> Vec<String> {
    let text = std::fs::read_to_string(base.join("rejections.log")).unwrap_or_default();
    text.lines()
        .map(|line| {
            let v: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(v["action"], "REJECTED");
            v["reason"].as_str().unwrap().to_string()
        })
        .collect()
}

#[tokio::test]
async fn extension_gate_deletes_and_logs_disallowed_files() {
    let tmp = tempfile::tempdir().unwrap();
    let monitor = monitor_with(tmp.path(), Arc::new(StubProber::good()));
    let src = monitor.source_root().to_path_buf();

    std::fs::create_dir_all(src.join("junk")).unwrap();
    let file = src.join("junk/payload.exe");
    std::fs::write(&file, b"MZ...").unwrap();

    let summary = monitor.run_batch(vec![file.clone()]).await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.moved, 0);

    assert!(!file.exists());
    assert!(!tmp.path().join("out/junk/payload.exe").exists());
    // Cleanup removed the emptied subdirectory but kept the root.
    assert!(!src.join("junk").exists());
    assert!(src.exists());

    let reasons = rejection_reasons(tmp.path());
    assert_eq!(reasons, vec!["extension not allowed".to_string()]);
}

#[tokio::test]
async fn valid_audio_round_trips_to_the_destination() {
    let tmp = tempfile::tempdir().unwrap();
    let monitor = monitor_with(tmp.path(), Arc::new(StubProber::good()));
    let src = monitor.source_root().to_path_buf();

    std::fs::create_dir_all(src.join("album/disc2")).unwrap();
    let file = src.join("album/disc2/track.mp3");
    let payload: Vec<u8> = (0..=255u8).cycle().take(4_096).collect();
    std::fs::write(&file, &payload).unwrap();

    let summary = monitor.run_batch(vec![file.clone()]).await;
    assert_eq!(summary.moved, 1);
    assert_eq!(summary.rejected, 0);

    let dest = tmp.path().join("out/album/disc2/track.mp3");
    assert!(!file.exists());
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
    assert!(rejection_reasons(tmp.path()).is_empty());
}

#[tokio::test]
async fn valid_image_round_trips_to_the_destination() {
    let tmp = tempfile::tempdir().unwrap();
    let monitor = monitor_with(tmp.path(), Arc::new(StubProber::good()));
    let src = monitor.source_root().to_path_buf();

    let file = src.join("cover.png");
    std::fs::write(&file, [PNG_MAGIC, &[0u8; 256]].concat()).unwrap();

    let summary = monitor.run_batch(vec![file.clone()]).await;
    assert_eq!(summary.moved, 1);
    assert!(!file.exists());
    assert!(tmp.path().join("out/cover.png").exists());
}

#[tokio::test]
async fn image_extension_with_foreign_content_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let monitor = monitor_with(tmp.path(), Arc::new(StubProber::good()));
    let src = monitor.source_root().to_path_buf();

    let file = src.join("fake.png");
    std::fs::write(&file, b"this is just text pretending to be an image").unwrap();

    let summary = monitor.run_batch(vec![file.clone()]).await;
    assert_eq!(summary.rejected, 1);
    assert!(!file.exists());
    assert_eq!(
        rejection_reasons(tmp.path()),
        vec!["unrecognized file content".to_string()]
    );
}

#[tokio::test]
async fn audio_without_a_decodable_stream_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let monitor = monitor_with(tmp.path(), Arc::new(StubProber::no_stream()));
    let src = monitor.source_root().to_path_buf();

    let file = src.join("silence.mp3");
    std::fs::write(&file, b"not really audio").unwrap();

    monitor.run_batch(vec![file.clone()]).await;
    assert!(!file.exists());
    assert_eq!(
        rejection_reasons(tmp.path()),
        vec!["no decodable audio stream".to_string()]
    );
}

#[tokio::test]
async fn allowed_but_uncategorized_extension_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let monitor = monitor_with(tmp.path(), Arc::new(StubProber::good()));
    let src = monitor.source_root().to_path_buf();

    let file = src.join("readme.txt");
    std::fs::write(&file, b"hello").unwrap();

    monitor.run_batch(vec![file.clone()]).await;
    assert!(!file.exists());
    assert_eq!(
        rejection_reasons(tmp.path()),
        vec!["not an audio or image file".to_string()]
    );
}

#[tokio::test]
async fn oversized_files_are_rejected_naming_the_limit() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = test_config(tmp.path());
    cfg.limits.max_file_size_mb = Some(1);
    let monitor = Monitor::new(&cfg, Arc::new(StubProber::good()), Arc::new(MagicSniffer)).unwrap();
    let src = monitor.source_root().to_path_buf();

    let file = src.join("huge.mp3");
    std::fs::write(&file, vec![0u8; 1024 * 1024 + 1]).unwrap();

    monitor.run_batch(vec![file.clone()]).await;
    assert!(!file.exists());
    let reasons = rejection_reasons(tmp.path());
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("maximum size of 1 MB"), "got: {}", reasons[0]);
}

#[tokio::test]
async fn empty_files_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let monitor = monitor_with(tmp.path(), Arc::new(StubProber::good()));
    let src = monitor.source_root().to_path_buf();

    let file = src.join("zero.mp3");
    std::fs::write(&file, b"").unwrap();

    monitor.run_batch(vec![file.clone()]).await;
    assert_eq!(rejection_reasons(tmp.path()), vec!["file is empty".to_string()]);
}

#[tokio::test]
async fn vanished_files_are_skipped_without_a_rejection_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let monitor = monitor_with(tmp.path(), Arc::new(StubProber::good()));
    let src = monitor.source_root().to_path_buf();

    let summary = monitor.run_batch(vec![src.join("never-existed.mp3")]).await;
    assert_eq!(summary.processed, 0);
    assert!(rejection_reasons(tmp.path()).is_empty());
}

#[tokio::test]
async fn debounce_collapses_a_burst_into_one_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let (summary_tx, mut summaries) = mpsc::unbounded_channel();
    let monitor = Arc::new(
        monitor_with(tmp.path(), Arc::new(StubProber::good())).with_batch_observer(summary_tx),
    );
    let src = monitor.source_root().to_path_buf();

    let (tx, rx) = mpsc::channel(64);
    let runner = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run(rx).await }
    });

    let mut files: Vec<PathBuf> = Vec::new();
    for i in 0..5 {
        let file = src.join(format!("burst-{i}.mp3"));
        std::fs::write(&file, b"audio bytes").unwrap();
        tx.send(WatchEvent::Add(file.clone())).await.unwrap();
        files.push(file);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let summary = tokio::time::timeout(Duration::from_secs(5), summaries.recv())
        .await
        .expect("batch should fire after the debounce window")
        .unwrap();
    assert_eq!(summary.processed, 5);
    assert_eq!(summary.moved, 5);
    for file in &files {
        assert!(!file.exists());
    }

    // Quiet afterwards: the burst must not produce a second batch.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(summaries.try_recv().is_err());

    drop(tx);
    runner.await.unwrap();
}

#[tokio::test]
async fn adds_during_processing_land_in_the_next_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let (summary_tx, mut summaries) = mpsc::unbounded_channel();
    let prober = Arc::new(StubProber::slow(Duration::from_millis(400)));
    let monitor =
        Arc::new(monitor_with(tmp.path(), prober).with_batch_observer(summary_tx));
    let src = monitor.source_root().to_path_buf();

    let (tx, rx) = mpsc::channel(64);
    let runner = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run(rx).await }
    });

    let first = src.join("first.mp3");
    std::fs::write(&first, b"a").unwrap();
    tx.send(WatchEvent::Add(first.clone())).await.unwrap();

    // Debounce is 150ms and the probe stalls 400ms, so this lands mid-batch.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let second = src.join("second.mp3");
    std::fs::write(&second, b"b").unwrap();
    tx.send(WatchEvent::Add(second.clone())).await.unwrap();

    let one = tokio::time::timeout(Duration::from_secs(5), summaries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.processed, 1, "in-flight batch must not absorb late adds");

    let two = tokio::time::timeout(Duration::from_secs(5), summaries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(two.processed, 1);

    assert!(tmp.path().join("out/first.mp3").exists());
    assert!(tmp.path().join("out/second.mp3").exists());

    drop(tx);
    runner.await.unwrap();
}

#[tokio::test]
async fn files_deleted_mid_batch_are_skipped_without_noise() {
    let tmp = tempfile::tempdir().unwrap();
    let monitor = monitor_with(tmp.path(), Arc::new(StubProber::vanishing()));
    let src = monitor.source_root().to_path_buf();

    let file = src.join("fleeting.mp3");
    std::fs::write(&file, b"about to disappear").unwrap();

    // The prober deletes the file, so the move finds nothing to relocate.
    let summary = monitor.run_batch(vec![file.clone()]).await;
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.moved, 0);
    assert!(!tmp.path().join("out/fleeting.mp3").exists());
    assert!(rejection_reasons(tmp.path()).is_empty());
}

#[tokio::test]
async fn error_chatter_does_not_delay_the_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let (summary_tx, mut summaries) = mpsc::unbounded_channel();
    let monitor = Arc::new(
        monitor_with(tmp.path(), Arc::new(StubProber::good())).with_batch_observer(summary_tx),
    );
    let src = monitor.source_root().to_path_buf();

    let (tx, rx) = mpsc::channel(64);
    let runner = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run(rx).await }
    });

    let file = src.join("steady.mp3");
    std::fs::write(&file, b"audio bytes").unwrap();
    tx.send(WatchEvent::Add(file)).await.unwrap();

    // Errors arriving faster than the 150ms debounce window must not keep
    // re-arming it.
    let chatter = tokio::spawn({
        let tx = tx.clone();
        async move {
            loop {
                if tx
                    .send(WatchEvent::Error("transient watcher error".to_string()))
                    .await
                    .is_err()
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    });

    let summary = tokio::time::timeout(Duration::from_secs(2), summaries.recv())
        .await
        .expect("batch must fire despite error chatter")
        .unwrap();
    assert_eq!(summary.moved, 1);

    chatter.abort();
    let _ = chatter.await;
    drop(tx);
    runner.await.unwrap();
}

#[tokio::test]
async fn watch_errors_do_not_stop_the_loop() {
    let tmp = tempfile::tempdir().unwrap();
    let (summary_tx, mut summaries) = mpsc::unbounded_channel();
    let monitor = Arc::new(
        monitor_with(tmp.path(), Arc::new(StubProber::good())).with_batch_observer(summary_tx),
    );
    let src = monitor.source_root().to_path_buf();

    let (tx, rx) = mpsc::channel(64);
    let runner = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run(rx).await }
    });

    tx.send(WatchEvent::Error("watcher hiccup".to_string()))
        .await
        .unwrap();
    let file = src.join("after-error.mp3");
    std::fs::write(&file, b"a").unwrap();
    tx.send(WatchEvent::Add(file)).await.unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), summaries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.moved, 1);

    drop(tx);
    runner.await.unwrap();
}
