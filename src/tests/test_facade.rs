use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::SyncConfig;
use crate::notification::MemoryProgressObserver;
use crate::settings::SettingsFile;
use crate::subtitle::AudioStatus;
use crate::tts::{cache_key, page_identity_hash, AudioCacheStore};
use crate::{Collaborators, VoiceoverSync};

const SRT: &str = "1\n00:00:01,000 --> 00:00:04,000\n你好\n\n2\n00:00:05,000 --> 00:00:08,000\n今天我们一起去公园散步吧\n\n3\n00:00:09,000 --> 00:00:12,000\n好的\n";

struct Facade {
    voiceover: VoiceoverSync,
    cache: Arc<MemoryAudioCache>,
    tts: Arc<FakeTts>,
    video: Arc<FakeVideo>,
}

fn facade(config: SyncConfig) -> Facade {
    let cache = Arc::new(MemoryAudioCache::new());
    let tts = Arc::new(FakeTts::new());
    let video = Arc::new(FakeVideo::new(0.0, true));
    let collaborators = Collaborators {
        video: video.clone(),
        overlay: Arc::new(RecordingOverlay::default()),
        sink: Arc::new(FakeSink::new(Duration::from_millis(10))),
        cache: cache.clone(),
        tts: tts.clone(),
        decoder: Arc::new(DefaultAudioDecoder::new()),
    };
    let voiceover = VoiceoverSync::new(config, PAGE_URL, collaborators).unwrap();

    Facade {
        voiceover,
        cache,
        tts,
        video,
    }
}

#[tokio::test]
async fn test_load_subtitles_and_play() {
    let f = facade(SyncConfig::default());
    assert_eq!(f.voiceover.load_subtitles(SRT).unwrap(), 3);

    f.video.set_time(2.0);
    f.voiceover.on_time_update();
    assert_eq!(
        f.voiceover.session().lock().paused_for_cue_id.as_deref(),
        Some("1")
    );

    wait_until(|| f.voiceover.session().status_of("1") == Some(AudioStatus::Loaded)).await;
    wait_until(|| !f.video.is_paused()).await;
    assert_eq!(f.tts.texts()[0], "你好");
}

#[tokio::test]
async fn test_short_cues_merged_when_enabled() {
    let mut config = SyncConfig::default();
    config.subtitles.merge_short_cues = true;
    let f = facade(config);

    assert_eq!(f.voiceover.load_subtitles(SRT).unwrap(), 1);
    let cue = f.voiceover.session().cue("1").unwrap();
    assert_eq!(cue.start_time, 1.0);
    assert_eq!(cue.end_time, 12.0);
}

#[tokio::test]
async fn test_invalid_subtitles_keep_previous_set() {
    let f = facade(SyncConfig::default());
    f.voiceover.load_subtitles(SRT).unwrap();

    assert!(matches!(
        f.voiceover.load_subtitles("not a subtitle file"),
        Err(VoiceoverError::Parse(_))
    ));
    assert_eq!(f.voiceover.session().cue_ids().len(), 3);
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = SyncConfig::default();
    config.batch.group_size = 0;
    let collaborators = Collaborators {
        video: Arc::new(FakeVideo::new(0.0, true)),
        overlay: Arc::new(RecordingOverlay::default()),
        sink: Arc::new(FakeSink::new(Duration::ZERO)),
        cache: Arc::new(MemoryAudioCache::new()),
        tts: Arc::new(FakeTts::new()),
        decoder: Arc::new(DefaultAudioDecoder::new()),
    };

    assert!(matches!(
        VoiceoverSync::new(config, PAGE_URL, collaborators),
        Err(VoiceoverError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_load_all_reports_progress() {
    let f = facade(SyncConfig::default());
    f.voiceover.load_subtitles(SRT).unwrap();
    let progress = MemoryProgressObserver::new();
    f.voiceover.add_progress_observer(Box::new(progress.clone()));

    let report = f.voiceover.load_all().await.unwrap();

    assert_eq!(report.loaded, 3);
    assert_eq!(progress.history().last().map(|p| p.percent), Some(100.0));
    assert!(!f.voiceover.cancel_batch());
}

#[tokio::test]
async fn test_clear_page_cache_resets_cues() {
    let f = facade(SyncConfig::default());
    f.voiceover.load_subtitles(SRT).unwrap();
    f.voiceover.load_all().await.unwrap();
    assert_eq!(f.cache.len(), 3);
    f.cache.set("audio_1_1", b"other page").await.unwrap();

    f.voiceover.clear_page_cache().await.unwrap();

    assert_eq!(f.cache.keys().await.unwrap(), vec!["audio_1_1"]);
    assert_eq!(
        f.voiceover.session().lock().status_counts().unloaded,
        3
    );
}

#[tokio::test]
async fn test_voice_config_and_settings_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let settings_path = dir.path().join("settings.json");
    let mut config = SyncConfig::default();
    config.voice_dir = Some(PathBuf::from("/srv/voices"));

    let f = facade(config.clone());
    let voiceover = f
        .voiceover
        .with_settings(SettingsFile::new(&settings_path));
    let key = cache_key(page_identity_hash(PAGE_URL), "1");
    f.cache.set(&key, b"old voice").await.unwrap();

    let entries = voiceover
        .apply_voice_config("voice-Anna-你好呀.wav\nvoice-Boris.wav\nreadme.txt\n")
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(f.cache.is_empty());

    assert!(matches!(
        voiceover.select_voice("voice-Boris.wav").await,
        Err(VoiceoverError::Configuration(_))
    ));
    let params = voiceover.select_voice("voice-Anna-你好呀.wav").await.unwrap();
    assert_eq!(params.prompt_text.as_deref(), Some("你好呀"));
    voiceover.set_muted(true).await.unwrap();

    voiceover.load_subtitles(SRT).unwrap();
    voiceover.load_all().await.unwrap();
    let request = f.tts.last_request().unwrap();
    assert_eq!(request.ref_audio_path, params.ref_audio_path);
    assert_eq!(request.prompt_text.as_deref(), Some("你好呀"));

    // Новый экземпляр восстанавливает сохраненные настройки
    let restored = facade(config)
        .voiceover
        .with_settings(SettingsFile::new(&settings_path));
    restored.restore_settings().await.unwrap();
    assert_eq!(restored.voices().len(), 2);
    assert!(restored.session().modes().muted);
    assert_eq!(restored.synchronizer().voice(), params);
}
