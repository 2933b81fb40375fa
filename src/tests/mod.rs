//! Общие заглушки для тестов загрузчика и синхронизатора

mod test_batch;
mod test_facade;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::{PlaybackConfig, TtsConfig};
use crate::error::{Result, VoiceoverError};
use crate::loader::CueAudioLoader;
use crate::media::audio::tests::silent_wav;
use crate::media::{AudioClip, AudioSink, DefaultAudioDecoder, OverlayView, VideoSurface};
use crate::subtitle::Cue;
use crate::sync::{PlaybackSynchronizer, Session};
use crate::tts::{MemoryAudioCache, TtsClient, TtsRequest};

pub(crate) const PAGE_URL: &str = "https://video.example.com/watch?v=42";

/// Дождаться выполнения условия (до 2 секунд)
pub(crate) async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition was not reached in time");
}

/// Субтитры по 3 секунды с промежутком в 1 секунду: [0,3], [4,7], [8,11], ...
pub(crate) fn cues(count: usize) -> Vec<Cue> {
    (0..count)
        .map(|i| {
            let start = i as f64 * 4.0;
            Cue::new((i + 1).to_string(), start, start + 3.0, format!("第{}句台词", i + 1))
        })
        .collect()
}

/// Сервис синтеза, возвращающий WAV фиксированной длительности
pub(crate) struct FakeTts {
    audio: Bytes,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    requests: Mutex<Vec<TtsRequest>>,
    failing_texts: Mutex<HashSet<String>>,
    /// Если задан, каждый запрос ждет разрешения
    gate: Option<Arc<Semaphore>>,
}

impl FakeTts {
    pub(crate) fn new() -> Self {
        Self::with_audio(silent_wav(2.0))
    }

    pub(crate) fn with_audio(audio: Bytes) -> Self {
        Self {
            audio,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            failing_texts: Mutex::new(HashSet::new()),
            gate: None,
        }
    }

    /// Каждый запрос ждет разрешения семафора
    pub(crate) fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let tts = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new()
        };
        (tts, gate)
    }

    pub(crate) fn fail_on(&self, text: &str) {
        self.failing_texts.lock().insert(text.to_string());
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|request| request.text.clone())
            .collect()
    }

    pub(crate) fn last_request(&self) -> Option<TtsRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl TtsClient for FakeTts {
    async fn synthesize(&self, request: &TtsRequest) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing_texts.lock().contains(&request.text) {
            return Err(VoiceoverError::Synthesis {
                message: "model not loaded".to_string(),
                status: Some(500),
            });
        }
        Ok(self.audio.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum VideoEvent {
    Play,
    Pause,
    Seek(f64),
    Rate(f64),
}

/// Видеоэлемент с ручным управлением временем
pub(crate) struct FakeVideo {
    time: Mutex<f64>,
    paused: Mutex<bool>,
    rate: Mutex<f64>,
    events: Mutex<Vec<VideoEvent>>,
    /// Задержка, с которой пауза доходит до видео
    pause_delay: Duration,
}

impl FakeVideo {
    pub(crate) fn new(time: f64, paused: bool) -> Self {
        Self {
            time: Mutex::new(time),
            paused: Mutex::new(paused),
            rate: Mutex::new(1.0),
            events: Mutex::new(Vec::new()),
            pause_delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_pause_delay(mut self, delay: Duration) -> Self {
        self.pause_delay = delay;
        self
    }

    pub(crate) fn set_time(&self, time: f64) {
        *self.time.lock() = time;
    }

    pub(crate) fn events(&self) -> Vec<VideoEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn rates(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                VideoEvent::Rate(rate) => Some(rate),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear_events(&self) {
        self.events.lock().clear();
    }
}

impl VideoSurface for FakeVideo {
    fn current_time(&self) -> f64 {
        *self.time.lock()
    }

    fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    fn play(&self) {
        *self.paused.lock() = false;
        self.events.lock().push(VideoEvent::Play);
    }

    fn pause(&self) {
        if !self.pause_delay.is_zero() {
            std::thread::sleep(self.pause_delay);
        }
        *self.paused.lock() = true;
        self.events.lock().push(VideoEvent::Pause);
    }

    fn seek(&self, time: f64) {
        *self.time.lock() = time;
        self.events.lock().push(VideoEvent::Seek(time));
    }

    fn playback_rate(&self) -> f64 {
        *self.rate.lock()
    }

    fn set_playback_rate(&self, rate: f64) {
        *self.rate.lock() = rate;
        self.events.lock().push(VideoEvent::Rate(rate));
    }
}

#[derive(Default)]
pub(crate) struct RecordingOverlay {
    text: Mutex<String>,
    highlighted: Mutex<Option<String>>,
    highlights: Mutex<Vec<Option<String>>>,
}

impl RecordingOverlay {
    pub(crate) fn text(&self) -> String {
        self.text.lock().clone()
    }

    pub(crate) fn highlighted(&self) -> Option<String> {
        self.highlighted.lock().clone()
    }

    pub(crate) fn highlights(&self) -> Vec<Option<String>> {
        self.highlights.lock().clone()
    }
}

impl OverlayView for RecordingOverlay {
    fn show_text(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }

    fn highlight(&self, cue_id: Option<&str>) {
        let cue_id = cue_id.map(str::to_string);
        *self.highlighted.lock() = cue_id.clone();
        self.highlights.lock().push(cue_id);
    }
}

/// Вывод звука: запоминает клипы и "играет" их заданное время
pub(crate) struct FakeSink {
    played: Mutex<Vec<Uuid>>,
    finished: AtomicUsize,
    duration: Duration,
    gate: Option<Arc<Semaphore>>,
    fail: bool,
}

impl FakeSink {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            played: Mutex::new(Vec::new()),
            finished: AtomicUsize::new(0),
            duration,
            gate: None,
            fail: false,
        }
    }

    /// Клип звучит, пока тест не выдаст разрешение
    pub(crate) fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let sink = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new(Duration::ZERO)
        };
        (sink, gate)
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Duration::ZERO)
        }
    }

    pub(crate) fn played(&self) -> Vec<Uuid> {
        self.played.lock().clone()
    }

    pub(crate) fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(&self, clip: &AudioClip) -> Result<()> {
        self.played.lock().push(clip.id());
        if self.fail {
            return Err(VoiceoverError::Playback("output device lost".to_string()));
        }
        match &self.gate {
            Some(gate) => {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            None => tokio::time::sleep(self.duration).await,
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Собранный синхронизатор с заглушками
pub(crate) struct Harness {
    pub session: Session,
    pub loader: Arc<CueAudioLoader>,
    pub cache: Arc<MemoryAudioCache>,
    pub tts: Arc<FakeTts>,
    pub video: Arc<FakeVideo>,
    pub overlay: Arc<RecordingOverlay>,
    pub sink: Arc<FakeSink>,
    pub sync: PlaybackSynchronizer,
}

impl Harness {
    pub(crate) fn new(cue_count: usize, tts: FakeTts, sink: FakeSink, video: FakeVideo) -> Self {
        let session = Session::with_cues(cues(cue_count));
        let cache = Arc::new(MemoryAudioCache::new());
        let tts = Arc::new(tts);
        let loader = Arc::new(CueAudioLoader::new(
            cache.clone(),
            tts.clone(),
            Arc::new(DefaultAudioDecoder::new()),
            TtsConfig::default(),
            PAGE_URL,
        ));
        let video = Arc::new(video);
        let overlay = Arc::new(RecordingOverlay::default());
        let sink = Arc::new(sink);
        let config = PlaybackConfig {
            preload_radius: 2,
            muted_clip_duration_ms: 50,
        };
        let sync = PlaybackSynchronizer::new(
            session.clone(),
            loader.clone(),
            video.clone(),
            overlay.clone(),
            sink.clone(),
            config,
        );

        Self {
            session,
            loader,
            cache,
            tts,
            video,
            overlay,
            sink,
            sync,
        }
    }

    /// Загрузить аудио субтитра напрямую через загрузчик
    pub(crate) async fn preload(&self, cue_id: &str) {
        let outcome = self
            .loader
            .ensure_loaded(&self.session, cue_id, &Default::default())
            .await;
        assert!(outcome.is_loaded(), "cue {} was not loaded", cue_id);
    }

    pub(crate) fn clip_id(&self, cue_id: &str) -> Uuid {
        self.session
            .cue(cue_id)
            .and_then(|cue| cue.audio)
            .map(|clip| clip.id())
            .expect("cue has audio")
    }
}
