//! Воспроизведение реплик
//!
//! Одновременно звучит не больше одной реплики. Текущее воспроизведение
//! хранится в слоте под мьютексом; новая реплика останавливает предыдущую.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::media::{AudioClip, AudioSink, OverlayView, VideoSurface};
use crate::subtitle::cue::round_rate;

/// Запрос на воспроизведение реплики
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub cue_id: String,
    pub clip: AudioClip,
    /// Скорость видео на время реплики; `None` означает 1.0
    pub playback_rate: Option<f64>,
    /// После реплики поставить видео на паузу
    pub single_play: bool,
    pub learn: bool,
    pub muted: bool,
}

struct ActivePlayback {
    token: u64,
    cue_id: String,
    clip_id: Uuid,
    cancel: CancellationToken,
}

/// Проигрыватель реплик
pub struct Player {
    video: Arc<dyn VideoSurface>,
    overlay: Arc<dyn OverlayView>,
    sink: Arc<dyn AudioSink>,
    muted_duration: Duration,
    slot: Mutex<Option<ActivePlayback>>,
    next_token: AtomicU64,
}

impl Player {
    pub fn new(
        video: Arc<dyn VideoSurface>,
        overlay: Arc<dyn OverlayView>,
        sink: Arc<dyn AudioSink>,
        muted_duration: Duration,
    ) -> Self {
        Self {
            video,
            overlay,
            sink,
            muted_duration,
            slot: Mutex::new(None),
            next_token: AtomicU64::new(0),
        }
    }

    /// Субтитр, реплика которого звучит сейчас
    pub fn current_cue(&self) -> Option<String> {
        self.slot.lock().as_ref().map(|active| active.cue_id.clone())
    }

    pub fn is_playing(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Остановить текущую реплику, вернуть скорость 1.0 и снять подсветку
    pub fn stop(&self) {
        if let Some(active) = self.slot.lock().take() {
            log::debug!("Stopping audio of cue {}", active.cue_id);
            active.cancel.cancel();
        }
        self.video.set_playback_rate(1.0);
        self.overlay.highlight(None);
    }

    /// Запустить реплику
    ///
    /// Возвращает `false`, если этот клип уже звучит. Должна вызываться внутри
    /// runtime tokio.
    pub fn play(self: &Arc<Self>, request: PlayRequest) -> bool {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let previous = {
            let mut slot = self.slot.lock();
            if slot.as_ref().map(|active| active.clip_id) == Some(request.clip.id()) {
                return false;
            }
            slot.replace(ActivePlayback {
                token,
                cue_id: request.cue_id.clone(),
                clip_id: request.clip.id(),
                cancel: cancel.clone(),
            })
        };

        if let Some(previous) = previous {
            previous.cancel.cancel();
            self.video.set_playback_rate(1.0);
            self.overlay.highlight(None);
        }

        let rate = round_rate(request.playback_rate.unwrap_or(1.0));
        self.overlay.highlight(Some(&request.cue_id));
        self.video.set_playback_rate(rate);
        log::debug!("Playing audio of cue {} at rate {}", request.cue_id, rate);

        let player = Arc::clone(self);
        tokio::spawn(async move {
            player.run(token, request, rate, cancel).await;
        });
        true
    }

    async fn run(&self, token: u64, request: PlayRequest, rate: f64, cancel: CancellationToken) {
        if request.learn {
            self.video.pause();
        } else {
            self.video.set_playback_rate(rate);
        }

        let result = if request.muted {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.muted_duration) => Ok(()),
            }
        } else {
            tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.sink.play(&request.clip) => result,
            }
        };

        {
            let mut slot = self.slot.lock();
            if slot.as_ref().map(|active| active.token) != Some(token) {
                return;
            }
            slot.take();
        }

        self.video.set_playback_rate(1.0);
        self.overlay.highlight(None);

        if let Err(e) = &result {
            log::error!("Playback of cue {} failed: {}", request.cue_id, e);
        }
        if request.single_play && result.is_ok() {
            self.video.pause();
        }
        if request.learn {
            self.video.play();
        }
    }
}
