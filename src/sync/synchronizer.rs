//! Синхронизация видео с репликами
//!
//! На каждое обновление времени видео синхронизатор находит активный субтитр,
//! заранее подгружает аудио соседних субтитров и решает, запустить реплику
//! или поставить видео на паузу до окончания загрузки.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::config::PlaybackConfig;
use crate::error::{Result, VoiceoverError};
use crate::loader::{CueAudioLoader, LoadOptions, LoadOutcome};
use crate::media::{AudioSink, OverlayView, VideoSurface};
use crate::notification::{ChannelStatusObserver, CueStatusEvent, CueStatusObserver};
use crate::subtitle::{AudioStatus, Cue};
use crate::tts::VoiceParams;

use super::playback::{PlayRequest, Player};
use super::session::Session;

/// Интервал перепроверки статуса при ожидании чужой загрузки
const STATUS_RECHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Действие, выбранное по таблице решений
#[derive(Debug, PartialEq)]
enum TickAction {
    Nothing,
    Play(String),
    Pause,
}

struct SyncInner {
    session: Session,
    loader: Arc<CueAudioLoader>,
    video: Arc<dyn VideoSurface>,
    overlay: Arc<dyn OverlayView>,
    player: Arc<Player>,
    config: PlaybackConfig,
    voice: RwLock<VoiceParams>,
}

/// Возобновляет видео, когда загрузилось аудио, ради которого оно стоит
struct ResumeObserver {
    inner: Weak<SyncInner>,
}

impl CueStatusObserver for ResumeObserver {
    fn on_status_change(&self, cue_id: &str, status: AudioStatus) {
        if status != AudioStatus::Loaded {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            inner.resume_if_waiting(cue_id);
        }
    }
}

/// Временная подписка на статусы субтитров; снимается при drop
struct StatusSubscription<'a> {
    loader: &'a CueAudioLoader,
    id: usize,
    events: mpsc::UnboundedReceiver<CueStatusEvent>,
}

impl<'a> StatusSubscription<'a> {
    fn new(loader: &'a CueAudioLoader) -> Self {
        let (observer, events) = ChannelStatusObserver::channel();
        let id = loader.add_observer(Arc::new(observer));
        Self { loader, id, events }
    }
}

impl Drop for StatusSubscription<'_> {
    fn drop(&mut self) {
        self.loader.remove_observer(self.id);
    }
}

/// Синхронизатор воспроизведения
pub struct PlaybackSynchronizer {
    inner: Arc<SyncInner>,
    observer_id: usize,
}

impl PlaybackSynchronizer {
    pub fn new(
        session: Session,
        loader: Arc<CueAudioLoader>,
        video: Arc<dyn VideoSurface>,
        overlay: Arc<dyn OverlayView>,
        sink: Arc<dyn AudioSink>,
        config: PlaybackConfig,
    ) -> Self {
        let player = Arc::new(Player::new(
            Arc::clone(&video),
            Arc::clone(&overlay),
            sink,
            config.muted_clip_duration(),
        ));
        let inner = Arc::new(SyncInner {
            session,
            loader: Arc::clone(&loader),
            video,
            overlay,
            player,
            config,
            voice: RwLock::new(VoiceParams::default()),
        });
        let observer_id = loader.add_observer(Arc::new(ResumeObserver {
            inner: Arc::downgrade(&inner),
        }));

        Self { inner, observer_id }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Установить голос для последующих загрузок
    pub fn set_voice(&self, voice: VoiceParams) {
        *self.inner.voice.write() = voice;
    }

    pub fn voice(&self) -> VoiceParams {
        self.inner.voice.read().clone()
    }

    /// Параметры загрузки с учетом текущих режимов
    pub fn load_options(&self) -> LoadOptions {
        self.inner.load_options()
    }

    /// Заменить набор субтитров; видео ставится на паузу
    pub fn load_subtitles(&self, cues: Vec<Cue>) {
        self.inner.player.stop();
        self.inner.video.pause();
        let count = cues.len();
        self.inner.session.lock().replace_cues(cues);
        self.inner.overlay.show_text("");
        log::info!("Loaded {} subtitles", count);
    }

    /// Обработать обновление времени видео
    ///
    /// Должна вызываться внутри runtime tokio: загрузки соседних субтитров
    /// запускаются отдельными задачами.
    pub fn on_time_update(&self) {
        self.inner.on_time_update();
    }

    /// Продолжить воспроизведение, если видео ждет загрузки этого субтитра
    pub fn resume_if_waiting(&self, cue_id: &str) {
        self.inner.resume_if_waiting(cue_id);
    }

    /// Воспроизвести реплику; `false`, если аудио нет или клип уже звучит
    pub fn play_audio(&self, cue_id: &str, single_play: bool) -> Result<bool> {
        self.inner.play_audio(cue_id, single_play)
    }

    pub fn stop_audio(&self) {
        self.inner.player.stop();
    }

    pub fn current_cue(&self) -> Option<String> {
        self.inner.player.current_cue()
    }

    /// Прослушать одну реплику: перемотка к началу субтитра и пауза после
    ///
    /// Если аудио еще нет (или загрузка не удалась), оно загружается; уже
    /// идущая загрузка дожидается завершения.
    pub async fn play_single(&self, cue_id: &str) -> Result<bool> {
        self.inner.player.stop();

        let start_time = {
            let mut state = self.inner.session.lock();
            let cue = state
                .cue_mut(cue_id)
                .ok_or_else(|| VoiceoverError::CueNotFound(cue_id.to_string()))?;
            if cue.audio_status == AudioStatus::Failed {
                cue.reset_audio();
            }
            let start_time = cue.start_time;
            // Реплику запускает сам play_single, а не наблюдатель загрузки
            if state.paused_for_cue_id.as_deref() == Some(cue_id) {
                state.paused_for_cue_id = None;
            }
            start_time
        };
        self.inner.video.seek(start_time);

        if self.inner.session.status_of(cue_id) != Some(AudioStatus::Loaded) {
            let options = self.inner.load_options();
            self.inner.load_and_wait(cue_id, &options).await?;
        }

        self.inner.play_audio(cue_id, true)
    }

    /// Заново синтезировать реплику без кэша и воспроизвести ее
    pub async fn regenerate(&self, cue_id: &str) -> Result<bool> {
        self.inner.player.stop();
        let options = LoadOptions {
            force_regenerate: true,
            ..self.inner.load_options()
        };
        self.inner.load_and_wait(cue_id, &options).await?;
        log::info!("Regenerated audio for cue {}", cue_id);
        self.inner.play_audio(cue_id, false)
    }

    /// Начать просмотр сначала
    pub fn restart(&self) {
        {
            let mut state = self.inner.session.lock();
            if state.modes.reload {
                state.reset_all_audio();
            }
        }
        self.inner.video.seek(0.0);
        if self.inner.video.is_paused() {
            self.inner.video.play();
        }
        self.inner.player.stop();
        self.inner.session.lock().last_played_cue_id = None;
    }

    /// Режим пересинтеза; включение сбрасывает аудио всех субтитров
    pub fn set_reload_mode(&self, enabled: bool) {
        let mut state = self.inner.session.lock();
        state.modes.reload = enabled;
        if enabled {
            state.reset_all_audio();
        }
    }

    pub fn set_learn_mode(&self, enabled: bool) {
        self.inner.session.lock().modes.learn = enabled;
    }

    pub fn set_muted(&self, muted: bool) {
        self.inner.session.lock().modes.muted = muted;
    }
}

impl Drop for PlaybackSynchronizer {
    fn drop(&mut self) {
        self.inner.loader.remove_observer(self.observer_id);
        self.inner.player.stop();
    }
}

impl SyncInner {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            force_regenerate: self.session.modes().reload,
            voice: self.voice.read().clone(),
        }
    }

    fn on_time_update(&self) {
        let time = self.video.current_time();
        let paused = self.video.is_paused();

        let (text, preload, action) = {
            let mut state = self.session.lock();
            let Some(index) = state.active_cue_index(time) else {
                state.clear_tracking();
                drop(state);
                self.overlay.show_text("");
                return;
            };

            let radius = self.config.preload_radius;
            let last = (index + radius).min(state.cues.len() - 1);
            let preload: Vec<String> = state.cues[index.saturating_sub(radius)..=last]
                .iter()
                .filter(|cue| cue.audio_status == AudioStatus::Unloaded)
                .map(|cue| cue.id.clone())
                .collect();

            let cue = &state.cues[index];
            let id = cue.id.clone();
            let text = cue.text.clone();
            let loaded = cue.is_loaded();
            let is_last_played = state.last_played_cue_id.as_deref() == Some(id.as_str());
            let is_paused_for = state.paused_for_cue_id.as_deref() == Some(id.as_str());

            let action = if loaded {
                if is_paused_for {
                    // Видео возобновит наблюдатель загрузчика
                    TickAction::Nothing
                } else if !paused {
                    if is_last_played {
                        TickAction::Nothing
                    } else {
                        state.last_played_cue_id = Some(id.clone());
                        TickAction::Play(id)
                    }
                } else {
                    if !is_last_played {
                        state.last_played_cue_id = None;
                    }
                    TickAction::Nothing
                }
            } else {
                state.last_played_cue_id = None;
                state.paused_for_cue_id = Some(id);
                if paused {
                    TickAction::Nothing
                } else {
                    TickAction::Pause
                }
            };

            // Пауза ставится под блокировкой сессии, до запуска загрузок
            if action == TickAction::Pause {
                log::debug!("Pausing video until audio is loaded");
                self.video.pause();
            }

            (text, preload, action)
        };

        self.overlay.show_text(&text);
        self.spawn_preload(preload);

        match action {
            TickAction::Nothing | TickAction::Pause => {}
            TickAction::Play(cue_id) => {
                if let Err(e) = self.play_audio(&cue_id, false) {
                    log::error!("Failed to play cue {}: {}", cue_id, e);
                }
            }
        }
    }

    fn spawn_preload(&self, cue_ids: Vec<String>) {
        if cue_ids.is_empty() {
            return;
        }
        let options = self.load_options();
        for cue_id in cue_ids {
            let loader = Arc::clone(&self.loader);
            let session = self.session.clone();
            let options = options.clone();
            tokio::spawn(async move {
                loader.ensure_loaded(&session, &cue_id, &options).await;
            });
        }
    }

    /// Загрузить аудио субтитра или дождаться загрузки, начатой другой задачей
    async fn load_and_wait(&self, cue_id: &str, options: &LoadOptions) -> Result<()> {
        let mut subscription = StatusSubscription::new(&self.loader);
        match self.loader.ensure_loaded(&self.session, cue_id, options).await {
            LoadOutcome::Loaded(_) => return Ok(()),
            LoadOutcome::Failed(e) => return Err(e),
            LoadOutcome::Skipped(_) => {}
        }

        loop {
            match self.session.status_of(cue_id) {
                Some(AudioStatus::Loading) => {}
                Some(AudioStatus::Failed) => {
                    return Err(VoiceoverError::synthesis(format!(
                        "Failed to load audio for cue {}",
                        cue_id
                    )));
                }
                _ => return Ok(()),
            }
            // Брошенная загрузка возвращает субтитр в Unloaded без события
            tokio::select! {
                _ = subscription.events.recv() => {}
                _ = tokio::time::sleep(STATUS_RECHECK_INTERVAL) => {}
            }
        }
    }

    fn resume_if_waiting(&self, cue_id: &str) {
        {
            let mut state = self.session.lock();
            let waiting = state.paused_for_cue_id.as_deref() == Some(cue_id)
                && state.cue(cue_id).map_or(false, Cue::is_loaded);
            if !waiting {
                return;
            }
            state.paused_for_cue_id = None;
            state.last_played_cue_id = Some(cue_id.to_string());
            log::debug!("Audio for cue {} is ready, resuming video", cue_id);
            self.video.play();
        }

        if let Err(e) = self.play_audio(cue_id, false) {
            log::error!("Failed to play cue {}: {}", cue_id, e);
        }
    }

    fn play_audio(&self, cue_id: &str, single_play: bool) -> Result<bool> {
        let request = {
            let state = self.session.lock();
            let cue = state
                .cue(cue_id)
                .ok_or_else(|| VoiceoverError::CueNotFound(cue_id.to_string()))?;
            let Some(clip) = cue.audio.clone() else {
                return Ok(false);
            };
            PlayRequest {
                cue_id: cue_id.to_string(),
                clip,
                playback_rate: cue.playback_rate,
                single_play,
                learn: state.modes.learn,
                muted: state.modes.muted,
            }
        };

        Ok(self.player.play(request))
    }
}
