//! Основной файл библиотеки voiceover-sync
//!
//! Библиотека озвучивает видео по внешнему файлу субтитров: лениво синтезирует
//! реплики через локальный сервис TTS, кэширует аудио для страницы, подгоняет
//! скорость видео под длительность реплик и ставит видео на паузу, пока аудио
//! активного субтитра не загружено.

pub mod config;
pub mod error;
pub mod loader;
pub mod media;
pub mod notification;
pub mod progress;
pub mod settings;
pub mod subtitle;
pub mod sync;
pub mod tts;
pub mod utils;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::{Result, VoiceoverError};
use crate::loader::{BatchLoader, BatchReport, CueAudioLoader};
use crate::media::{AudioDecoder, AudioSink, DefaultAudioDecoder, OverlayView, VideoSurface};
use crate::notification::{CueStatusObserver, LogProgressObserver};
use crate::progress::{DefaultProgressReporter, ProgressObserver, ProgressReporter};
use crate::settings::{SelectedVoice, SettingsFile};
use crate::subtitle::Cue;
use crate::sync::{PlaybackSynchronizer, Session};
use crate::tts::{AudioCacheStore, FileAudioCache, GptSovitsClient, TtsClient, VoiceEntry, VoiceParams};

pub use crate::utils::logger::init_logger;

/// Внешние компоненты, с которыми работает библиотека
pub struct Collaborators {
    pub video: Arc<dyn VideoSurface>,
    pub overlay: Arc<dyn OverlayView>,
    pub sink: Arc<dyn AudioSink>,
    pub cache: Arc<dyn AudioCacheStore>,
    pub tts: Arc<dyn TtsClient>,
    pub decoder: Arc<dyn AudioDecoder>,
}

/// Основная структура для работы с библиотекой
pub struct VoiceoverSync {
    /// Конфигурация библиотеки
    config: SyncConfig,
    session: Session,
    loader: Arc<CueAudioLoader>,
    synchronizer: PlaybackSynchronizer,
    batch: BatchLoader,
    reporter: Arc<DefaultProgressReporter>,
    settings: Option<SettingsFile>,
    voices: RwLock<Vec<VoiceEntry>>,
    batch_cancel: Mutex<Option<(u64, CancellationToken)>>,
    next_batch_id: AtomicU64,
}

impl VoiceoverSync {
    /// Создать экземпляр с указанными компонентами
    pub fn new(config: SyncConfig, page_url: &str, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let session = Session::new();
        let loader = Arc::new(CueAudioLoader::new(
            collaborators.cache,
            collaborators.tts,
            collaborators.decoder,
            config.tts.clone(),
            page_url,
        ));
        let synchronizer = PlaybackSynchronizer::new(
            session.clone(),
            Arc::clone(&loader),
            collaborators.video,
            collaborators.overlay,
            collaborators.sink,
            config.playback.clone(),
        );
        let reporter = Arc::new(DefaultProgressReporter::new());
        reporter.add_observer(Box::new(LogProgressObserver::new()));
        let batch = BatchLoader::new(
            Arc::clone(&loader),
            config.batch.clone(),
            Arc::clone(&reporter) as Arc<dyn ProgressReporter>,
        );

        Ok(Self {
            config,
            session,
            loader,
            synchronizer,
            batch,
            reporter,
            settings: None,
            voices: RwLock::new(Vec::new()),
            batch_cancel: Mutex::new(None),
            next_batch_id: AtomicU64::new(0),
        })
    }

    /// Создать экземпляр с кэшем на диске, клиентом GPT-SoVITS и декодером по умолчанию
    pub fn with_defaults(
        config: SyncConfig,
        page_url: &str,
        video: Arc<dyn VideoSurface>,
        overlay: Arc<dyn OverlayView>,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Self> {
        let cache = Arc::new(FileAudioCache::new(&config.cache)?);
        let tts = Arc::new(GptSovitsClient::new(&config.tts)?);
        let collaborators = Collaborators {
            video,
            overlay,
            sink,
            cache,
            tts,
            decoder: Arc::new(DefaultAudioDecoder::new()),
        };
        Self::new(config, page_url, collaborators)
    }

    /// Сохранять настройки пользователя в файл
    pub fn with_settings(mut self, settings: SettingsFile) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn synchronizer(&self) -> &PlaybackSynchronizer {
        &self.synchronizer
    }

    pub fn loader(&self) -> &Arc<CueAudioLoader> {
        &self.loader
    }

    /// Добавить наблюдателя прогресса пакетной загрузки
    pub fn add_progress_observer(&self, observer: Box<dyn ProgressObserver>) -> usize {
        self.reporter.add_observer(observer)
    }

    pub fn remove_progress_observer(&self, id: usize) -> bool {
        self.reporter.remove_observer(id).is_some()
    }

    /// Добавить наблюдателя за состоянием аудио субтитров
    pub fn add_status_observer(&self, observer: Arc<dyn CueStatusObserver>) -> usize {
        self.loader.add_observer(observer)
    }

    /// Восстановить сохраненные настройки: голос, список голосов, режим без звука
    pub async fn restore_settings(&self) -> Result<()> {
        let Some(file) = &self.settings else {
            return Ok(());
        };
        let settings = file.load().await?;

        *self.voices.write() = settings
            .voice_files
            .iter()
            .filter_map(|name| VoiceEntry::from_file_name(name))
            .collect();
        if let Some(selected) = settings.selected_voice {
            self.synchronizer.set_voice(selected.params);
        }
        self.synchronizer.set_muted(settings.muted);

        log::info!("Restored settings from {}", file.path().display());
        Ok(())
    }

    /// Загрузить субтитры из строки в формате SRT
    pub fn load_subtitles(&self, content: &str) -> Result<usize> {
        let cues = subtitle::parse_srt(content)?;
        Ok(self.replace_cues(cues))
    }

    /// Загрузить субтитры из файла SRT
    pub async fn load_subtitle_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        log::info!("Loading subtitles from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        self.load_subtitles(&content)
    }

    fn replace_cues(&self, cues: Vec<Cue>) -> usize {
        let cues = if self.config.subtitles.merge_short_cues {
            subtitle::optimizer::merge_short_cues(cues, self.config.subtitles.min_cjk_chars)
        } else {
            cues
        };
        let count = cues.len();
        self.synchronizer.load_subtitles(cues);
        count
    }

    /// Обработать обновление времени видео
    pub fn on_time_update(&self) {
        self.synchronizer.on_time_update();
    }

    /// Загрузить аудио всех субтитров
    ///
    /// Одновременно выполняется только один пакет: новый запуск отменяет предыдущий.
    pub async fn load_all(&self) -> Result<BatchReport> {
        let batch_id = self.next_batch_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        if let Some((_, previous)) = self.batch_cancel.lock().replace((batch_id, cancel.clone())) {
            previous.cancel();
        }

        let options = self.synchronizer.load_options();
        let result = self.batch.run_all(&self.session, &options, &cancel).await;

        let mut slot = self.batch_cancel.lock();
        if slot.as_ref().map_or(false, |(id, _)| *id == batch_id) {
            slot.take();
        }
        result
    }

    /// Отменить пакетную загрузку; `false`, если она не выполняется
    pub fn cancel_batch(&self) -> bool {
        match self.batch_cancel.lock().take() {
            Some((_, cancel)) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Очистить кэш текущей страницы и сбросить аудио всех субтитров
    pub async fn clear_page_cache(&self) -> Result<()> {
        let cue_ids = self.session.cue_ids();
        self.loader.evict_cues(&cue_ids).await?;
        self.synchronizer.stop_audio();
        self.session.lock().reset_all_audio();
        log::info!("Cleared cached audio for {} cues", cue_ids.len());
        Ok(())
    }

    /// Применить новую голосовую конфигурацию
    ///
    /// Весь кэш аудио и выбранный голос сбрасываются.
    pub async fn apply_voice_config(&self, content: &str) -> Result<Vec<VoiceEntry>> {
        let removed = self.loader.evict_all().await?;
        log::info!("Cleared {} cached audio entries", removed);

        let entries = tts::parse_voice_config(content);
        *self.voices.write() = entries.clone();
        self.synchronizer.set_voice(VoiceParams::default());

        if let Some(file) = &self.settings {
            let voice_files: Vec<String> = entries.iter().map(|e| e.file_name.clone()).collect();
            file.update(|s| {
                s.voice_files = voice_files;
                s.selected_voice = None;
            })
            .await?;
        }

        Ok(entries)
    }

    /// Голоса из последней загруженной конфигурации
    pub fn voices(&self) -> Vec<VoiceEntry> {
        self.voices.read().clone()
    }

    /// Выбрать голос по имени файла
    pub async fn select_voice(&self, file_name: &str) -> Result<VoiceParams> {
        let entry = self
            .voices
            .read()
            .iter()
            .find(|entry| entry.file_name == file_name)
            .cloned()
            .ok_or_else(|| {
                VoiceoverError::Configuration(format!("Unknown voice: {}", file_name))
            })?;
        let params = entry
            .voice_params(self.config.voice_dir.as_deref())
            .ok_or_else(|| {
                VoiceoverError::Configuration(format!(
                    "Voice {} has no prompt text",
                    file_name
                ))
            })?;

        self.synchronizer.set_voice(params.clone());
        if let Some(file) = &self.settings {
            let selected = SelectedVoice {
                file: entry.file_name.clone(),
                params: params.clone(),
            };
            file.update(|s| s.selected_voice = Some(selected)).await?;
        }

        log::info!("Selected voice {}", entry.label);
        Ok(params)
    }

    /// Включить или выключить звук реплик
    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.synchronizer.set_muted(muted);
        if let Some(file) = &self.settings {
            file.update(|s| s.muted = muted).await?;
        }
        Ok(())
    }

    pub fn set_learn_mode(&self, enabled: bool) {
        self.synchronizer.set_learn_mode(enabled);
    }

    pub fn set_reload_mode(&self, enabled: bool) {
        self.synchronizer.set_reload_mode(enabled);
    }

    pub fn set_page_url(&self, page_url: &str) {
        self.loader.set_page_url(page_url);
    }

    pub fn restart(&self) {
        self.synchronizer.restart();
    }

    pub async fn play_single(&self, cue_id: &str) -> Result<bool> {
        self.synchronizer.play_single(cue_id).await
    }

    /// Заново синтезировать реплику субтитра и воспроизвести ее
    pub async fn regenerate(&self, cue_id: &str) -> Result<bool> {
        self.synchronizer.regenerate(cue_id).await
    }

    pub fn stop_audio(&self) {
        self.synchronizer.stop_audio();
    }
}
