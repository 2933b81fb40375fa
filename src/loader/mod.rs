//! Загрузка аудио для субтитров
//!
//! Загрузчик материализует аудио одного субтитра: сначала кэш, затем сервис
//! синтеза. Для каждого субтитра одновременно выполняется не больше одной
//! загрузки.

pub mod batch;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::TtsConfig;
use crate::error::{Result, VoiceoverError};
use crate::media::{AudioClip, AudioDecoder};
use crate::notification::{CueStatusNotifier, CueStatusObserver};
use crate::subtitle::AudioStatus;
use crate::sync::Session;
use crate::tts::{cache_key, page_identity_hash, AudioCacheStore, TtsClient, TtsRequest, VoiceParams};

pub use batch::{BatchLoader, BatchReport};

/// Параметры загрузки
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Игнорировать кэш и текущее состояние субтитра
    pub force_regenerate: bool,
    /// Выбранный голос
    pub voice: VoiceParams,
}

/// Загруженное аудио субтитра
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    pub clip: AudioClip,
    pub duration: Option<f64>,
    pub playback_rate: Option<f64>,
}

/// Результат `ensure_loaded`
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(LoadedAudio),
    /// Загрузка не запускалась (или результат устарел); текущее состояние субтитра
    Skipped(AudioStatus),
    Failed(VoiceoverError),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

type InFlightKey = (u64, String);

/// Отметка о выполняющейся загрузке
///
/// Снимается при любом завершении future; если результат не был записан,
/// субтитр возвращается в `Unloaded`.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<InFlightKey>>,
    session: &'a Session,
    key: InFlightKey,
    committed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
        if self.committed {
            return;
        }

        let (generation, cue_id) = &self.key;
        let mut state = self.session.lock();
        if state.generation() != *generation {
            return;
        }
        if let Some(cue) = state.cue_mut(cue_id) {
            if cue.audio_status == AudioStatus::Loading {
                log::debug!("Load of cue {} was abandoned", cue_id);
                cue.reset_audio();
            }
        }
    }
}

/// Загрузчик аудио субтитров
pub struct CueAudioLoader {
    cache: Arc<dyn AudioCacheStore>,
    tts: Arc<dyn TtsClient>,
    decoder: Arc<dyn AudioDecoder>,
    tts_config: TtsConfig,
    page_hash: AtomicU32,
    in_flight: Mutex<HashSet<InFlightKey>>,
    notifier: CueStatusNotifier,
}

impl CueAudioLoader {
    pub fn new(
        cache: Arc<dyn AudioCacheStore>,
        tts: Arc<dyn TtsClient>,
        decoder: Arc<dyn AudioDecoder>,
        tts_config: TtsConfig,
        page_url: &str,
    ) -> Self {
        Self {
            cache,
            tts,
            decoder,
            tts_config,
            page_hash: AtomicU32::new(page_identity_hash(page_url)),
            in_flight: Mutex::new(HashSet::new()),
            notifier: CueStatusNotifier::new(),
        }
    }

    /// Сменить страницу (адрес видео), к которой привязан кэш
    pub fn set_page_url(&self, page_url: &str) {
        self.page_hash
            .store(page_identity_hash(page_url), Ordering::SeqCst);
    }

    pub fn page_hash(&self) -> u32 {
        self.page_hash.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &Arc<dyn AudioCacheStore> {
        &self.cache
    }

    /// Добавить наблюдателя за состоянием субтитров
    pub fn add_observer(&self, observer: Arc<dyn CueStatusObserver>) -> usize {
        self.notifier.add_observer(observer)
    }

    pub fn remove_observer(&self, id: usize) -> Option<Arc<dyn CueStatusObserver>> {
        self.notifier.remove_observer(id)
    }

    /// Выполняется ли загрузка субтитра в указанном поколении
    pub fn is_in_flight(&self, generation: u64, cue_id: &str) -> bool {
        self.in_flight
            .lock()
            .contains(&(generation, cue_id.to_string()))
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Обеспечить наличие аудио у субтитра
    ///
    /// Ошибки синтеза и декодирования переводят субтитр в `Failed` и
    /// возвращаются как `LoadOutcome::Failed`.
    pub async fn ensure_loaded(
        &self,
        session: &Session,
        cue_id: &str,
        options: &LoadOptions,
    ) -> LoadOutcome {
        let (generation, text) = {
            let mut state = session.lock();
            let generation = state.generation();
            let Some(cue) = state.cue_mut(cue_id) else {
                return LoadOutcome::Failed(VoiceoverError::CueNotFound(cue_id.to_string()));
            };
            if cue.audio_status != AudioStatus::Unloaded && !options.force_regenerate {
                return LoadOutcome::Skipped(cue.audio_status);
            }
            if !self
                .in_flight
                .lock()
                .insert((generation, cue_id.to_string()))
            {
                return LoadOutcome::Skipped(cue.audio_status);
            }
            cue.mark_loading();
            (generation, cue.text.trim().to_string())
        };

        let mut guard = InFlightGuard {
            in_flight: &self.in_flight,
            session,
            key: (generation, cue_id.to_string()),
            committed: false,
        };
        self.notifier.notify(cue_id, AudioStatus::Loading);
        log::debug!("Requesting audio for cue {}", cue_id);

        let result = self.fetch_audio(cue_id, &text, options).await;

        let (outcome, status) = {
            let mut state = session.lock();
            if state.generation() != generation {
                log::debug!("Discarding stale audio for cue {}", cue_id);
                return LoadOutcome::Skipped(
                    state
                        .cue(cue_id)
                        .map(|cue| cue.audio_status)
                        .unwrap_or(AudioStatus::Unloaded),
                );
            }
            let Some(cue) = state.cue_mut(cue_id) else {
                return LoadOutcome::Skipped(AudioStatus::Unloaded);
            };

            guard.committed = true;
            match result {
                Ok((clip, duration)) => {
                    cue.mark_loaded(clip.clone(), duration);
                    let loaded = LoadedAudio {
                        clip,
                        duration,
                        playback_rate: cue.playback_rate,
                    };
                    (LoadOutcome::Loaded(loaded), AudioStatus::Loaded)
                }
                Err(e) => {
                    log::error!("Failed to load audio for cue {}: {}", cue_id, e);
                    cue.mark_failed();
                    (LoadOutcome::Failed(e), AudioStatus::Failed)
                }
            }
        };

        drop(guard);
        self.notifier.notify(cue_id, status);
        outcome
    }

    /// Кэш, затем синтез; декодирование и измерение длительности
    async fn fetch_audio(
        &self,
        cue_id: &str,
        text: &str,
        options: &LoadOptions,
    ) -> Result<(AudioClip, Option<f64>)> {
        let key = cache_key(self.page_hash(), cue_id);

        let cached = if options.force_regenerate {
            None
        } else {
            self.read_cache(&key).await
        };

        let data = match cached {
            Some(data) => {
                log::debug!("Cache hit for {}", key);
                data
            }
            None => {
                let request = TtsRequest::new(text, &self.tts_config, &options.voice);
                let data = self.tts.synthesize(&request).await?;
                if let Err(e) = self.cache.set(&key, &data).await {
                    log::warn!("Failed to cache audio {}: {}", key, e);
                }
                data
            }
        };

        let clip = self.decoder.decode(data)?;
        let duration = match self.decoder.probe_duration(&clip).await {
            Ok(duration) => Some(duration),
            Err(e) => {
                log::warn!("Failed to probe duration for cue {}: {}", cue_id, e);
                None
            }
        };

        Ok((clip, duration))
    }

    async fn read_cache(&self, key: &str) -> Option<Bytes> {
        match self.cache.get(key).await {
            Ok(Some(data)) if !data.is_empty() => Some(data),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to read cached audio {}: {}", key, e);
                None
            }
        }
    }

    /// Удалить из кэша аудио указанных субтитров текущей страницы
    pub async fn evict_cues(&self, cue_ids: &[String]) -> Result<()> {
        let page_hash = self.page_hash();
        let keys: Vec<String> = cue_ids.iter().map(|id| cache_key(page_hash, id)).collect();
        self.cache.remove_many(&keys).await
    }

    /// Удалить из кэша все аудио
    pub async fn evict_all(&self) -> Result<usize> {
        let keys: Vec<String> = self
            .cache
            .keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(crate::tts::cache::AUDIO_KEY_PREFIX))
            .collect();
        self.cache.remove_many(&keys).await?;
        Ok(keys.len())
    }
}
