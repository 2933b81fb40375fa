//! Пакетная загрузка аудио всех субтитров
//!
//! Субтитры обрабатываются группами: внутри группы запросы выполняются
//! параллельно, между группами выдерживается пауза, чтобы не перегружать
//! сервис синтеза.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::BatchConfig;
use crate::error::{Result, VoiceoverError};
use crate::progress::{ProgressInfo, ProgressReporter};
use crate::subtitle::AudioStatus;
use crate::sync::Session;

use super::{CueAudioLoader, LoadOptions, LoadOutcome};

/// Итог пакетной загрузки
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Количество субтитров в пакете
    pub total: usize,
    pub loaded: usize,
    /// Пропущены: уже загружены или загружаются другим запросом
    pub skipped: usize,
    /// Ошибки по субтитрам
    pub failures: Vec<(String, VoiceoverError)>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    fn processed(&self) -> usize {
        self.loaded + self.skipped + self.failures.len()
    }

    fn record(&mut self, cue_id: String, outcome: LoadOutcome) {
        match outcome {
            LoadOutcome::Loaded(_) => self.loaded += 1,
            LoadOutcome::Skipped(_) => self.skipped += 1,
            LoadOutcome::Failed(e) => self.failures.push((cue_id, e)),
        }
    }
}

/// Пакетный загрузчик
pub struct BatchLoader {
    loader: Arc<CueAudioLoader>,
    config: BatchConfig,
    reporter: Arc<dyn ProgressReporter>,
}

impl BatchLoader {
    pub fn new(
        loader: Arc<CueAudioLoader>,
        config: BatchConfig,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            loader,
            config,
            reporter,
        }
    }

    /// Загрузить аудио всех субтитров сессии
    ///
    /// Без `force_regenerate` обрабатываются только субтитры в `Unloaded`.
    /// При отмене уже запущенные запросы завершаются, новые не запускаются,
    /// и возвращается `VoiceoverError::Cancelled`.
    pub async fn run_all(
        &self,
        session: &Session,
        options: &LoadOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let targets: Vec<String> = {
            let state = session.lock();
            state
                .cues
                .iter()
                .filter(|cue| options.force_regenerate || cue.audio_status == AudioStatus::Unloaded)
                .map(|cue| cue.id.clone())
                .collect()
        };

        let group_size = self.config.group_size.max(1);
        let group_count = targets.len().div_ceil(group_size);
        let mut report = BatchReport {
            total: targets.len(),
            ..BatchReport::default()
        };

        log::info!(
            "Starting batch load of {} cues in {} groups",
            targets.len(),
            group_count
        );

        for (index, group) in targets.chunks(group_size).enumerate() {
            if cancel.is_cancelled() {
                return self.cancelled(session, &targets[index * group_size..], report);
            }

            let mut dispatched = Vec::with_capacity(group.len());
            for cue_id in group {
                if cancel.is_cancelled() {
                    break;
                }
                dispatched.push(cue_id.clone());
            }

            let outcomes = join_all(
                dispatched
                    .iter()
                    .map(|cue_id| self.loader.ensure_loaded(session, cue_id, options)),
            )
            .await;
            for (cue_id, outcome) in dispatched.iter().cloned().zip(outcomes) {
                report.record(cue_id, outcome);
            }

            self.reporter.notify_progress(ProgressInfo::new(
                report.processed(),
                report.failed(),
                report.total,
                Some(format!("group {}/{}", index + 1, group_count)),
            ));

            if dispatched.len() < group.len() {
                let start = index * group_size + dispatched.len();
                return self.cancelled(session, &targets[start..], report);
            }

            if index + 1 < group_count {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.group_delay()) => {}
                }
            }
        }

        if !report.failures.is_empty() {
            log::warn!(
                "Batch load finished with {} failures out of {} cues",
                report.failed(),
                report.total
            );
        } else {
            log::info!("Batch load finished: {} cues loaded", report.loaded);
        }

        Ok(report)
    }

    /// Завершить пакет с отменой
    ///
    /// Сам пакет не помечает субтитры до отправки, но принудительный пакет
    /// берет и те, что остались в `Loading` без выполняющейся загрузки; такие
    /// неотправленные субтитры возвращаются в `Unloaded`.
    fn cancelled(
        &self,
        session: &Session,
        pending: &[String],
        report: BatchReport,
    ) -> Result<BatchReport> {
        let mut state = session.lock();
        let generation = state.generation();
        for cue_id in pending {
            let in_flight = self.loader.is_in_flight(generation, cue_id);
            if let Some(cue) = state.cue_mut(cue_id) {
                if cue.audio_status == AudioStatus::Loading && !in_flight {
                    cue.reset_audio();
                }
            }
        }

        log::info!(
            "Batch load cancelled after {} of {} cues ({} not dispatched)",
            report.processed(),
            report.total,
            pending.len()
        );
        Err(VoiceoverError::Cancelled)
    }
}
