//! Модель субтитра с состоянием загрузки аудио

use serde::{Deserialize, Serialize};

use crate::media::audio::AudioClip;

/// Минимальная длительность окна субтитра для расчета скорости, в секундах
pub const MIN_CUE_WINDOW: f64 = 0.01;

/// Состояние аудио субтитра
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioStatus {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

impl AudioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        }
    }
}

impl Default for AudioStatus {
    fn default() -> Self {
        Self::Unloaded
    }
}

/// Структура для хранения субтитра
#[derive(Debug, Clone)]
pub struct Cue {
    /// Порядковый номер субтитра ("1", "2", ...)
    pub id: String,
    /// Текст субтитра (может быть многострочным)
    pub text: String,
    /// Время начала, секунды
    pub start_time: f64,
    /// Время окончания, секунды
    pub end_time: f64,
    /// Состояние загрузки аудио
    pub audio_status: AudioStatus,
    /// Аудио, присутствует только в состоянии `Loaded`
    pub audio: Option<AudioClip>,
    /// Реальная длительность аудио, секунды
    pub audio_duration: Option<f64>,
    /// Скорость видео, при которой реплика укладывается в окно субтитра
    pub playback_rate: Option<f64>,
}

impl Cue {
    /// Создать новый субтитр без аудио
    pub fn new(id: impl Into<String>, start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            start_time,
            end_time,
            audio_status: AudioStatus::Unloaded,
            audio: None,
            audio_duration: None,
            playback_rate: None,
        }
    }

    /// Содержит ли окно субтитра указанный момент времени
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time <= self.end_time
    }

    pub fn is_loaded(&self) -> bool {
        self.audio_status == AudioStatus::Loaded
    }

    /// Сбросить аудио и вернуть субтитр в состояние `Unloaded`
    pub fn reset_audio(&mut self) {
        self.audio_status = AudioStatus::Unloaded;
        self.audio = None;
        self.audio_duration = None;
        self.playback_rate = None;
    }

    /// Перевести субтитр в состояние загрузки
    pub fn mark_loading(&mut self) {
        self.reset_audio();
        self.audio_status = AudioStatus::Loading;
    }

    /// Сохранить загруженное аудио. Без длительности скорость не вычисляется.
    pub fn mark_loaded(&mut self, clip: AudioClip, duration: Option<f64>) {
        self.audio_status = AudioStatus::Loaded;
        self.audio = Some(clip);
        self.audio_duration = duration;
        self.playback_rate =
            duration.and_then(|d| compute_playback_rate(self.start_time, self.end_time, d));
    }

    pub fn mark_failed(&mut self) {
        self.reset_audio();
        self.audio_status = AudioStatus::Failed;
    }
}

/// Расчет скорости видео: окно субтитра / длительность аудио
///
/// Окно ограничено снизу `MIN_CUE_WINDOW`; для нулевой или отрицательной
/// длительности аудио скорость не определена.
pub fn compute_playback_rate(start_time: f64, end_time: f64, audio_duration: f64) -> Option<f64> {
    if !(audio_duration > 0.0) || !audio_duration.is_finite() {
        return None;
    }
    let window = (end_time - start_time).max(MIN_CUE_WINDOW);
    Some(window / audio_duration)
}

/// Округление скорости до двух знаков для применения к видео
pub fn round_rate(rate: f64) -> f64 {
    (rate * 100.0).round() / 100.0
}
