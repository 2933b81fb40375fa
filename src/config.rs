//! Модуль конфигурации библиотеки voiceover-sync
//!
//! Этот модуль содержит структуры для настройки синтеза речи, пакетной загрузки,
//! воспроизведения и кэша.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoiceoverError};

/// Параметры сервиса синтеза речи (GPT-SoVITS)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsConfig {
    /// Адрес эндпоинта синтеза
    pub endpoint: String,
    /// Таймаут одного запроса в секундах
    pub request_timeout_secs: u64,
    /// Таймаут установки соединения в секундах
    pub connect_timeout_secs: u64,
    /// Использовать системный прокси для запросов к сервису
    pub use_proxy: bool,
    /// Язык озвучиваемого текста
    pub text_lang: String,
    /// Путь к опорному аудио по умолчанию
    pub ref_audio_path: Option<String>,
    /// Текст опорного аудио по умолчанию
    pub prompt_text: Option<String>,
    /// Язык опорного текста
    pub prompt_lang: String,
    pub top_k: u32,
    pub top_p: f32,
    pub temperature: f32,
    /// Метод разбиения текста на стороне сервиса
    pub text_split_method: String,
    pub batch_size: u32,
    /// Множитель скорости речи
    pub speed_factor: f32,
    pub streaming_mode: bool,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9880/tts".to_string(),
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            use_proxy: false,
            text_lang: "zh".to_string(),
            ref_audio_path: None,
            prompt_text: None,
            prompt_lang: "zh".to_string(),
            top_k: 5,
            top_p: 1.0,
            temperature: 1.0,
            text_split_method: "cut0".to_string(),
            batch_size: 1,
            speed_factor: 1.0,
            streaming_mode: true,
        }
    }
}

impl TtsConfig {
    /// Таймаут запроса
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Таймаут соединения
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Параметры пакетной загрузки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Количество одновременных запросов в группе
    pub group_size: usize,
    /// Пауза между группами в миллисекундах
    pub group_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: 5,
            group_delay_ms: 200,
        }
    }
}

impl BatchConfig {
    pub fn group_delay(&self) -> Duration {
        Duration::from_millis(self.group_delay_ms)
    }
}

/// Параметры синхронизации воспроизведения
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Сколько субтитров до и после активного подгружать заранее
    pub preload_radius: usize,
    /// Длительность имитации воспроизведения при выключенном звуке, мс
    pub muted_clip_duration_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            preload_radius: 2,
            muted_clip_duration_ms: 500,
        }
    }
}

impl PlaybackConfig {
    pub fn muted_clip_duration(&self) -> Duration {
        Duration::from_millis(self.muted_clip_duration_ms)
    }
}

/// Параметры кэша аудио
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Директория для кэша
    pub cache_dir: Option<String>,
    /// Максимальный размер кэша в байтах
    pub max_cache_size: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            max_cache_size: Some(512 * 1024 * 1024), // 512 MB
        }
    }
}

/// Параметры обработки субтитров
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubtitleConfig {
    /// Объединять короткие реплики с соседними
    pub merge_short_cues: bool,
    /// Минимальное количество иероглифов в реплике
    pub min_cjk_chars: usize,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            merge_short_cues: false,
            min_cjk_chars: 8,
        }
    }
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub tts: TtsConfig,
    pub batch: BatchConfig,
    pub playback: PlaybackConfig,
    pub cache: CacheConfig,
    pub subtitles: SubtitleConfig,
    /// Директория с опорными голосами (файлы из голосовой конфигурации)
    pub voice_dir: Option<PathBuf>,
}

impl SyncConfig {
    /// Загрузить конфигурацию из JSON файла
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            VoiceoverError::Configuration(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Проверить значения конфигурации
    pub fn validate(&self) -> Result<()> {
        if self.tts.endpoint.trim().is_empty() {
            return Err(VoiceoverError::Configuration(
                "TTS endpoint must not be empty".to_string(),
            ));
        }
        if self.batch.group_size == 0 {
            return Err(VoiceoverError::Configuration(
                "Batch group size must be at least 1".to_string(),
            ));
        }
        if self.tts.request_timeout_secs == 0 {
            return Err(VoiceoverError::Configuration(
                "TTS request timeout must be positive".to_string(),
            ));
        }
        if self.subtitles.merge_short_cues && self.subtitles.min_cjk_chars == 0 {
            return Err(VoiceoverError::Configuration(
                "min_cjk_chars must be positive when merging short cues".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_contract() {
        let config = SyncConfig::default();
        assert_eq!(config.tts.text_lang, "zh");
        assert_eq!(config.tts.top_k, 5);
        assert_eq!(config.tts.top_p, 1.0);
        assert_eq!(config.tts.temperature, 1.0);
        assert_eq!(config.tts.speed_factor, 1.0);
        assert!(config.tts.streaming_mode);
        assert_eq!(config.batch.group_size, 5);
        assert_eq!(config.batch.group_delay(), Duration::from_millis(200));
        assert_eq!(config.playback.preload_radius, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "tts": { "endpoint": "http://localhost:9000/tts" }, "batch": { "group_size": 3 } }"#,
        )
        .unwrap();

        let config = SyncConfig::from_file(&path).unwrap();
        assert_eq!(config.tts.endpoint, "http://localhost:9000/tts");
        assert_eq!(config.tts.top_k, 5);
        assert_eq!(config.batch.group_size, 3);
        assert_eq!(config.batch.group_delay_ms, 200);
    }

    #[test]
    fn test_zero_group_size_rejected() {
        let mut config = SyncConfig::default();
        config.batch.group_size = 0;
        assert!(matches!(
            config.validate(),
            Err(VoiceoverError::Configuration(_))
        ));
    }
}
