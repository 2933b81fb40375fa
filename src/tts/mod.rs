//! Модуль для работы с TTS
//!
//! Этот модуль содержит интерфейс сервиса синтеза речи, HTTP клиент для
//! GPT-SoVITS, кэш аудио и разбор голосовой конфигурации.

pub mod cache;
pub mod gpt_sovits;
pub mod voice;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::TtsConfig;
use crate::error::Result;

pub use cache::{cache_key, page_identity_hash, AudioCacheStore, FileAudioCache, MemoryAudioCache};
pub use gpt_sovits::GptSovitsClient;
pub use voice::{parse_voice_config, VoiceEntry};

/// Параметры опорного голоса, выбранного пользователем
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    /// Путь к опорному аудио
    pub ref_audio_path: Option<String>,
    /// Текст, произнесенный в опорном аудио
    pub prompt_text: Option<String>,
    /// Язык опорного текста
    pub prompt_lang: Option<String>,
}

/// Запрос на синтез речи
///
/// Поля со значением `None` не попадают в тело запроса.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_audio_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_split_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_factor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_mode: Option<bool>,
}

impl TtsRequest {
    /// Собрать запрос из конфигурации и выбранного голоса
    ///
    /// Параметры голоса имеют приоритет над значениями по умолчанию.
    pub fn new(text: impl Into<String>, config: &TtsConfig, voice: &VoiceParams) -> Self {
        Self {
            text: text.into(),
            text_lang: Some(config.text_lang.clone()),
            ref_audio_path: voice
                .ref_audio_path
                .clone()
                .or_else(|| config.ref_audio_path.clone()),
            prompt_text: voice
                .prompt_text
                .clone()
                .or_else(|| config.prompt_text.clone()),
            prompt_lang: Some(
                voice
                    .prompt_lang
                    .clone()
                    .unwrap_or_else(|| config.prompt_lang.clone()),
            ),
            top_k: Some(config.top_k),
            top_p: Some(config.top_p),
            temperature: Some(config.temperature),
            text_split_method: Some(config.text_split_method.clone()),
            batch_size: Some(config.batch_size),
            speed_factor: Some(config.speed_factor),
            streaming_mode: Some(config.streaming_mode),
        }
    }
}

/// Сервис синтеза речи
#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Синтезировать речь; возвращает закодированное аудио (обычно WAV)
    async fn synthesize(&self, request: &TtsRequest) -> Result<Bytes>;
}
