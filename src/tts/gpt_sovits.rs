//! Клиент локального сервиса синтеза речи GPT-SoVITS
//!
//! Текст реплики отправляется POST-запросом на `/tts`, в ответ приходит аудио.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;

use super::{TtsClient, TtsRequest};
use crate::config::TtsConfig;
use crate::error::{Result, VoiceoverError};

/// Тело ответа сервиса с ошибкой
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorPayload,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Detailed { message: String },
    Other(serde_json::Value),
}

/// HTTP клиент для `/tts` GPT-SoVITS
#[derive(Debug, Clone)]
pub struct GptSovitsClient {
    client: Client,
    endpoint: String,
}

impl GptSovitsClient {
    /// Создать клиента с адресом и таймаутами из конфигурации
    pub fn new(config: &TtsConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout());
        // Сервис обычно запущен на localhost
        if !config.use_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| {
                VoiceoverError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TtsClient for GptSovitsClient {
    async fn synthesize(&self, request: &TtsRequest) -> Result<Bytes> {
        log::debug!(
            "Sending TTS request to {} ({} chars)",
            self.endpoint,
            request.text.chars().count()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| VoiceoverError::synthesis(format!("Failed to send TTS request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = describe_error(&body)
                .unwrap_or_else(|| format!("API request failed with status {}", status));
            log::error!("TTS API error (status {}): {}", status, message);
            return Err(VoiceoverError::Synthesis {
                message,
                status: Some(status.as_u16()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceoverError::synthesis(format!("Failed to read audio response: {}", e)))?;

        if bytes.is_empty() {
            return Err(VoiceoverError::synthesis("TTS service returned an empty body"));
        }

        log::debug!("Received {} bytes of audio", bytes.len());
        Ok(bytes)
    }
}

/// Извлечь сообщение из JSON с ошибкой
fn describe_error(body: &str) -> Option<String> {
    let parsed: ErrorResponse = serde_json::from_str(body).ok()?;
    Some(match parsed.error {
        ErrorPayload::Detailed { message } => format!("API Error: {}", message),
        ErrorPayload::Other(value) => format!("API Error: {}", value),
    })
}
