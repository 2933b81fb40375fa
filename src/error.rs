//! Модуль обработки ошибок библиотеки voiceover-sync
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при работе библиотеки.

use thiserror::Error;

/// Ошибки библиотеки voiceover-sync
#[derive(Debug, Error)]
pub enum VoiceoverError {
    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка парсинга субтитров (пустой или некорректный файл)
    #[error("Subtitle parsing error: {0}")]
    Parse(String),

    /// Ошибка синтеза речи: сеть, код ответа не 2xx или некорректные данные
    #[error("Speech synthesis error: {message}{}", format_status(.status))]
    Synthesis {
        message: String,
        status: Option<u16>,
    },

    /// Аудиоданные не удалось декодировать
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Ошибка воспроизведения (статус субтитра не меняется)
    #[error("Playback error: {0}")]
    Playback(String),

    /// Пакетная загрузка остановлена пользователем
    #[error("Operation cancelled")]
    Cancelled,

    /// Ошибка хранилища кэша
    #[error("Cache error: {0}")]
    Cache(String),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Субтитр с таким идентификатором не найден
    #[error("Cue not found: {0}")]
    CueNotFound(String),

    /// Неверный формат
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl VoiceoverError {
    /// Создать ошибку синтеза без HTTP статуса
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis {
            message: message.into(),
            status: None,
        }
    }
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

/// Тип Result для библиотеки voiceover-sync
pub type Result<T> = std::result::Result<T, VoiceoverError>;
