//! Сохраняемые настройки пользователя
//!
//! Выбранный голос, список голосовых файлов, режим без звука, положение
//! плавающей кнопки и язык интерфейса хранятся в одном JSON файле.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tts::VoiceParams;

/// Выбранный пользователем голос
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedVoice {
    /// Имя файла опорной записи
    pub file: String,
    /// Параметры запроса для этого голоса
    pub params: VoiceParams,
}

/// Положение плавающей кнопки на странице, в пикселях
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ButtonPosition {
    pub left: f64,
    pub top: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSettings {
    pub selected_voice: Option<SelectedVoice>,
    /// Строки последней загруженной голосовой конфигурации
    pub voice_files: Vec<String>,
    pub muted: bool,
    pub floating_button_position: Option<ButtonPosition>,
    /// Язык интерфейса
    pub language: String,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            selected_voice: None,
            voice_files: Vec::new(),
            muted: false,
            floating_button_position: None,
            language: "zh".to_string(),
        }
    }
}

/// Файл настроек
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Прочитать настройки; отсутствующий файл дает значения по умолчанию
    pub async fn load(&self) -> Result<PersistedSettings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!(
                    "Settings file {} not found, using defaults",
                    self.path.display()
                );
                Ok(PersistedSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, settings: &PersistedSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Прочитать, изменить и сохранить настройки
    pub async fn update<F>(&self, change: F) -> Result<PersistedSettings>
    where
        F: FnOnce(&mut PersistedSettings),
    {
        let mut settings = self.load().await?;
        change(&mut settings);
        self.save(&settings).await?;
        Ok(settings)
    }
}
