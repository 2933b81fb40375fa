//! Разбор голосовой конфигурации
//!
//! Конфигурация: текстовый файл со списком опорных записей, по одной на строку,
//! в формате `voice-{название}-{текст подсказки}.wav`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::VoiceParams;

const VOICE_FILE_EXTENSION: &str = ".wav";

/// Запись голосовой конфигурации
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceEntry {
    /// Имя файла опорной записи
    pub file_name: String,
    /// Название голоса (между первым и вторым `-`)
    pub label: String,
    /// Текст опорной записи (после второго `-`, без расширения)
    pub prompt_text: Option<String>,
}

impl VoiceEntry {
    /// Разобрать имя файла; `None`, если в имени нет названия голоса
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let file_name = file_name.trim();
        if !file_name.ends_with(VOICE_FILE_EXTENSION) {
            return None;
        }

        let stem = &file_name[..file_name.len() - VOICE_FILE_EXTENSION.len()];
        let mut parts = stem.splitn(3, '-');
        let _prefix = parts.next()?;
        let label = parts.next()?.to_string();
        let prompt_text = parts.next().map(str::to_string);

        Some(Self {
            file_name: file_name.to_string(),
            label,
            prompt_text,
        })
    }

    /// Можно ли использовать запись для синтеза
    pub fn is_selectable(&self) -> bool {
        self.prompt_text.is_some()
    }

    /// Параметры запроса для выбранного голоса
    ///
    /// Путь к опорной записи строится относительно `voice_dir`.
    pub fn voice_params(&self, voice_dir: Option<&Path>) -> Option<VoiceParams> {
        let prompt_text = self.prompt_text.clone()?;
        let ref_audio_path = match voice_dir {
            Some(dir) => dir.join(&self.file_name).to_string_lossy().to_string(),
            None => self.file_name.clone(),
        };

        Some(VoiceParams {
            ref_audio_path: Some(ref_audio_path),
            prompt_text: Some(prompt_text),
            prompt_lang: None,
        })
    }
}

/// Разобрать содержимое файла голосовой конфигурации
///
/// Пустые строки и файлы без расширения `.wav` пропускаются.
pub fn parse_voice_config(content: &str) -> Vec<VoiceEntry> {
    content
        .lines()
        .filter_map(VoiceEntry::from_file_name)
        .collect()
}
