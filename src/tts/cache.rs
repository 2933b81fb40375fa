//! Модуль для кэширования результатов TTS
//!
//! Аудио хранится по ключу `audio_{хеш страницы}_{номер субтитра}`, поэтому
//! повторное открытие той же страницы с тем же файлом субтитров не требует
//! повторного синтеза.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::config::CacheConfig;
use crate::error::{Result, VoiceoverError};

/// Префикс всех ключей аудио
pub const AUDIO_KEY_PREFIX: &str = "audio_";

/// 32-битный хеш адреса страницы
///
/// Классический `h = h * 31 + c` по UTF-16 единицам с переполнением `i32`,
/// затем модуль. Не криптографический: коллизии между страницами возможны.
pub fn page_identity_hash(url: &str) -> u32 {
    let hash = url
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(unit as i32)
        });
    hash.unsigned_abs()
}

/// Ключ кэша для субтитра на странице
pub fn cache_key(page_hash: u32, cue_id: &str) -> String {
    format!("{}{}_{}", AUDIO_KEY_PREFIX, page_hash, cue_id)
}

/// Хранилище закодированного аудио
#[async_trait]
pub trait AudioCacheStore: Send + Sync {
    /// Получить аудио по ключу
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Сохранить аудио
    async fn set(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Удалить несколько ключей; отсутствующие ключи игнорируются
    async fn remove_many(&self, keys: &[String]) -> Result<()>;

    /// Все ключи хранилища
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Кэш в памяти
#[derive(Debug, Default)]
pub struct MemoryAudioCache {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryAudioCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl AudioCacheStore for MemoryAudioCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, data: &[u8]) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

/// Кэш в директории: один файл на ключ
pub struct FileAudioCache {
    /// Директория для кэша
    cache_dir: PathBuf,
    /// Максимальный размер кэша в байтах
    max_size: Option<u64>,
}

impl FileAudioCache {
    /// Создать новый экземпляр FileAudioCache
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let cache_dir = if let Some(dir) = &config.cache_dir {
            PathBuf::from(dir)
        } else {
            std::env::temp_dir().join("voiceover-sync-cache")
        };

        // Создаем директорию для кэша, если она не существует
        if !cache_dir.exists() {
            std::fs::create_dir_all(&cache_dir)?;
        }

        Ok(Self {
            cache_dir,
            max_size: config.max_cache_size,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Путь к файлу ключа; ключ не может выходить за пределы директории
    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(VoiceoverError::Cache(format!("Invalid cache key: {}", key)));
        }
        Ok(self.cache_dir.join(format!("{}.bin", key)))
    }

    /// Проверить размер кэша и удалить самые старые файлы
    async fn check_cache_size(&self) -> Result<()> {
        let Some(max_size) = self.max_size else {
            return Ok(());
        };

        let mut total_size = 0;
        let mut files = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.cache_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                total_size += metadata.len();
                files.push((entry.path(), metadata.modified()?, metadata.len()));
            }
        }

        if total_size <= max_size {
            return Ok(());
        }

        // Сортируем файлы по времени модификации (от старых к новым)
        files.sort_by(|a, b| a.1.cmp(&b.1));
        for (path, _, len) in files {
            if total_size <= max_size {
                break;
            }
            tokio::fs::remove_file(&path).await?;
            total_size -= len;
            log::debug!("Evicted cached audio {}", path.display());
        }

        Ok(())
    }
}

#[async_trait]
impl AudioCacheStore for FileAudioCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.entry_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.entry_path(key)?;
        tokio::fs::write(&path, data).await?;
        self.check_cache_size().await
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            let path = self.entry_path(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.cache_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("bin") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}
