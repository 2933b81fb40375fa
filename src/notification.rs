//! Модуль для реализации системы уведомлений
//!
//! Этот модуль предоставляет наблюдателей прогресса пакетной загрузки и
//! уведомления об изменении состояния аудио отдельных субтитров.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::progress::{ProgressInfo, ProgressObserver};
use crate::subtitle::AudioStatus;

/// Наблюдатель, выводящий информацию о прогрессе в лог
pub struct LogProgressObserver {
    /// Префикс для вывода (опционально)
    prefix: Option<String>,
}

impl LogProgressObserver {
    /// Создать новый экземпляр LogProgressObserver
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Создать новый экземпляр LogProgressObserver с префиксом
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl Default for LogProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        let details = progress.details.as_deref().unwrap_or("");

        log::info!(
            "{}Batch progress: {}/{} ({:.1}%), failed: {}{}",
            prefix,
            progress.completed,
            progress.total,
            progress.percent,
            progress.failed,
            if details.is_empty() {
                String::new()
            } else {
                format!(", {}", details)
            }
        );
    }
}

/// Наблюдатель, сохраняющий информацию о прогрессе в памяти
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    /// История обновлений прогресса
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    /// Создать новый экземпляр MemoryProgressObserver
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить историю обновлений прогресса
    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    /// Очистить историю обновлений прогресса
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}

/// Наблюдатель, отправляющий информацию о прогрессе через канал
pub struct ChannelProgressObserver {
    /// Отправитель для канала
    sender: mpsc::Sender<ProgressInfo>,
}

impl ChannelProgressObserver {
    /// Создать новый экземпляр ChannelProgressObserver
    pub fn new(sender: mpsc::Sender<ProgressInfo>) -> Self {
        Self { sender }
    }
}

impl ProgressObserver for ChannelProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        // Не блокируемся: при переполненном канале обновление теряется
        if let Err(e) = self.sender.try_send(progress) {
            log::warn!("Failed to send progress update: {}", e);
        }
    }
}

/// Событие изменения состояния аудио субтитра
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueStatusEvent {
    pub cue_id: String,
    pub status: AudioStatus,
}

/// Наблюдатель за состоянием аудио субтитров (например, значки в списке реплик)
pub trait CueStatusObserver: Send + Sync {
    fn on_status_change(&self, cue_id: &str, status: AudioStatus);
}

/// Реестр наблюдателей за состоянием субтитров
#[derive(Default)]
pub struct CueStatusNotifier {
    observers: RwLock<HashMap<usize, Arc<dyn CueStatusObserver>>>,
    next_id: AtomicUsize,
}

impl CueStatusNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить наблюдателя, возвращает его идентификатор
    pub fn add_observer(&self, observer: Arc<dyn CueStatusObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    pub fn remove_observer(&self, id: usize) -> Option<Arc<dyn CueStatusObserver>> {
        self.observers.write().remove(&id)
    }

    /// Уведомить всех наблюдателей
    ///
    /// Список копируется до вызова, чтобы наблюдатель мог обращаться к реестру.
    pub fn notify(&self, cue_id: &str, status: AudioStatus) {
        let observers: Vec<Arc<dyn CueStatusObserver>> =
            self.observers.read().values().cloned().collect();
        for observer in observers {
            observer.on_status_change(cue_id, status);
        }
    }
}

/// Наблюдатель, пересылающий события состояния в канал
pub struct ChannelStatusObserver {
    sender: mpsc::UnboundedSender<CueStatusEvent>,
}

impl ChannelStatusObserver {
    /// Создать наблюдателя и приемник событий
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CueStatusEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl CueStatusObserver for ChannelStatusObserver {
    fn on_status_change(&self, cue_id: &str, status: AudioStatus) {
        let _ = self.sender.send(CueStatusEvent {
            cue_id: cue_id.to_string(),
            status,
        });
    }
}
