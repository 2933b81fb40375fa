//! Состояние сессии просмотра одного видео

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::subtitle::{AudioStatus, Cue};

/// Режимы, переключаемые пользователем
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modes {
    /// Принудительно пересинтезировать аудио в обход кэша
    pub reload: bool,
    /// Режим обучения: видео стоит, пока звучит реплика
    pub learn: bool,
    /// Озвучка без звука
    pub muted: bool,
}

/// Состояние сессии
#[derive(Debug, Default)]
pub struct SessionState {
    pub cues: Vec<Cue>,
    /// Субтитр, реплика которого уже запущена в текущем окне
    pub last_played_cue_id: Option<String>,
    /// Субтитр, ради загрузки которого видео поставлено на паузу
    pub paused_for_cue_id: Option<String>,
    pub modes: Modes,
    generation: u64,
}

impl SessionState {
    /// Номер поколения набора субтитров
    ///
    /// Увеличивается при каждой замене или сбросе набора; результаты загрузок,
    /// начатых в прошлом поколении, отбрасываются.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cue(&self, cue_id: &str) -> Option<&Cue> {
        self.cues.iter().find(|cue| cue.id == cue_id)
    }

    pub fn cue_mut(&mut self, cue_id: &str) -> Option<&mut Cue> {
        self.cues.iter_mut().find(|cue| cue.id == cue_id)
    }

    /// Индекс первого субтитра, окно которого содержит момент времени
    pub fn active_cue_index(&self, time: f64) -> Option<usize> {
        self.cues.iter().position(|cue| cue.contains(time))
    }

    /// Заменить набор субтитров; режимы сохраняются
    pub fn replace_cues(&mut self, cues: Vec<Cue>) {
        self.cues = cues;
        self.clear_tracking();
        self.generation += 1;
    }

    /// Сбросить аудио всех субтитров в `Unloaded`
    pub fn reset_all_audio(&mut self) {
        for cue in &mut self.cues {
            cue.reset_audio();
        }
        self.generation += 1;
    }

    pub fn clear_tracking(&mut self) {
        self.last_played_cue_id = None;
        self.paused_for_cue_id = None;
    }

    /// Количество субтитров в каждом состоянии
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for cue in &self.cues {
            match cue.audio_status {
                AudioStatus::Unloaded => counts.unloaded += 1,
                AudioStatus::Loading => counts.loading += 1,
                AudioStatus::Loaded => counts.loaded += 1,
                AudioStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub unloaded: usize,
    pub loading: usize,
    pub loaded: usize,
    pub failed: usize,
}

/// Общий доступ к состоянию сессии
///
/// Блокировка не должна удерживаться через `.await`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cues(cues: Vec<Cue>) -> Self {
        let session = Self::new();
        session.lock().replace_cues(cues);
        session
    }

    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    pub fn modes(&self) -> Modes {
        self.lock().modes
    }

    /// Состояние аудио субтитра
    pub fn status_of(&self, cue_id: &str) -> Option<AudioStatus> {
        self.lock().cue(cue_id).map(|cue| cue.audio_status)
    }

    /// Копия субтитра
    pub fn cue(&self, cue_id: &str) -> Option<Cue> {
        self.lock().cue(cue_id).cloned()
    }

    pub fn cue_ids(&self) -> Vec<String> {
        self.lock().cues.iter().map(|cue| cue.id.clone()).collect()
    }
}
