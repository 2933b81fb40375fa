//! Интерфейсы страницы: видеоэлемент, оверлей с текстом и вывод звука
//!
//! Реализации живут на стороне встраивания (расширение браузера, плеер);
//! библиотека управляет ими только через эти трейты.

use async_trait::async_trait;

use crate::error::Result;
use crate::media::audio::AudioClip;

/// Видеоэлемент страницы
///
/// `play` и `pause` могут вызываться под блокировкой сессии, поэтому
/// реализация не должна обращаться к синхронизатору.
pub trait VideoSurface: Send + Sync {
    /// Текущая позиция воспроизведения, секунды
    fn current_time(&self) -> f64;

    fn is_paused(&self) -> bool;

    fn play(&self);

    fn pause(&self);

    /// Перейти к указанной позиции, секунды
    fn seek(&self, time: f64);

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&self, rate: f64);
}

/// Оверлей с текущим субтитром и списком реплик
pub trait OverlayView: Send + Sync {
    /// Показать текст активного субтитра (пустая строка очищает)
    fn show_text(&self, text: &str);

    /// Подсветить субтитр, который сейчас озвучивается
    fn highlight(&self, cue_id: Option<&str>);
}

/// Оверлей, который ничего не отображает
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOverlay;

impl OverlayView for NoopOverlay {
    fn show_text(&self, _text: &str) {}

    fn highlight(&self, _cue_id: Option<&str>) {}
}

/// Вывод звука
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Воспроизвести клип; future завершается, когда звук доиграл
    ///
    /// Если future отброшен до завершения, вывод должен остановиться.
    async fn play(&self, clip: &AudioClip) -> Result<()>;
}
