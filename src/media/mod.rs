//! Модуль для работы с медиа

pub mod audio;
pub mod video;

pub use audio::{AudioClip, AudioDecoder, AudioFormat, DefaultAudioDecoder};
pub use video::{AudioSink, NoopOverlay, OverlayView, VideoSurface};
