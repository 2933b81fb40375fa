//! Модуль синхронизации видео и озвучки

pub mod playback;
pub mod session;
pub mod synchronizer;

pub use playback::{PlayRequest, Player};
pub use session::{Modes, Session, SessionState, StatusCounts};
pub use synchronizer::PlaybackSynchronizer;
