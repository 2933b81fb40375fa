//! Модуль для работы с субтитрами

pub mod cue;
pub mod optimizer;
pub mod parser;

pub use cue::{compute_playback_rate, AudioStatus, Cue};
pub use parser::{parse_srt, parse_srt_file, parse_time};
