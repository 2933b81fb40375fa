//! Модуль для парсинга субтитров
//!
//! Этот модуль содержит функции для парсинга SRT файлов.

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, VoiceoverError};
use crate::subtitle::cue::Cue;

lazy_static! {
    static ref INDEX_RE: Regex = Regex::new(r"^\d+$").unwrap();
    static ref TIMECODE_RE: Regex =
        Regex::new(r"^(\d{2}:\d{2}:\d{2},\d{3})\s*-->\s*(\d{2}:\d{2}:\d{2},\d{3})").unwrap();
    static ref TIME_RE: Regex = Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3})$").unwrap();
}

/// Состояние разбора блока
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    ExpectIndex,
    ExpectTimecode,
    ExpectText,
}

/// Черновик субтитра до фиксации
struct PendingCue {
    start_time: f64,
    end_time: f64,
    text: String,
}

impl PendingCue {
    fn into_cue(self) -> Cue {
        // Идентификатор назначается при перенумерации
        Cue::new(String::new(), self.start_time, self.end_time, self.text)
    }
}

fn has_text(pending: &Option<PendingCue>) -> bool {
    pending.as_ref().is_some_and(|c| !c.text.is_empty())
}

/// Парсинг SRT файла
pub fn parse_srt_file<P: AsRef<Path>>(path: P) -> Result<Vec<Cue>> {
    let content = std::fs::read_to_string(&path).map_err(|e| {
        VoiceoverError::Parse(format!(
            "Failed to read subtitle file {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    parse_srt(&content)
}

/// Парсинг содержимого SRT
///
/// Возвращает ошибку, если не найдено ни одного корректного блока.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>> {
    let mut cues = Vec::new();
    let mut state = ParseState::ExpectIndex;
    let mut current: Option<PendingCue> = None;

    // `lines()` понимает и LF, и CRLF
    for raw_line in content.lines() {
        let line = raw_line.trim();

        if line.is_empty() {
            if state == ParseState::ExpectText && has_text(&current) {
                if let Some(pending) = current.take() {
                    cues.push(pending.into_cue());
                }
                state = ParseState::ExpectIndex;
            }
            continue;
        }

        match state {
            ParseState::ExpectIndex => {
                if INDEX_RE.is_match(line) {
                    current = Some(PendingCue {
                        start_time: 0.0,
                        end_time: 0.0,
                        text: String::new(),
                    });
                    state = ParseState::ExpectTimecode;
                }
            }
            ParseState::ExpectTimecode => {
                let times = TIMECODE_RE
                    .captures(line)
                    .and_then(|caps| Some((parse_time(&caps[1])?, parse_time(&caps[2])?)));
                match (times, current.as_mut()) {
                    (Some((start, end)), Some(pending)) => {
                        pending.start_time = start;
                        pending.end_time = end;
                        state = ParseState::ExpectText;
                    }
                    _ => {
                        log::debug!("Dropping cue with malformed timecode: {}", line);
                        current = None;
                        state = ParseState::ExpectIndex;
                    }
                }
            }
            ParseState::ExpectText => {
                if let Some(pending) = current.as_mut() {
                    if !pending.text.is_empty() {
                        pending.text.push('\n');
                    }
                    pending.text.push_str(line);
                }
            }
        }
    }

    // Файл может заканчиваться без пустой строки
    if state == ParseState::ExpectText && has_text(&current) {
        if let Some(pending) = current.take() {
            cues.push(pending.into_cue());
        }
    }

    if cues.is_empty() {
        return Err(VoiceoverError::Parse(
            "No valid subtitle blocks found".to_string(),
        ));
    }

    renumber(&mut cues);
    log::debug!("Parsed {} subtitle cues", cues.len());
    Ok(cues)
}

/// Перенумеровать субтитры по порядку: "1", "2", ...
pub fn renumber(cues: &mut [Cue]) {
    for (idx, cue) in cues.iter_mut().enumerate() {
        cue.id = (idx + 1).to_string();
    }
}

/// Парсинг строки времени в формате HH:MM:SS,mmm
pub fn parse_time(time_str: &str) -> Option<f64> {
    let caps = TIME_RE.captures(time_str.trim())?;
    let hours: u64 = caps[1].parse().ok()?;
    let minutes: u64 = caps[2].parse().ok()?;
    let seconds: u64 = caps[3].parse().ok()?;
    let millis: u64 = caps[4].parse().ok()?;

    Some((hours * 3600 + minutes * 60 + seconds) as f64 + millis as f64 / 1000.0)
}
