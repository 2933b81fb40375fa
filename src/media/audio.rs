//! Модуль для работы с аудио
//!
//! Этот модуль превращает байты от сервиса синтеза или из кэша в воспроизводимый
//! клип и определяет его реальную длительность.

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use uuid::Uuid;

use crate::error::{Result, VoiceoverError};

/// Размер стандартного заголовка WAV
const WAV_HEADER_LEN: usize = 44;

/// Формат аудиоданных
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    /// Любой другой контейнер, распознанный symphonia (mp3, ogg, aac)
    Compressed,
}

/// Воспроизводимый аудиоклип
///
/// Клипы сравниваются по идентификатору: два декодирования одних и тех же
/// байтов дают разные клипы.
#[derive(Debug, Clone)]
pub struct AudioClip {
    id: Uuid,
    data: Bytes,
    format: AudioFormat,
}

impl AudioClip {
    pub fn new(data: Bytes, format: AudioFormat) -> Self {
        Self {
            id: Uuid::new_v4(),
            data,
            format,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }
}

impl PartialEq for AudioClip {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AudioClip {}

/// Декодер аудио
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    /// Проверить байты и создать клип
    fn decode(&self, data: Bytes) -> Result<AudioClip>;

    /// Определить длительность клипа в секундах
    async fn probe_duration(&self, clip: &AudioClip) -> Result<f64>;
}

/// Декодер по умолчанию: WAV через hound, остальные форматы через symphonia
#[derive(Debug, Default, Clone)]
pub struct DefaultAudioDecoder;

impl DefaultAudioDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioDecoder for DefaultAudioDecoder {
    fn decode(&self, data: Bytes) -> Result<AudioClip> {
        if data.is_empty() {
            return Err(VoiceoverError::Decode("Audio payload is empty".to_string()));
        }

        if hound::WavReader::new(Cursor::new(data.as_ref())).is_ok() {
            return Ok(AudioClip::new(data, AudioFormat::Wav));
        }

        probe_container(&data)
            .map(|_| AudioClip::new(data, AudioFormat::Compressed))
            .map_err(|e| VoiceoverError::Decode(format!("Unrecognized audio payload: {}", e)))
    }

    async fn probe_duration(&self, clip: &AudioClip) -> Result<f64> {
        match clip.format() {
            AudioFormat::Wav => wav_duration(clip.data()),
            AudioFormat::Compressed => compressed_duration(clip.data()),
        }
    }
}

/// Длительность WAV
///
/// Потоковый ответ сервиса может содержать заголовок с нулевой длиной данных,
/// тогда длительность оценивается по размеру полезной нагрузки.
fn wav_duration(data: &Bytes) -> Result<f64> {
    let reader = hound::WavReader::new(Cursor::new(data.as_ref()))
        .map_err(|e| VoiceoverError::Decode(format!("Invalid WAV header: {}", e)))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(VoiceoverError::Decode("WAV sample rate is zero".to_string()));
    }

    let frames = reader.duration() as f64;
    if frames > 0.0 {
        return Ok(frames / spec.sample_rate as f64);
    }

    let frame_bytes = spec.channels as usize * (spec.bits_per_sample as usize / 8);
    if frame_bytes == 0 {
        return Err(VoiceoverError::Decode("WAV frame size is zero".to_string()));
    }
    let payload = data.len().saturating_sub(WAV_HEADER_LEN);
    Ok((payload / frame_bytes) as f64 / spec.sample_rate as f64)
}

fn compressed_duration(data: &Bytes) -> Result<f64> {
    let probed = probe_container(data)
        .map_err(|e| VoiceoverError::Decode(format!("Failed to probe audio: {}", e)))?;
    let track = probed
        .format
        .default_track()
        .ok_or_else(|| VoiceoverError::Decode("Audio has no tracks".to_string()))?;

    match (track.codec_params.n_frames, track.codec_params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => Ok(frames as f64 / rate as f64),
        _ => Err(VoiceoverError::Decode(
            "Audio duration is not available".to_string(),
        )),
    }
}

fn probe_container(
    data: &Bytes,
) -> std::result::Result<symphonia::core::probe::ProbeResult, symphonia::core::errors::Error> {
    let source = MediaSourceStream::new(
        Box::new(Cursor::new(data.to_vec())),
        MediaSourceStreamOptions::default(),
    );
    symphonia::default::get_probe().format(
        &Hint::new(),
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )
}
