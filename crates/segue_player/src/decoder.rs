//! 本地文件解码
//!
//! 使用 symphonia 探测容器格式并解码第一条音轨

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

/// 解码器错误
#[derive(thiserror::Error, Debug)]
pub enum DecoderError {
    #[error("No supported audio track found")]
    NoTrack,
    #[error("Unsupported codec")]
    UnsupportedCodec,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SymphoniaError> for DecoderError {
    fn from(e: SymphoniaError) -> Self {
        DecoderError::Decode(e.to_string())
    }
}

/// 音轨信息
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub sample_rate: u32,
    pub channels: usize,
    /// 容器没有给出总帧数时为 `None`
    pub duration: Option<Duration>,
    pub codec: String,
}

/// 把 `file://` 地址或普通路径转换成文件路径
pub fn url_to_path(url: &str) -> PathBuf {
    let trimmed = url.trim();
    let path = trimmed
        .strip_prefix("file://localhost")
        .or_else(|| trimmed.strip_prefix("file://"))
        .unwrap_or(trimmed);
    PathBuf::from(path)
}

/// 单条音轨的解码器
pub struct TrackDecoder {
    reader: Box<dyn FormatReader>,
    codec: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    scratch: Option<SampleBuffer<f32>>,
    info: TrackInfo,
}

impl TrackDecoder {
    /// 打开本地文件，扩展名作为探测提示
    pub fn open(path: &Path) -> Result<Self, DecoderError> {
        let file = File::open(path)?;
        let extension = path.extension().and_then(|ext| ext.to_str());
        Self::from_source(Box::new(file), extension)
    }

    pub fn from_source(
        source: Box<dyn MediaSource>,
        extension: Option<&str>,
    ) -> Result<Self, DecoderError> {
        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let stream = MediaSourceStream::new(source, Default::default());
        let reader = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )?
            .format;

        // 第一条可解码的音轨
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecoderError::NoTrack)?;
        let params = &track.codec_params;

        let sample_rate = params.sample_rate.unwrap_or(44100);
        let info = TrackInfo {
            sample_rate,
            channels: params.channels.map_or(2, |c| c.count()),
            duration: params.n_frames.map(|frames| {
                Duration::from_secs_f64(frames as f64 / f64::from(sample_rate.max(1)))
            }),
            codec: format!("{:?}", params.codec),
        };

        let codec = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|_| DecoderError::UnsupportedCodec)?;

        Ok(Self {
            track_id: track.id,
            time_base: params.time_base,
            reader,
            codec,
            scratch: None,
            info,
        })
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    /// 解码下一个包，按 `gain` 缩放后追加到 `out`（交错 f32）
    ///
    /// 返回 `false` 表示已到文件末尾。损坏的包被跳过。
    pub fn decode_into(&mut self, out: &mut Vec<f32>, gain: f32) -> Result<bool, DecoderError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.codec.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let frames = decoded.capacity();
            let scratch = match &mut self.scratch {
                Some(buf) if buf.capacity() >= frames * spec.channels.count() => buf,
                slot => slot.insert(SampleBuffer::new(frames as u64, spec)),
            };
            scratch.copy_interleaved_ref(decoded);

            out.extend(scratch.samples().iter().map(|sample| sample * gain));
            return Ok(true);
        }
    }

    /// 跳转到 `time`，返回实际到达的位置
    pub fn seek(&mut self, time: Duration) -> Result<Duration, DecoderError> {
        let seeked = self.reader.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: Time::from(time.as_secs_f64()),
                track_id: Some(self.track_id),
            },
        )?;
        self.codec.reset();

        let reached = self
            .time_base
            .map(|base| {
                let t = base.calc_time(seeked.actual_ts);
                Duration::from_secs(t.seconds) + Duration::from_secs_f64(t.frac)
            })
            .unwrap_or(time);
        Ok(reached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sine_wav(path: &Path, sample_rate: u32, frames: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = ((t * 440.0 * std::f32::consts::TAU).sin() * 8000.0) as i16;
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_url_to_path() {
        assert_eq!(url_to_path("/music/a.mp3"), PathBuf::from("/music/a.mp3"));
        assert_eq!(url_to_path("file:///music/a.mp3"), PathBuf::from("/music/a.mp3"));
        assert_eq!(
            url_to_path("file://localhost/music/a.mp3"),
            PathBuf::from("/music/a.mp3")
        );
        assert_eq!(url_to_path("  b.flac "), PathBuf::from("b.flac"));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = TrackDecoder::open(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(DecoderError::Io(_))));
    }

    #[test]
    fn test_decode_wav_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 44100, 22050);

        let mut decoder = TrackDecoder::open(&path).unwrap();
        assert_eq!(decoder.info().sample_rate, 44100);
        assert_eq!(decoder.info().channels, 2);
        let duration = decoder.info().duration.unwrap();
        assert!((duration.as_secs_f64() - 0.5).abs() < 0.01);

        let mut samples = Vec::new();
        while decoder.decode_into(&mut samples, 1.0).unwrap() {}
        assert_eq!(samples.len(), 22050 * 2);

        // 结束后继续解码仍然返回 false
        assert!(!decoder.decode_into(&mut samples, 1.0).unwrap());
    }

    #[test]
    fn test_seek_then_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 8000, 8000);

        let mut decoder = TrackDecoder::open(&path).unwrap();
        let reached = decoder.seek(Duration::from_millis(500)).unwrap();
        assert!((reached.as_secs_f64() - 0.5).abs() < 0.05);

        let mut samples = Vec::new();
        while decoder.decode_into(&mut samples, 1.0).unwrap() {}
        assert!(!samples.is_empty());
        assert!(samples.len() < 8000 * 2);
    }

    #[test]
    fn test_gain_scales_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 8000, 800);

        let mut full = Vec::new();
        let mut quiet = Vec::new();
        TrackDecoder::open(&path).unwrap().decode_into(&mut full, 1.0).unwrap();
        TrackDecoder::open(&path).unwrap().decode_into(&mut quiet, 0.5).unwrap();

        assert_eq!(full.len(), quiet.len());
        for (a, b) in full.iter().zip(&quiet) {
            assert!((a * 0.5 - b).abs() < 1e-6);
        }
    }
}
