//! 音频输出
//!
//! [`OutputSink`] 是所有播放器共享的输出设备。每个播放器在上面打开自己的
//! [`AudioOutput`] 流，前一首的尾部和下一首的开头可以同时在设备上播放。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};

/// 音频输出错误
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("No output device available")]
    NoDevice,
    #[error("Device does not support {channels} ch / {sample_rate} Hz f32 output")]
    NoConfig { sample_rate: u32, channels: u16 },
    #[error("Stream error: {0}")]
    Stream(String),
}

/// 打开输出流所需的格式
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// 单次写入的采样数，队列上限为它的 4 倍
    pub buffer_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            buffer_size: 8192,
        }
    }
}

/// 共享的输出设备
pub struct OutputSink {
    device: Mutex<Option<Device>>,
    name: String,
}

impl OutputSink {
    /// 使用系统默认输出设备
    pub fn default_output() -> Self {
        match cpal::default_host().default_output_device() {
            Some(device) => {
                let name = device.name().unwrap_or_else(|_| "default".to_string());
                log::debug!("using output device {}", name);
                Self {
                    device: Mutex::new(Some(device)),
                    name,
                }
            }
            None => {
                log::warn!("no default output device, playback will fail");
                Self::null()
            }
        }
    }

    /// 没有设备的输出，在它上面打开的流都会失败
    pub fn null() -> Self {
        Self {
            device: Mutex::new(None),
            name: "null".to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_device(&self) -> bool {
        self.device().is_some()
    }

    /// 在共享设备上打开一条输出流
    pub fn open(&self, config: OutputConfig) -> Result<AudioOutput, OutputError> {
        let guard = self.device();
        let device = guard.as_ref().ok_or(OutputError::NoDevice)?;
        AudioOutput::with_device(device, config)
    }

    fn device(&self) -> MutexGuard<'_, Option<Device>> {
        self.device.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 输出回调和播放线程共享的状态
struct StreamShared {
    queue: SampleQueue,
    playing: AtomicBool,
    frames_played: AtomicU64,
    channels: usize,
}

impl StreamShared {
    /// 输出回调：暂停或数据不足时补静音
    fn fill(&self, data: &mut [f32]) {
        if !self.playing.load(Ordering::Relaxed) {
            data.fill(0.0);
            return;
        }
        let read = self.queue.pop_into(data);
        data[read..].fill(0.0);
        self.frames_played
            .fetch_add((read / self.channels) as u64, Ordering::Relaxed);
    }
}

/// 一条输出流，初始为暂停（输出静音）
pub struct AudioOutput {
    _stream: Stream,
    shared: Arc<StreamShared>,
    sample_rate: u32,
}

impl AudioOutput {
    /// 要求设备直接支持 f32 采样以及音源的声道数和采样率
    pub fn with_device(device: &Device, config: OutputConfig) -> Result<Self, OutputError> {
        let OutputConfig {
            sample_rate,
            channels,
            buffer_size,
        } = config;

        let matches = |range: &cpal::SupportedStreamConfigRange| {
            range.sample_format() == SampleFormat::F32
                && range.channels() == channels
                && (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&sample_rate)
        };
        let range = device
            .supported_output_configs()
            .map_err(|e| OutputError::Stream(e.to_string()))?
            .find(matches)
            .ok_or(OutputError::NoConfig {
                sample_rate,
                channels,
            })?;
        let stream_config: StreamConfig = range.with_sample_rate(SampleRate(sample_rate)).into();

        let shared = Arc::new(StreamShared {
            queue: SampleQueue::new(buffer_size * 4),
            playing: AtomicBool::new(false),
            frames_played: AtomicU64::new(0),
            channels: usize::from(channels.max(1)),
        });

        let callback_shared = Arc::clone(&shared);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| callback_shared.fill(data),
                |err| log::error!("audio output error: {}", err),
                None,
            )
            .map_err(|e| OutputError::Stream(e.to_string()))?;
        stream
            .play()
            .map_err(|e| OutputError::Stream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            shared,
            sample_rate,
        })
    }

    /// 追加采样，不会丢弃已排队的数据
    pub fn write(&self, samples: &[f32]) {
        self.shared.queue.push(samples);
    }

    /// 距离队列上限还能写入的采样数
    pub fn free_capacity(&self) -> usize {
        self.shared.queue.free()
    }

    /// 尚未播放的采样数
    pub fn buffered(&self) -> usize {
        self.shared.queue.len()
    }

    /// 丢弃尚未播放的采样
    pub fn clear(&self) {
        self.shared.queue.clear();
    }

    pub fn set_playing(&self, playing: bool) {
        self.shared.playing.store(playing, Ordering::Relaxed);
    }

    /// 自上次 [`reset_position`](Self::reset_position) 以来已播放的秒数
    pub fn position(&self) -> f64 {
        let frames = self.shared.frames_played.load(Ordering::Relaxed);
        frames as f64 / f64::from(self.sample_rate.max(1))
    }

    pub fn reset_position(&self) {
        self.shared.frames_played.store(0, Ordering::Relaxed);
    }
}

/// 交错采样队列
///
/// 上限只用于背压：写入方在 [`free`](Self::free) 不足时停止解码，
/// 单次写入超过上限时仍然全部接收。
struct SampleQueue {
    samples: Mutex<VecDeque<f32>>,
    limit: usize,
}

impl SampleQueue {
    fn new(limit: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(limit)),
            limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<f32>> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn free(&self) -> usize {
        self.limit.saturating_sub(self.len())
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, data: &[f32]) {
        self.lock().extend(data);
    }

    /// 取出至多 `out.len()` 个采样，返回取出的数量
    fn pop_into(&self, out: &mut [f32]) -> usize {
        let mut samples = self.lock();
        let count = out.len().min(samples.len());
        for (slot, sample) in out.iter_mut().zip(samples.drain(..count)) {
            *slot = sample;
        }
        count
    }
}
