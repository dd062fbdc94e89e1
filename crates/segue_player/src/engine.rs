//! 播放引擎
//!
//! 每个 [`DecoderPlayer`] 拥有一个后台线程：创建后立即打开文件和输出流
//! （预取），收到 `Play` 后开始解码并写入输出。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::{
    url_to_path, AudioOutput, DecoderError, OutputConfig, OutputError,
    OutputSink, Player, PlayerCommand, PlayerConfig, PlayerEvent, PlayerObserver, TrackDecoder,
};

/// 打开音源失败
#[derive(thiserror::Error, Debug)]
pub enum OpenError {
    #[error("Failed to decode: {0}")]
    Decoder(#[from] DecoderError),
    #[error("Audio output error: {0}")]
    Output(#[from] OutputError),
}

/// 基于 symphonia + cpal 的播放器
pub struct DecoderPlayer {
    url: String,
    cmd_tx: Sender<PlayerCommand>,
    position: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl DecoderPlayer {
    /// 创建播放器并立即在后台打开音源
    pub fn open(url: &str, volume: f64, output: Arc<OutputSink>, config: PlayerConfig) -> Self {
        let (cmd_tx, cmd_rx) = unbounded();
        let position = Arc::new(AtomicU64::new(0f64.to_bits()));

        // cpal 的输出流不能跨线程移动，引擎状态在播放线程内创建
        let owned_url = url.to_string();
        let thread_position = position.clone();
        let worker = thread::spawn(move || {
            let state = EngineState::new(owned_url, volume, output, config, thread_position);
            run_engine(cmd_rx, state);
        });

        Self {
            url: url.to_string(),
            cmd_tx,
            position,
            worker: Some(worker),
        }
    }

    fn send(&self, cmd: PlayerCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            log::debug!("player thread for {} already exited", self.url);
        }
    }
}

impl Player for DecoderPlayer {
    fn url(&self) -> &str {
        &self.url
    }

    fn subscribe(&mut self, observer: Arc<dyn PlayerObserver>) {
        self.send(PlayerCommand::Subscribe(observer));
    }

    fn play(&mut self) {
        self.send(PlayerCommand::Play);
    }

    fn pause(&mut self) {
        self.send(PlayerCommand::Pause);
    }

    fn resume(&mut self) {
        self.send(PlayerCommand::Resume);
    }

    fn stop(&mut self) {
        self.send(PlayerCommand::Stop);
    }

    fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    fn set_position(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        // 超出 Duration 范围的值按最大处理，引擎再截断到曲目长度
        let target = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX);
        self.send(PlayerCommand::Seek(target));
    }

    fn set_volume(&mut self, volume: f64) {
        self.send(PlayerCommand::SetVolume(volume.clamp(0.0, 1.0) as f32));
    }
}

impl Drop for DecoderPlayer {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(PlayerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("player thread for {} panicked", self.url);
            }
        }
    }
}

fn run_engine(cmd_rx: Receiver<PlayerCommand>, mut state: EngineState) {
    state.prepare();

    loop {
        // 播放时频繁唤醒以保持缓冲区充足，空闲时多等一会
        let timeout = if state.is_running() {
            Duration::from_millis(5)
        } else {
            Duration::from_millis(50)
        };

        match cmd_rx.recv_timeout(timeout) {
            Ok(cmd) => {
                if !state.handle_command(cmd) {
                    break;
                }
                // 一次处理完积压的命令
                while let Ok(cmd) = cmd_rx.try_recv() {
                    if !state.handle_command(cmd) {
                        return;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if state.is_running() {
            state.pump();
            state.update_position();
        }
    }
}

enum Phase {
    /// 已打开，等待 `Play`
    Ready,
    /// 打开失败，`Play` 时报告
    Failed(String),
    /// 已开始播放（包括暂停）
    Running,
    /// 已发出终止事件
    Done,
}

struct LoadedTrack {
    decoder: TrackDecoder,
    output: AudioOutput,
    /// 复用的解码缓冲
    chunk: Vec<f32>,
}

struct EngineState {
    url: String,
    sink: Arc<OutputSink>,
    config: PlayerConfig,
    observer: Option<Arc<dyn PlayerObserver>>,
    phase: Phase,
    track: Option<LoadedTrack>,
    volume: f32,
    paused: bool,
    draining: bool,
    almost_ended_sent: bool,
    position_base: Duration,
    position: Arc<AtomicU64>,
    last_position_update: Instant,
}

impl EngineState {
    fn new(
        url: String,
        volume: f64,
        sink: Arc<OutputSink>,
        config: PlayerConfig,
        position: Arc<AtomicU64>,
    ) -> Self {
        Self {
            url,
            sink,
            config,
            observer: None,
            phase: Phase::Ready,
            track: None,
            volume: volume.clamp(0.0, 1.0) as f32,
            paused: false,
            draining: false,
            almost_ended_sent: false,
            position_base: Duration::ZERO,
            position,
            last_position_update: Instant::now(),
        }
    }

    fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running) && !self.paused
    }

    /// 打开文件和输出流
    fn prepare(&mut self) {
        match self.open_track() {
            Ok(track) => {
                log::debug!(
                    "opened {} ({}, {} Hz, {} ch)",
                    self.url,
                    track.decoder.info().codec,
                    track.decoder.info().sample_rate,
                    track.decoder.info().channels
                );
                self.track = Some(track);
                self.phase = Phase::Ready;
            }
            Err(e) => {
                log::warn!("failed to open {}: {}", self.url, e);
                self.phase = Phase::Failed(e.to_string());
            }
        }
    }

    fn open_track(&self) -> Result<LoadedTrack, OpenError> {
        let decoder = TrackDecoder::open(&url_to_path(&self.url))?;
        let info = decoder.info();
        let output = self.sink.open(OutputConfig {
            sample_rate: info.sample_rate,
            channels: u16::try_from(info.channels).unwrap_or(u16::MAX),
            buffer_size: self.config.buffer_size,
        })?;
        Ok(LoadedTrack {
            decoder,
            output,
            chunk: Vec::with_capacity(self.config.buffer_size),
        })
    }

    fn handle_command(&mut self, cmd: PlayerCommand) -> bool {
        match cmd {
            PlayerCommand::Subscribe(observer) => self.observer = Some(observer),
            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => self.set_paused(true),
            PlayerCommand::Resume => self.set_paused(false),
            PlayerCommand::Stop => self.stop(),
            PlayerCommand::Seek(pos) => self.seek(pos),
            PlayerCommand::SetVolume(vol) => self.volume = vol.clamp(0.0, 1.0),
            PlayerCommand::Shutdown => return false,
        }
        true
    }

    fn play(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Ready => {
                if let Some(track) = &self.track {
                    track.output.set_playing(!self.paused);
                }
                self.phase = Phase::Running;
                self.emit(PlayerEvent::Started);
            }
            Phase::Failed(message) => self.emit(PlayerEvent::Error(message)),
            other => self.phase = other,
        }
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if let (Phase::Running, Some(track)) = (&self.phase, &self.track) {
            track.output.set_playing(!paused);
        }
    }

    fn stop(&mut self) {
        if matches!(self.phase, Phase::Done) {
            return;
        }
        if let Some(track) = &self.track {
            track.output.set_playing(false);
            track.output.clear();
        }
        self.phase = Phase::Done;
        self.emit(PlayerEvent::Stopped);
    }

    fn seek(&mut self, pos: Duration) {
        if matches!(self.phase, Phase::Done | Phase::Failed(_)) {
            return;
        }
        let Some(track) = &mut self.track else {
            return;
        };
        let pos = match track.decoder.info().duration {
            Some(duration) => pos.min(duration),
            None => pos,
        };
        let reached = match track.decoder.seek(pos) {
            Ok(reached) => reached,
            Err(e) => {
                log::warn!("seek in {} failed: {}", self.url, e);
                return;
            }
        };
        track.output.clear();
        track.output.reset_position();
        self.position_base = reached;
        self.draining = false;
        self.store_position(reached.as_secs_f64());
    }

    /// 在输出缓冲区有空间时解码
    fn pump(&mut self) {
        let Some(track) = &mut self.track else {
            return;
        };

        if self.draining {
            if track.output.buffered() == 0 {
                track.output.set_playing(false);
                self.phase = Phase::Done;
                self.emit(PlayerEvent::Finished);
            }
            return;
        }

        while track.output.free_capacity() >= self.config.buffer_size {
            track.chunk.clear();
            match track.decoder.decode_into(&mut track.chunk, self.volume) {
                Ok(true) => track.output.write(&track.chunk),
                Ok(false) => {
                    self.draining = true;
                    break;
                }
                Err(e) => {
                    track.output.set_playing(false);
                    self.phase = Phase::Done;
                    self.emit(PlayerEvent::Error(e.to_string()));
                    return;
                }
            }
        }

        if !self.almost_ended_sent && (self.draining || self.near_end()) {
            self.almost_ended_sent = true;
            self.emit(PlayerEvent::AlmostEnded);
        }
    }

    fn near_end(&self) -> bool {
        let Some(track) = &self.track else {
            return false;
        };
        let Some(duration) = track.decoder.info().duration else {
            return false;
        };
        let position = self.position_base.as_secs_f64() + track.output.position();
        duration.as_secs_f64() - position <= self.config.almost_ended_secs
    }

    fn update_position(&mut self) {
        let interval = Duration::from_millis(self.config.position_interval_ms);
        if self.last_position_update.elapsed() >= interval {
            if let Some(track) = &self.track {
                let pos = self.position_base.as_secs_f64() + track.output.position();
                self.store_position(pos);
            }
            self.last_position_update = Instant::now();
        }
    }

    fn store_position(&self, seconds: f64) {
        self.position.store(seconds.to_bits(), Ordering::Relaxed);
    }

    fn emit(&self, event: PlayerEvent) {
        match &self.observer {
            Some(observer) => observer.on_player_event(event),
            None => log::debug!("{:?} from {} dropped, nobody subscribed", event, self.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    struct ChannelObserver(Sender<PlayerEvent>);

    impl PlayerObserver for ChannelObserver {
        fn on_player_event(&self, event: PlayerEvent) {
            let _ = self.0.send(event);
        }
    }

    fn subscribed(player: &mut DecoderPlayer) -> Receiver<PlayerEvent> {
        let (tx, rx) = bounded(8);
        player.subscribe(Arc::new(ChannelObserver(tx)));
        rx
    }

    #[test]
    fn test_play_missing_file_reports_error() {
        let sink = Arc::new(OutputSink::null());
        let mut player =
            DecoderPlayer::open("/nonexistent/a.mp3", 1.0, sink, PlayerConfig::default());
        let events = subscribed(&mut player);

        player.play();

        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, PlayerEvent::Error(_)));
        assert_eq!(player.url(), "/nonexistent/a.mp3");
    }

    #[test]
    fn test_stop_before_play_reports_stopped_once() {
        let sink = Arc::new(OutputSink::null());
        let mut player = DecoderPlayer::open("missing.wav", 0.5, sink, PlayerConfig::default());
        let events = subscribed(&mut player);

        player.stop();
        player.stop();
        player.play();

        assert_eq!(
            events.recv_timeout(Duration::from_secs(2)).unwrap(),
            PlayerEvent::Stopped
        );
        assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_drop_joins_without_events() {
        let sink = Arc::new(OutputSink::null());
        let mut player = DecoderPlayer::open("missing.wav", 1.0, sink, PlayerConfig::default());
        let events = subscribed(&mut player);
        drop(player);

        // 线程已退出，观察者随之释放
        assert!(matches!(
            events.recv_timeout(Duration::from_millis(200)),
            Err(RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn test_huge_seek_keeps_player_alive() {
        let sink = Arc::new(OutputSink::null());
        let mut player = DecoderPlayer::open("missing.wav", 1.0, sink, PlayerConfig::default());
        let events = subscribed(&mut player);

        player.set_position(1e300);
        player.set_position(f64::MAX);
        player.stop();

        assert_eq!(
            events.recv_timeout(Duration::from_secs(2)).unwrap(),
            PlayerEvent::Stopped
        );
        assert_eq!(player.position(), 0.0);
    }

    #[test]
    fn test_position_starts_at_zero() {
        let sink = Arc::new(OutputSink::null());
        let player = DecoderPlayer::open("missing.wav", 1.0, sink, PlayerConfig::default());
        assert_eq!(player.position(), 0.0);
    }
}
