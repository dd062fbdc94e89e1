//! 播放器抽象

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::{DecoderPlayer, OutputSink, PlayerConfig, PlayerEvent};

/// 播放器实例标识，进程内唯一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(u64);

impl PlayerId {
    /// 分配一个新的标识
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 播放器事件的接收方
///
/// 回调在播放器自己的线程上执行。实现方不得在回调里销毁发出事件的播放器，
/// 否则 Drop 会等待当前线程退出而死锁。
pub trait PlayerObserver: Send + Sync {
    fn on_player_event(&self, event: PlayerEvent);
}

/// 单曲播放会话
///
/// 控制方法只投递命令，不会在调用线程上同步回调观察者。
/// Drop 必须在返回前让后台线程完全停止。
pub trait Player: Send {
    /// 音源地址
    fn url(&self) -> &str;

    /// 安装观察者，之后的生命周期事件都会送达它
    fn subscribe(&mut self, observer: Arc<dyn PlayerObserver>);

    fn play(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    fn stop(&mut self);

    /// 当前播放位置（秒）
    fn position(&self) -> f64;

    fn set_position(&mut self, seconds: f64);

    /// 设置音量 (0.0 - 1.0)
    fn set_volume(&mut self, volume: f64);
}

/// 创建播放器
pub trait PlayerFactory: Send + Sync {
    fn create(&self, url: &str, volume: f64, output: &Arc<OutputSink>) -> Box<dyn Player>;
}

/// 创建 [`DecoderPlayer`] 的工厂
#[derive(Debug, Clone, Default)]
pub struct DecoderPlayerFactory {
    config: PlayerConfig,
}

impl DecoderPlayerFactory {
    pub fn new(config: PlayerConfig) -> Self {
        Self { config }
    }
}

impl PlayerFactory for DecoderPlayerFactory {
    fn create(&self, url: &str, volume: f64, output: &Arc<OutputSink>) -> Box<dyn Player> {
        Box::new(DecoderPlayer::open(
            url,
            volume,
            Arc::clone(output),
            self.config.clone(),
        ))
    }
}
