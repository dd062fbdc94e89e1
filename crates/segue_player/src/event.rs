//! 播放器命令和事件定义

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::PlayerObserver;

/// 播放器生命周期事件（播放器 -> 观察者）
///
/// 同一个播放器的事件顺序固定：`Started`，至多一次 `AlmostEnded`，
/// 然后恰好一个终止事件（`Finished` / `Stopped` / `Error`）。
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// 开始出声
    Started,
    /// 即将播完，适合准备下一首
    AlmostEnded,
    /// 正常播放到结尾
    Finished,
    /// 被 `stop()` 中止
    Stopped,
    /// 打开或解码失败
    Error(String),
}

impl PlayerEvent {
    /// 是否为终止事件
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlayerEvent::Finished | PlayerEvent::Stopped | PlayerEvent::Error(_)
        )
    }
}

/// 播放线程命令（句柄 -> 播放线程）
pub(crate) enum PlayerCommand {
    /// 安装观察者
    Subscribe(Arc<dyn PlayerObserver>),
    Play,
    Pause,
    Resume,
    Stop,
    /// 跳转到指定位置
    Seek(Duration),
    /// 设置音量 (0.0 - 1.0)
    SetVolume(f32),
    /// 退出播放线程
    Shutdown,
}

impl fmt::Debug for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerCommand::Subscribe(_) => f.write_str("Subscribe"),
            PlayerCommand::Play => f.write_str("Play"),
            PlayerCommand::Pause => f.write_str("Pause"),
            PlayerCommand::Resume => f.write_str("Resume"),
            PlayerCommand::Stop => f.write_str("Stop"),
            PlayerCommand::Seek(pos) => f.debug_tuple("Seek").field(pos).finish(),
            PlayerCommand::SetVolume(v) => f.debug_tuple("SetVolume").field(v).finish(),
            PlayerCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}
