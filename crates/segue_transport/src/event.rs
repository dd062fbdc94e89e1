//! 播放状态和对外通知

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// 流事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventKind {
    /// 播放器已进入活动列表并收到 `play()`
    Scheduled,
    Playing,
    AlmostDone,
    Finished,
    Stopped,
    Error,
}

/// Transport 对外发出的通知
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    PlaybackStateChanged(PlaybackState),
    Stream { kind: StreamEventKind, url: String },
    VolumeChanged(f64),
    PositionChanged(f64),
}

impl TransportEvent {
    pub(crate) fn stream(kind: StreamEventKind, url: &str) -> Self {
        TransportEvent::Stream {
            kind,
            url: url.to_string(),
        }
    }
}
