//! 播放器配置

use serde::Deserialize;

/// 单个播放器的运行参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// 剩余多少秒时发出 `AlmostEnded`
    pub almost_ended_secs: f64,
    /// 输出环形缓冲区的基准大小（采样数，实际容量为 4 倍）
    pub buffer_size: usize,
    /// 位置刷新间隔（毫秒）
    pub position_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            almost_ended_secs: 2.0,
            buffer_size: 8192,
            position_interval_ms: 100,
        }
    }
}
