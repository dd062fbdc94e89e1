//! Transport 配置

use segue_player::PlayerConfig;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// 初始音量 (0.0 - 1.0)，超出范围时截断
    pub volume: f64,
    pub player: PlayerConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            player: PlayerConfig::default(),
        }
    }
}
