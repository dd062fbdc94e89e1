//! segue_transport - 播放调度核心
//!
//! [`Transport`] 持有当前活动的播放器和至多一个预备播放器，
//! 在当前曲目结束时立即接上预备曲目（无缝切换），并把播放器事件
//! 转发为 [`TransportEvent`]。

mod config;
mod disposal;
mod error;
mod event;
mod hub;
#[cfg(test)]
mod mock;
mod transport;

pub use config::*;
pub use error::*;
pub use event::*;
pub use transport::*;
