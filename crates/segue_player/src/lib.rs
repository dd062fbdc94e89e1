//! segue_player - 单曲播放会话
//!
//! 定义播放器抽象（[`Player`]、[`PlayerObserver`]、[`PlayerFactory`]），
//! 以及基于 symphonia 解码、cpal 输出的默认实现 [`DecoderPlayer`]。

mod config;
mod decoder;
mod engine;
mod event;
mod output;
mod player;

pub use config::*;
pub use decoder::*;
pub use engine::*;
pub use event::*;
pub use output::*;
pub use player::*;
