//! 错误类型

/// 创建 [`crate::Transport`] 失败
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Failed to spawn disposal worker: {0}")]
    Spawn(#[from] std::io::Error),
}
