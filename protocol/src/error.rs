//! 错误类型定义

use thiserror::Error;

/// 黑白棋规则错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReversiError {
    /// 无效的棋盘边长
    #[error("invalid board length: {0}")]
    InvalidBoardLen(usize),

    /// 着手文本为空
    #[error("empty move")]
    EmptyMove,

    /// 着手书写格式错误
    #[error("wrong format move: {0}")]
    MoveFormat(String),

    /// 非法着手
    #[error("illegal move")]
    IllegalMove,
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 编解码错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 读取超时
    #[error("read timeout")]
    Timeout,

    /// 连接超时
    #[error("connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("connection closed")]
    ConnectionClosed,

    /// 规则错误
    #[error("reversi error: {0}")]
    Reversi(#[from] ReversiError),
}

impl ProtocolError {
    /// 是否为读取超时（而非其他 IO 故障）
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProtocolError::Timeout)
    }
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
