//! 报文类型定义
//!
//! 按行分隔的 JSON：每条记录占一行、以 `\n` 结尾，由 `Message`
//! 字段区分类型。字段名沿用历史客户端的首字母大写写法
//! （`Userid`、`Gameid`、`StartTime` 等）。所有字段带默认值，
//! 以便对缺字段的记录做宽容解码，再由上层做内容校验。

use serde::{Deserialize, Serialize};

/// 登录请求（客户端 -> 服务端）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LoginMessage {
    /// 恒为 "LOGIN"
    pub message: String,
    pub userid: String,
    pub password: String,
}

impl LoginMessage {
    pub fn new(userid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            message: "LOGIN".to_string(),
            userid: userid.into(),
            password: password.into(),
        }
    }
}

/// 客户端通用应答：READY、RESULTOK、着手（如 "f5"）或 "pass"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct UserMessage {
    pub message: String,
}

impl UserMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 就绪询问（服务端 -> 客户端）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IsReadyMessage {
    /// 恒为 "ISREADY"
    pub message: String,
}

impl IsReadyMessage {
    pub fn new() -> Self {
        Self {
            message: "ISREADY".to_string(),
        }
    }
}

impl Default for IsReadyMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// 登出通知（服务端 -> 客户端，尽力送达）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LogoutMessage {
    /// 恒为 "LOGOUT"
    pub message: String,
    pub reason: String,
}

impl LogoutMessage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            message: "LOGOUT".to_string(),
            reason: reason.into(),
        }
    }
}

/// 对局视图（服务端 -> 客户端，PLAY 与 RESULT 共用）
///
/// PLAY 的 `moves` 至多只带最近一手；RESULT 带完整着手序列并填
/// `end_time`。等级分以截断整数的字符串形式下发。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GameMessage {
    /// "PLAY" 或 "RESULT"
    pub message: String,
    pub gameid: String,
    /// Unix 秒
    pub start_time: i64,
    pub end_time: i64,
    pub black: String,
    pub black_rating: String,
    pub white: String,
    pub white_rating: String,
    /// "black" 或 "white"
    pub turn: String,
    /// SFEN 局面
    pub position: String,
    pub moves: Vec<String>,
    pub board_size: usize,
    /// 单手超时（毫秒）
    pub timeout: u64,
    pub state: String,
}
