//! 协议常量定义

use std::time::Duration;

/// 默认监听地址
pub const DEFAULT_ADDR: &str = ":19714";

/// 默认棋盘边长
pub const DEFAULT_BOARDLEN: usize = 8;

/// 默认单手超时（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// 初始等级分
pub const DEFAULT_RATING: f64 = 1500.0;

/// 行读取缓冲区初始大小
pub const READ_BUF_SIZE: usize = 8192;

/// 建立连接超时
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 登录报文读取超时
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// READY 握手读取超时
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// 配对扫描间隔
pub const PAIRING_INTERVAL: Duration = Duration::from_secs(2);

/// 状态统计日志频率（按配对扫描轮数计）
pub const CENSUS_EVERY_TICKS: u32 = 10;

/// 对局记录批量落盘间隔
pub const DRAIN_INTERVAL: Duration = Duration::from_secs(10);
