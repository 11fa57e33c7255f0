//! 黑白棋共享协议库
//!
//! 包含:
//! - 位棋盘表示与走法生成（支持任意偶数边长）
//! - SFEN 局面编码
//! - 着手记法解析
//! - 报文类型定义（按行分隔的 JSON）
//! - 行分帧传输（带读取截止时间）

mod board;
mod constants;
mod error;
mod message;
mod moves;
mod sfen;
mod transport;

pub use board::{Board, Side};
pub use constants::*;
pub use error::{ProtocolError, Result, ReversiError};
pub use message::{GameMessage, IsReadyMessage, LoginMessage, LogoutMessage, UserMessage};
pub use moves::{parse_move, position_to_string, Position, PASS};
pub use sfen::Sfen;
pub use transport::{Connection, LineReader, LineWriter};
