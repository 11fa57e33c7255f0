//! 黑白棋对战服务端
//!
//! 包含:
//! - 大厅与会话状态机
//! - 登录受理与就绪握手
//! - 配对调度
//! - 对局仲裁与等级分结算
//! - 对局记录入库

pub mod game;
pub mod lobby;
pub mod server;
pub mod session;
pub mod storage;

pub use game::GameStateCode;
pub use lobby::Lobby;
pub use server::{serve, ServerConfig};
pub use session::{Session, SessionState, UserStatistics};
pub use storage::{run_drainer, GameSink, GameStore};
