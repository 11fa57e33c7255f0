//! 用户会话
//!
//! 会话从 LOGIN 通过到 LOGOUT 为止存在，独占其连接与读缓冲。
//! 状态迁移:
//!
//! ```text
//! LoggedIn -> AwaitReady -> Ready -> Playing -> LoggedIn
//!                 |                     |
//!                 +-----> LoggedOut <---+（超时/非法报文/断线）
//! ```
//!
//! 状态与统计放在会话自身的互斥锁后面，由配对调度、就绪握手与
//! 对局仲裁分别从各自任务里读写；连接放在异步互斥锁后面，同一
//! 时刻至多一个任务（握手或仲裁）与客户端对话。

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use protocol::{Connection, DEFAULT_RATING};

/// 会话状态机
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// 已登出
    LoggedOut,
    /// 已登录，等待配对扫描
    LoggedIn,
    /// 已发送 ISREADY，等待应答
    AwaitReady,
    /// 就绪，可被配对
    Ready,
    /// 对局中
    Playing { gameid: String },
}

/// 对局统计
#[derive(Debug, Clone)]
pub struct UserStatistics {
    /// 等级分
    pub rating: f64,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub illegal_moves: u32,
    pub timeouts: u32,
}

impl Default for UserStatistics {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING,
            wins: 0,
            losses: 0,
            draws: 0,
            illegal_moves: 0,
            timeouts: 0,
        }
    }
}

/// 用户会话
pub struct Session {
    pub userid: String,
    pub remote_addr: String,
    /// 登录时刻（Unix 秒）
    pub login_time: i64,
    /// 进入就绪态的时刻（Unix 纳秒），配对时按先来后到排序
    ready_time: AtomicI64,
    state: Mutex<SessionState>,
    stats: Mutex<UserStatistics>,
    conn: tokio::sync::Mutex<Connection>,
}

impl Session {
    /// 创建已登录的会话并接管连接
    pub fn new(userid: String, conn: Connection) -> Self {
        let remote_addr = conn.peer_addr().unwrap_or("unknown").to_string();
        Self {
            userid,
            remote_addr,
            login_time: Utc::now().timestamp(),
            ready_time: AtomicI64::new(0),
            state: Mutex::new(SessionState::LoggedIn),
            stats: Mutex::new(UserStatistics::default()),
            conn: tokio::sync::Mutex::new(conn),
        }
    }

    /// 当前状态
    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    /// LoggedIn -> AwaitReady，返回是否迁移成功
    pub fn begin_await_ready(&self) -> bool {
        let mut state = self.lock_state();
        if *state == SessionState::LoggedIn {
            *state = SessionState::AwaitReady;
            true
        } else {
            false
        }
    }

    /// 进入就绪态并记录就绪时刻
    pub fn mark_ready(&self) {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.ready_time.store(now, Ordering::SeqCst);
        *self.lock_state() = SessionState::Ready;
    }

    /// Ready -> Playing，返回是否迁移成功
    pub fn begin_playing(&self, gameid: &str) -> bool {
        let mut state = self.lock_state();
        if *state == SessionState::Ready {
            *state = SessionState::Playing {
                gameid: gameid.to_string(),
            };
            true
        } else {
            false
        }
    }

    /// 对局正常收尾，回到 LoggedIn 等待再次配对
    pub fn finish_game(&self) {
        *self.lock_state() = SessionState::LoggedIn;
    }

    /// 置为已登出
    pub fn set_logged_out(&self) {
        *self.lock_state() = SessionState::LoggedOut;
    }

    /// 就绪时刻（Unix 纳秒）
    pub fn ready_time(&self) -> i64 {
        self.ready_time.load(Ordering::SeqCst)
    }

    /// 统计快照
    pub fn stats(&self) -> UserStatistics {
        self.lock_stats().clone()
    }

    /// 更新统计
    pub fn update_stats(&self, f: impl FnOnce(&mut UserStatistics)) {
        f(&mut self.lock_stats());
    }

    /// 发送一条记录（写不设截止时间）
    pub async fn send<M: Serialize>(&self, msg: &M) -> protocol::Result<()> {
        self.conn.lock().await.send(msg).await
    }

    /// 读取一行记录
    pub async fn read_line(&self, deadline: Duration) -> protocol::Result<Vec<u8>> {
        self.conn.lock().await.read_line(deadline).await
    }

    /// 关闭连接写端（尽力而为）
    pub async fn shutdown(&self) {
        self.conn.lock().await.shutdown().await;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, UserStatistics> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}
