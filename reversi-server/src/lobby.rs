//! 大厅：用户会话注册表
//!
//! 以 userid 为键的会话表，单把互斥锁保护。配对调度通过
//! `snapshot` 取得某一时刻的会话列表，在锁外检查各会话状态。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use protocol::LogoutMessage;

use crate::session::Session;

/// 大厅
pub struct Lobby {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl Lobby {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 注册会话，userid 已存在时拒绝并返回 false
    pub fn add(&self, session: Arc<Session>) -> bool {
        let mut sessions = self.lock();
        if sessions.contains_key(&session.userid) {
            return false;
        }
        sessions.insert(session.userid.clone(), session);
        true
    }

    /// 注销会话，释放其 userid
    pub fn remove(&self, userid: &str) -> Option<Arc<Session>> {
        self.lock().remove(userid)
    }

    /// 某一时刻的全部会话
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.lock().values().cloned().collect()
    }

    /// 在线会话数
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 服务端主动登出：置状态、移出大厅、尽力回发 LOGOUT 并关闭连接
    pub async fn logout(&self, session: &Arc<Session>, reason: &str) {
        session.set_logged_out();
        self.remove(&session.userid);
        let _ = session.send(&LogoutMessage::new(reason)).await;
        session.shutdown().await;
        info!("会话登出 userid={} reason={}", session.userid, reason);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Lobby {
    fn default() -> Self {
        Self::new()
    }
}
