//! 服务器主逻辑：登录受理、就绪握手与配对调度
//!
//! 一个受理任务接收连接并完成登录；配对调度每两秒扫描一次大厅，
//! 为新登录的会话启动就绪握手，把就绪会话洗牌后两两配对并为每
//! 对启动一个仲裁任务。

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use protocol::{
    Connection, IsReadyMessage, LoginMessage, LogoutMessage, ProtocolError, UserMessage,
    CENSUS_EVERY_TICKS, LOGIN_TIMEOUT, PAIRING_INTERVAL, READY_TIMEOUT,
};

use crate::game;
use crate::lobby::Lobby;
use crate::session::{Session, SessionState};
use crate::storage::GameStore;

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 棋盘边长（不小于 4 的偶数）
    pub boardlen: usize,
    /// 单手超时（毫秒）
    pub timeout_ms: u64,
}

/// 受理连接并驱动配对调度，永不返回
pub async fn serve(
    listener: TcpListener,
    lobby: Arc<Lobby>,
    cfg: ServerConfig,
    store: Option<Arc<GameStore>>,
) {
    let accept_lobby = lobby.clone();
    tokio::spawn(accept_loop(listener, accept_lobby));
    pairing_loop(lobby, cfg, store).await;
}

async fn accept_loop(listener: TcpListener, lobby: Arc<Lobby>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("新连接 addr={}", addr);
                let lobby = lobby.clone();
                tokio::spawn(handle_login(stream, lobby));
            }
            Err(e) => {
                error!("accept 失败 err={}", e);
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        }
    }
}

/// 登录握手：失败时尽力回发 LOGOUT 并断开
async fn handle_login(stream: TcpStream, lobby: Arc<Lobby>) {
    let mut conn = match Connection::from_stream(stream) {
        Ok(conn) => conn,
        Err(e) => {
            warn!("连接初始化失败 err={}", e);
            return;
        }
    };
    let peer = conn.peer_addr().unwrap_or("unknown").to_string();

    let userid = match read_login(&mut conn).await {
        Ok(userid) => userid,
        Err(reason) => {
            warn!("登录失败 addr={} reason={}", peer, reason);
            let _ = conn.send(&LogoutMessage::new(&reason)).await;
            conn.shutdown().await;
            return;
        }
    };

    let session = Arc::new(Session::new(userid, conn));
    if !lobby.add(session.clone()) {
        warn!("重复登录 userid={} addr={}", session.userid, peer);
        let _ = session.send(&LogoutMessage::new("duplicate login")).await;
        session.shutdown().await;
        return;
    }
    info!("新登录 userid={} addr={}", session.userid, peer);
}

async fn read_login(conn: &mut Connection) -> Result<String, String> {
    let line = conn.read_line(LOGIN_TIMEOUT).await.map_err(|e| match e {
        ProtocolError::Timeout => "login timeout".to_string(),
        other => other.to_string(),
    })?;
    let login: LoginMessage =
        serde_json::from_slice(&line).map_err(|_| "broken login message".to_string())?;
    if login.message != "LOGIN" || login.userid.is_empty() || login.password.is_empty() {
        return Err("failed login attempt".to_string());
    }
    // TODO: 密码校验
    Ok(login.userid)
}

/// 就绪握手：发送 ISREADY 并等待 READY 应答
async fn chaperone(session: Arc<Session>, lobby: Arc<Lobby>) {
    let _ = session.send(&IsReadyMessage::new()).await;
    match await_ready(&session).await {
        Ok(()) => session.mark_ready(),
        Err(reason) => {
            warn!("就绪握手失败 userid={} reason={}", session.userid, reason);
            lobby.logout(&session, &reason).await;
        }
    }
}

async fn await_ready(session: &Session) -> Result<(), String> {
    let line = session
        .read_line(READY_TIMEOUT)
        .await
        .map_err(|e| e.to_string())?;
    let msg: UserMessage = serde_json::from_slice(&line).map_err(|e| e.to_string())?;
    if !msg.message.eq_ignore_ascii_case("READY") {
        return Err("wrong READY".to_string());
    }
    Ok(())
}

async fn pairing_loop(lobby: Arc<Lobby>, cfg: ServerConfig, store: Option<Arc<GameStore>>) {
    let mut interval = tokio::time::interval(PAIRING_INTERVAL);
    let mut census_tick = 0u32;
    loop {
        interval.tick().await;

        let mut census = [0usize; 5];
        let mut ready = Vec::new();
        for session in lobby.snapshot() {
            match session.state() {
                SessionState::LoggedOut => census[0] += 1,
                SessionState::LoggedIn => {
                    census[1] += 1;
                    if session.begin_await_ready() {
                        tokio::spawn(chaperone(session, lobby.clone()));
                    }
                }
                SessionState::AwaitReady => census[2] += 1,
                SessionState::Ready => {
                    census[3] += 1;
                    ready.push(session);
                }
                SessionState::Playing { .. } => census[4] += 1,
            }
        }

        for (u0, u1) in pick_ready_pairs(ready) {
            let gameid = game::gen_game_id();
            u0.begin_playing(&gameid);
            u1.begin_playing(&gameid);
            tokio::spawn(game::run(
                gameid,
                u0,
                u1,
                lobby.clone(),
                cfg.boardlen,
                cfg.timeout_ms,
                store.clone(),
            ));
        }

        census_tick += 1;
        if census_tick > CENSUS_EVERY_TICKS {
            info!(
                "会话状态 logged_out={} logged_in={} await_ready={} ready={} playing={}",
                census[0], census[1], census[2], census[3], census[4]
            );
            census_tick = 0;
        }
    }
}

/// 就绪会话两两配对：奇数个时让最晚就绪者继续等待（先来先配），
/// 其余洗牌后按序成对，避免同一对常客反复相遇
fn pick_ready_pairs(mut ready: Vec<Arc<Session>>) -> Vec<(Arc<Session>, Arc<Session>)> {
    if ready.len() < 2 {
        return Vec::new();
    }
    if ready.len() % 2 == 1 {
        ready.sort_by_key(|s| s.ready_time());
        ready.pop();
    }
    ready.shuffle(&mut rand::thread_rng());

    let mut pairs = Vec::with_capacity(ready.len() / 2);
    let mut it = ready.into_iter();
    while let (Some(u0), Some(u1)) = (it.next(), it.next()) {
        pairs.push((u0, u1));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ready_session(userid: &str) -> (Arc<Session>, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let client = tokio::spawn(async move { Connection::connect(&addr).await.unwrap() });
        let (stream, _) = listener.accept().await.unwrap();
        let conn = Connection::from_stream(stream).unwrap();
        let session = Arc::new(Session::new(userid.to_string(), conn));
        session.begin_await_ready();
        session.mark_ready();
        (session, client.await.unwrap())
    }

    #[tokio::test]
    async fn test_pick_pairs_too_few() {
        let (alone, _p) = ready_session("alice").await;
        assert!(pick_ready_pairs(vec![]).is_empty());
        assert!(pick_ready_pairs(vec![alone]).is_empty());
    }

    #[tokio::test]
    async fn test_pick_pairs_drops_newest_on_odd_count() {
        let (a, _pa) = ready_session("alice").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (b, _pb) = ready_session("bob").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (c, _pc) = ready_session("carol").await;

        // 最晚就绪的 carol 落单，资历最老的两位成对
        let pairs = pick_ready_pairs(vec![a, b, c.clone()]);
        assert_eq!(pairs.len(), 1);
        let (u0, u1) = &pairs[0];
        let mut ids = vec![u0.userid.clone(), u1.userid.clone()];
        ids.sort();
        assert_eq!(ids, vec!["alice", "bob"]);
        assert_eq!(c.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_pick_pairs_even_count() {
        let (a, _pa) = ready_session("alice").await;
        let (b, _pb) = ready_session("bob").await;
        let (c, _pc) = ready_session("carol").await;
        let (d, _pd) = ready_session("dave").await;

        let pairs = pick_ready_pairs(vec![a, b, c, d]);
        assert_eq!(pairs.len(), 2);
        let mut ids: Vec<String> = pairs
            .iter()
            .flat_map(|(u0, u1)| [u0.userid.clone(), u1.userid.clone()])
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["alice", "bob", "carol", "dave"]);
    }
}
