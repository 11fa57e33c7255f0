//! 端到端测试：真实监听端口加脚本化客户端
//!
//! 服务器在回环地址上启动，客户端按报文类型驱动：ISREADY 回
//! READY，PLAY 按策略应答，RESULT 回 RESULTOK 并返回终局视图。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;

use protocol::{
    position_to_string, Connection, GameMessage, LoginMessage, LogoutMessage, Sfen, UserMessage,
};
use reversi_server::{serve, Lobby, ServerConfig};

async fn start_server(boardlen: usize, timeout_ms: u64) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let lobby = Arc::new(Lobby::new());
    let cfg = ServerConfig {
        boardlen,
        timeout_ms,
    };
    tokio::spawn(serve(listener, lobby, cfg, None));
    addr
}

async fn login(addr: &str, userid: &str) -> Connection {
    let mut conn = Connection::connect(addr).await.unwrap();
    conn.send(&LoginMessage::new(userid, "pw")).await.unwrap();
    conn
}

/// 驱动一个客户端直到收到 RESULT。`on_play` 返回 None 表示不应答
async fn run_client(
    mut conn: Connection,
    on_play: impl Fn(&GameMessage) -> Option<String>,
) -> GameMessage {
    loop {
        let line = conn.read_line(Duration::from_secs(30)).await.unwrap();
        let value: Value = serde_json::from_slice(&line).unwrap();
        match value["Message"].as_str().unwrap_or_default() {
            "ISREADY" => conn.send(&UserMessage::new("READY")).await.unwrap(),
            "PLAY" => {
                let game: GameMessage = serde_json::from_slice(&line).unwrap();
                if let Some(mv) = on_play(&game) {
                    conn.send(&UserMessage::new(mv)).await.unwrap();
                }
            }
            "RESULT" => {
                let game: GameMessage = serde_json::from_slice(&line).unwrap();
                conn.send(&UserMessage::new("RESULTOK")).await.unwrap();
                return game;
            }
            other => panic!("unexpected message: {other}"),
        }
    }
}

/// 按引擎走棋：取第一个合法着点，无着点则弃权
fn engine_strategy(boardlen: usize) -> impl Fn(&GameMessage) -> Option<String> {
    move |game: &GameMessage| {
        let board = Sfen::parse(boardlen, &game.position).unwrap();
        let mv = board
            .legal_moves()
            .first()
            .map(|&pos| position_to_string(pos, boardlen))
            .unwrap_or_else(|| "pass".to_string());
        Some(mv)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_login_rejected() {
    let addr = start_server(8, 10_000).await;

    let mut first = login(&addr, "alice").await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // 第二个同名登录收到 LOGOUT 并被断开
    let mut second = login(&addr, "alice").await;
    let line = second.read_line(Duration::from_secs(5)).await.unwrap();
    let logout: LogoutMessage = serde_json::from_slice(&line).unwrap();
    assert_eq!(logout.message, "LOGOUT");
    assert_eq!(logout.reason, "duplicate login");
    assert!(second.read_line(Duration::from_secs(5)).await.is_err());

    // 先登录的不受影响，随后进入就绪握手
    let line = first.read_line(Duration::from_secs(10)).await.unwrap();
    let value: Value = serde_json::from_slice(&line).unwrap();
    assert_eq!(value["Message"], "ISREADY");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_login_rejected() {
    let addr = start_server(8, 10_000).await;

    let mut conn = Connection::connect(&addr).await.unwrap();
    conn.send(&LoginMessage::new("", "pw")).await.unwrap();
    let line = conn.read_line(Duration::from_secs(5)).await.unwrap();
    let logout: LogoutMessage = serde_json::from_slice(&line).unwrap();
    assert_eq!(logout.message, "LOGOUT");
    assert_eq!(logout.reason, "failed login attempt");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_game_to_completion() {
    // 4 路小棋盘让对局很快结束
    let boardlen = 4;
    let addr = start_server(boardlen, 10_000).await;

    let alice = login(&addr, "alice").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let bob = login(&addr, "bob").await;

    let h1 = tokio::spawn(run_client(alice, engine_strategy(boardlen)));
    let h2 = tokio::spawn(run_client(bob, engine_strategy(boardlen)));
    let r1 = h1.await.unwrap();
    let r2 = h2.await.unwrap();

    // 双方看到同一局、同一个终局状态
    assert_eq!(r1.gameid, r2.gameid);
    assert_eq!(r1.state, r2.state);
    assert!(
        r1.state.starts_with("black win")
            || r1.state.starts_with("white win")
            || r1.state.starts_with("draw"),
        "unexpected state: {}",
        r1.state
    );
    // 终局状态带比分
    assert!(r1.state.contains('/'));
    assert!(!r1.moves.is_empty());
    assert_eq!(r1.board_size, boardlen);
    assert!(r1.end_time >= r1.start_time);

    // 等级分守恒：截断整数的和与初始总分至多差 1
    let total: i64 =
        r1.black_rating.parse::<i64>().unwrap() + r1.white_rating.parse::<i64>().unwrap();
    assert!((2999..=3000).contains(&total), "total = {total}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeout_loses_game() {
    // 单手超时 300ms，双方收到 PLAY 后都不应答；只有黑方会被请求
    let addr = start_server(8, 300).await;

    let alice = login(&addr, "alice").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let bob = login(&addr, "bob").await;

    let h1 = tokio::spawn(run_client(alice, |_: &GameMessage| None));
    let h2 = tokio::spawn(run_client(bob, |_: &GameMessage| None));
    let r1 = h1.await.unwrap();
    let r2 = h2.await.unwrap();

    assert_eq!(r1.state, "black timeout");
    assert_eq!(r2.state, "black timeout");
    // 超时不动等级分
    assert_eq!(r1.black_rating, "1500");
    assert_eq!(r1.white_rating, "1500");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_illegal_move_loses_game() {
    let addr = start_server(8, 10_000).await;

    let alice = login(&addr, "alice").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let bob = login(&addr, "bob").await;

    // 第一手就发盘外着手，黑方立刻判负
    let bad_move = |_: &GameMessage| Some("z9".to_string());
    let h1 = tokio::spawn(run_client(alice, bad_move));
    let h2 = tokio::spawn(run_client(bob, bad_move));
    let r1 = h1.await.unwrap();
    let r2 = h2.await.unwrap();

    assert_eq!(r1.state, "black illegal move \"z9\"");
    assert_eq!(r2.state, r1.state);
    assert_eq!(r1.moves, vec!["z9".to_string()]);
}
