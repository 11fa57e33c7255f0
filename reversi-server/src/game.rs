//! 对局仲裁
//!
//! 每局一个任务：轮流向当前走子方发送 PLAY 并在单手超时内等待
//! 应答，校验并落子，直至出现终局状态；随后结算等级分，并发向
//! 双方广播 RESULT、等待 RESULTOK。所有异常（超时、断线、非法
//! 报文、非法着手）都收敛为终局状态码，不向外传播。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, error, info};

use protocol::{parse_move, GameMessage, Sfen, Side, UserMessage};

use crate::lobby::Lobby;
use crate::session::Session;
use crate::storage::GameStore;

/// 等级分 K 值
const RATING_K: f64 = 32.0;

/// 对局状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStateCode {
    Playing,
    BlackWin,
    WhiteWin,
    BlackIllegalMove,
    WhiteIllegalMove,
    BlackTimeout,
    WhiteTimeout,
    BlackDisconnected,
    WhiteDisconnected,
    Draw,
}

impl GameStateCode {
    /// 是否为终局状态
    pub fn is_terminal(&self) -> bool {
        *self != GameStateCode::Playing
    }

    fn as_str(&self) -> &'static str {
        match self {
            GameStateCode::Playing => "playing",
            GameStateCode::BlackWin => "black win",
            GameStateCode::WhiteWin => "white win",
            GameStateCode::BlackIllegalMove => "black illegal move",
            GameStateCode::WhiteIllegalMove => "white illegal move",
            GameStateCode::BlackTimeout => "black timeout",
            GameStateCode::WhiteTimeout => "white timeout",
            GameStateCode::BlackDisconnected => "black disconnected",
            GameStateCode::WhiteDisconnected => "white disconnected",
            GameStateCode::Draw => "draw",
        }
    }
}

/// 对局状态：状态码加说明（比分、违例着手原文等）
#[derive(Debug, Clone)]
pub struct GameState {
    code: GameStateCode,
    detail: String,
}

impl GameState {
    fn playing() -> Self {
        Self {
            code: GameStateCode::Playing,
            detail: String::new(),
        }
    }

    fn bare(code: GameStateCode) -> Self {
        Self {
            code,
            detail: String::new(),
        }
    }

    fn detailed(code: GameStateCode, detail: String) -> Self {
        Self { code, detail }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            GameStateCode::BlackWin | GameStateCode::WhiteWin | GameStateCode::Draw => {
                write!(f, "{} {}", self.code.as_str(), self.detail)
            }
            GameStateCode::BlackIllegalMove | GameStateCode::WhiteIllegalMove => {
                write!(f, "{} \"{}\"", self.code.as_str(), self.detail)
            }
            _ => f.write_str(self.code.as_str()),
        }
    }
}

/// 一局对弈
struct Game {
    gameid: String,
    /// Unix 秒
    start_time: i64,
    end_time: i64,
    black: Arc<Session>,
    white: Arc<Session>,
    /// 已受理着手的规范化文本，按受理顺序
    moves: Vec<String>,
    timeout_ms: u64,
    state: GameState,
    board: protocol::Board,
}

impl Game {
    fn is_over(&self) -> bool {
        self.state.code.is_terminal()
    }

    fn session_of(&self, side: Side) -> Arc<Session> {
        match side {
            Side::Black => self.black.clone(),
            Side::White => self.white.clone(),
        }
    }

    /// 向当前走子方请求一手棋并落子，异常时写入终局状态
    async fn request_move(&mut self) {
        let side = self.board.turn();
        let mover = self.session_of(side);
        let deadline = Duration::from_millis(self.timeout_ms);

        let play = self.view("PLAY", false);
        let _ = mover.send(&play).await;

        let line = match mover.read_line(deadline).await {
            Ok(line) => line,
            Err(e) => {
                // 读故障与超时同样处置；Disconnected 状态码预留未用
                self.state = GameState::bare(timeout_code(side));
                mover.update_stats(|s| s.timeouts += 1);
                debug!(
                    "等待着手失败 gameid={} userid={} err={}",
                    self.gameid, mover.userid, e
                );
                return;
            }
        };

        let msg: UserMessage = match serde_json::from_slice(&line) {
            Ok(msg) => msg,
            Err(_) => {
                let raw = String::from_utf8_lossy(&line).trim().to_string();
                self.state = GameState::detailed(illegal_code(side), raw);
                mover.update_stats(|s| s.illegal_moves += 1);
                return;
            }
        };

        let (pos, mv) = match parse_move(&msg.message, self.board.boardlen()) {
            Ok(parsed) => parsed,
            Err(_) => {
                self.state = GameState::detailed(illegal_code(side), msg.message);
                mover.update_stats(|s| s.illegal_moves += 1);
                return;
            }
        };
        self.moves.push(mv);

        if self.board.try_move(pos).is_err() {
            self.state = GameState::detailed(illegal_code(side), msg.message);
            mover.update_stats(|s| s.illegal_moves += 1);
            return;
        }

        if self.board.is_game_over() {
            let n_black = self.board.count_black();
            let n_white = self.board.count_white();
            let code = if n_black > n_white {
                GameStateCode::BlackWin
            } else if n_black < n_white {
                GameStateCode::WhiteWin
            } else {
                GameStateCode::Draw
            };
            self.state = GameState::detailed(code, format!("{}/{}", n_black, n_white));
        }
    }

    /// 对局视图。PLAY 至多带最近一手，RESULT 带完整着手序列
    fn view(&self, message: &str, full_moves: bool) -> GameMessage {
        GameMessage {
            message: message.to_string(),
            gameid: self.gameid.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            black: self.black.userid.clone(),
            black_rating: format!("{}", self.black.stats().rating as i64),
            white: self.white.userid.clone(),
            white_rating: format!("{}", self.white.stats().rating as i64),
            turn: self.board.turn().as_str().to_string(),
            position: Sfen::to_string(&self.board),
            moves: if full_moves {
                self.moves.clone()
            } else {
                self.moves.last().cloned().into_iter().collect()
            },
            board_size: self.board.boardlen(),
            timeout: self.timeout_ms,
            state: self.state.to_string(),
        }
    }

    /// 结算等级分与胜负场次，仅分出胜负的对局参与
    fn update_ratings(&self) {
        let (winner, loser) = match self.state.code {
            GameStateCode::BlackWin => (&self.black, &self.white),
            GameStateCode::WhiteWin => (&self.white, &self.black),
            _ => return,
        };
        let delta = rating_delta(winner.stats().rating, loser.stats().rating);
        winner.update_stats(|s| {
            s.rating += delta;
            s.wins += 1;
        });
        loser.update_stats(|s| {
            s.rating -= delta;
            s.losses += 1;
        });
    }
}

fn timeout_code(side: Side) -> GameStateCode {
    match side {
        Side::Black => GameStateCode::BlackTimeout,
        Side::White => GameStateCode::WhiteTimeout,
    }
}

fn illegal_code(side: Side) -> GameStateCode {
    match side {
        Side::Black => GameStateCode::BlackIllegalMove,
        Side::White => GameStateCode::WhiteIllegalMove,
    }
}

/// 胜者的等级分增量
// TODO: 指数里是胜者减败者，胜者占优时增量反而更小，方向与惯用
// Elo 相反，待复核
fn rating_delta(winner_rating: f64, loser_rating: f64) -> f64 {
    RATING_K / (10f64.powf((winner_rating - loser_rating) / 400.0) + 1.0)
}

/// 生成对局 ID：`game-<纳秒时间戳>-<10 个小写字母>`
pub(crate) fn gen_game_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..10).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
    format!(
        "game-{}-{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        suffix
    )
}

/// 仲裁一局：u0 执黑、u1 执白
pub async fn run(
    gameid: String,
    black: Arc<Session>,
    white: Arc<Session>,
    lobby: Arc<Lobby>,
    boardlen: usize,
    timeout_ms: u64,
    store: Option<Arc<GameStore>>,
) {
    let board = match Sfen::parse(boardlen, &Sfen::initial(boardlen)) {
        Ok(board) => board,
        Err(e) => {
            error!("初始局面构建失败 boardlen={} err={}", boardlen, e);
            black.finish_game();
            white.finish_game();
            return;
        }
    };
    let mut game = Game {
        gameid,
        start_time: Utc::now().timestamp(),
        end_time: 0,
        black,
        white,
        moves: Vec::new(),
        timeout_ms,
        state: GameState::playing(),
        board,
    };
    info!(
        "对局开始 gameid={} black={} white={}",
        game.gameid, game.black.userid, game.white.userid
    );

    while !game.is_over() {
        game.request_move().await;
    }
    game.end_time = Utc::now().timestamp();
    info!("对局结束 gameid={} state={}", game.gameid, game.state);

    // 入库用的记录取结算前的等级分，与广播顺序保持一致
    if let Some(store) = &store {
        store.push(game.view("RESULT", true));
    }
    game.update_ratings();

    let result = game.view("RESULT", true);
    let to_black = tokio::spawn(send_result(
        game.black.clone(),
        result.clone(),
        game.timeout_ms,
        lobby.clone(),
    ));
    let to_white = tokio::spawn(send_result(
        game.white.clone(),
        result,
        game.timeout_ms,
        lobby,
    ));
    let _ = to_black.await;
    let _ = to_white.await;
}

/// 广播结果并等待 RESULTOK，成功后会话回到 LoggedIn
async fn send_result(
    session: Arc<Session>,
    result: GameMessage,
    timeout_ms: u64,
    lobby: Arc<Lobby>,
) {
    let _ = session.send(&result).await;

    let deadline = Duration::from_millis(timeout_ms);
    let mut wrong_replies = 0;
    loop {
        let line = match session.read_line(deadline).await {
            Ok(line) => line,
            Err(e) => {
                lobby.logout(&session, &e.to_string()).await;
                return;
            }
        };
        let msg: UserMessage = match serde_json::from_slice(&line) {
            Ok(msg) => msg,
            Err(e) => {
                lobby.logout(&session, &e.to_string()).await;
                return;
            }
        };
        if msg.message.eq_ignore_ascii_case("RESULTOK") {
            break;
        }
        if wrong_replies == 0 {
            // 对方最后一手的应答可能与结果广播交错，容忍一条
            wrong_replies += 1;
        } else {
            lobby.logout(&session, "wrong RESULTOK").await;
            return;
        }
    }
    session.finish_game();
}
