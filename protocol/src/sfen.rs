//! SFEN 局面编码
//!
//! 单行字符串：按行优先列出全部格子，连续空格用十进制数表示，
//! `b`/`w` 为黑/白棋子，行间的 `/` 可有可无；棋盘之后以空格分隔
//! 走子方（`b` 或 `w`）。
//!
//! 示例（8 路初始局面）：`27wb6bw27 b`

use crate::board::{Board, Side};
use crate::error::ReversiError;

/// SFEN 编解码
pub struct Sfen;

impl Sfen {
    /// 解析 SFEN 为棋盘
    ///
    /// 解析是宽容的：`/`、空白与未知字符一律跳过，空格计数可以
    /// 跨行书写。格子填满后在剩余部分寻找走子方，找不到则默认黑方。
    pub fn parse(boardlen: usize, sfen: &str) -> Result<Board, ReversiError> {
        let mut board = Board::new(boardlen)?;
        let bytes = sfen.as_bytes();
        let total = boardlen * boardlen;

        let mut pos = 0usize;
        let mut i = 0usize;
        while pos < total && i < bytes.len() {
            match bytes[i] {
                b'0'..=b'9' => {
                    let mut j = i + 1;
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    let run: usize = sfen[i..j].parse().unwrap_or(usize::MAX);
                    pos = pos.saturating_add(run);
                    i = j;
                }
                b'b' => {
                    board.place(pos, Side::Black);
                    pos += 1;
                    i += 1;
                }
                b'w' => {
                    board.place(pos, Side::White);
                    pos += 1;
                    i += 1;
                }
                // '/' 以及其他字符都跳过
                _ => i += 1,
            }
        }

        if pos == total {
            for &c in &bytes[i..] {
                if c == b'b' {
                    board.set_turn(Side::Black);
                    break;
                }
                if c == b'w' {
                    board.set_turn(Side::White);
                    break;
                }
            }
        }
        Ok(board)
    }

    /// 序列化棋盘为 SFEN
    pub fn to_string(board: &Board) -> String {
        let total = board.boardlen() * board.boardlen();
        let mut out = String::new();
        let mut empties = 0usize;
        for pos in 0..total {
            match board.disc_at(pos) {
                Some(side) => {
                    if empties > 0 {
                        out.push_str(&empties.to_string());
                        empties = 0;
                    }
                    out.push(side.to_sfen_char());
                }
                None => empties += 1,
            }
        }
        if empties > 0 {
            out.push_str(&empties.to_string());
        }
        out.push(' ');
        out.push(board.turn().to_sfen_char());
        out
    }

    /// 初始局面 SFEN：中央 2×2 两条对角线上白黑相错，黑方先行
    pub fn initial(boardlen: usize) -> String {
        let lead = boardlen * (boardlen / 2 - 1) + boardlen / 2 - 1;
        format!("{lead}wb{}bw{lead} b", boardlen - 2)
    }
}
