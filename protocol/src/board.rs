//! 位棋盘表示与走法生成
//!
//! 棋盘为 N×N（N 为偶数），黑白双方各用一组 64 位字表示：
//! 格子 p 存放在第 p/64 个字的第 63-(p%64) 位（字内高位在前），
//! p 按行优先编号。走法生成采用方向位移叠加法：沿八个方向
//! 反复位移累积对方棋子的连续段，再与空格相交得到合法着点。
//! 哨兵掩码把每行/每列边缘清零，防止位移跨行绕接。

use crate::error::ReversiError;
use crate::moves::{Position, PASS};

/// 每个字的位数
const WORD_BITS: usize = 64;

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// 黑方（先手）
    Black,
    /// 白方
    White,
}

impl Side {
    /// 获取对方阵营
    pub fn opponent(&self) -> Side {
        match self {
            Side::Black => Side::White,
            Side::White => Side::Black,
        }
    }

    /// 报文中的阵营名
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Black => "black",
            Side::White => "white",
        }
    }

    /// SFEN 字符
    pub fn to_sfen_char(&self) -> char {
        match self {
            Side::Black => 'b',
            Side::White => 'w',
        }
    }
}

/// 位移方向：Left 朝低编号格子（大整数意义上的左移），Right 反之
#[derive(Debug, Clone, Copy)]
enum Shift {
    Left,
    Right,
}

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    boardlen: usize,
    /// 每张位图的字数：⌈N²/64⌉
    words: usize,
    /// 末字中越过 N²-1 的尾部位数，位图中恒为 0
    unused_bits: u32,
    turn: Side,
    discs: u32,
    black: Vec<u64>,
    white: Vec<u64>,
    /// 除每行首末列外全 1，水平方向防绕接
    h_sentinel: Vec<u64>,
    /// 除首末行外全 1，垂直方向防绕接
    v_sentinel: Vec<u64>,
    /// 上两者之交，四条对角方向共用
    s_sentinel: Vec<u64>,
}

impl Board {
    /// 创建空棋盘，边长必须为不小于 4 的偶数
    pub fn new(boardlen: usize) -> Result<Self, ReversiError> {
        if boardlen < 4 || boardlen % 2 != 0 {
            return Err(ReversiError::InvalidBoardLen(boardlen));
        }
        let cells = boardlen * boardlen;
        let words = (cells - 1) / WORD_BITS + 1;
        let unused_bits = (WORD_BITS * words - cells) as u32;
        let mut board = Self {
            boardlen,
            words,
            unused_bits,
            turn: Side::Black,
            discs: 0,
            black: vec![0; words],
            white: vec![0; words],
            h_sentinel: vec![0; words],
            v_sentinel: vec![0; words],
            s_sentinel: vec![0; words],
        };
        board.h_sentinel = board.mk_horizontal_sentinel();
        board.v_sentinel = board.mk_vertical_sentinel();
        board.s_sentinel = and(&board.h_sentinel, &board.v_sentinel);
        Ok(board)
    }

    /// 棋盘边长
    pub fn boardlen(&self) -> usize {
        self.boardlen
    }

    /// 当前走子方
    pub fn turn(&self) -> Side {
        self.turn
    }

    /// 是否轮到黑方
    pub fn is_black_turn(&self) -> bool {
        self.turn == Side::Black
    }

    /// 盘上棋子总数
    pub fn disc_count(&self) -> u32 {
        self.discs
    }

    /// 黑方棋子数
    pub fn count_black(&self) -> u32 {
        self.black.iter().map(|w| w.count_ones()).sum()
    }

    /// 白方棋子数
    pub fn count_white(&self) -> u32 {
        self.white.iter().map(|w| w.count_ones()).sum()
    }

    /// 查询格子上的棋子
    pub fn disc_at(&self, pos: usize) -> Option<Side> {
        if pos >= self.boardlen * self.boardlen {
            return None;
        }
        if bit_at(&self.black, pos) {
            Some(Side::Black)
        } else if bit_at(&self.white, pos) {
            Some(Side::White)
        } else {
            None
        }
    }

    /// 放置棋子（SFEN 解析用），pos 必须在盘内
    pub(crate) fn place(&mut self, pos: usize, side: Side) {
        match side {
            Side::Black => set_bit(&mut self.black, pos),
            Side::White => set_bit(&mut self.white, pos),
        }
        self.discs += 1;
    }

    /// 设置走子方（SFEN 解析用）
    pub(crate) fn set_turn(&mut self, side: Side) {
        self.turn = side;
    }

    /// 当前走子方的全部合法着点
    pub fn legal_moves(&self) -> Vec<Position> {
        let legals = self.legal_moves_for(self.turn);
        let mut out = Vec::new();
        for (i, &word) in legals.iter().enumerate() {
            if word == 0 {
                continue;
            }
            for b in 0..WORD_BITS {
                if word & (1u64 << (WORD_BITS - 1 - b)) != 0 {
                    out.push((i * WORD_BITS + b) as Position);
                }
            }
        }
        out
    }

    /// 判断着手是否合法：弃权仅在无着点时合法，盘外位置一律非法
    pub fn is_legal_move(&self, pos: Position) -> bool {
        let legals = self.legal_moves_for(self.turn);
        if pos == PASS {
            return is_zero(&legals);
        }
        if pos < 0 || pos as usize >= self.boardlen * self.boardlen {
            return false;
        }
        bit_at(&legals, pos as usize)
    }

    /// 校验并落子
    pub fn try_move(&mut self, pos: Position) -> Result<(), ReversiError> {
        if !self.is_legal_move(pos) {
            return Err(ReversiError::IllegalMove);
        }
        self.apply_move(pos);
        Ok(())
    }

    /// 落子并翻转，弃权只交换走子方。调用方需先校验合法性
    pub fn apply_move(&mut self, pos: Position) {
        if pos != PASS {
            let p = pos as usize;
            let flips = self.flip_bits(p);
            let mut mv = vec![0u64; self.words];
            set_bit(&mut mv, p);
            match self.turn {
                Side::Black => {
                    self.white = and(&self.white, &self.not(&flips));
                    self.black = or(&or(&self.black, &flips), &mv);
                }
                Side::White => {
                    self.black = and(&self.black, &self.not(&flips));
                    self.white = or(&or(&self.white, &flips), &mv);
                }
            }
            self.discs += 1;
        }
        self.turn = self.turn.opponent();
    }

    /// 双方都无着点即终局
    pub fn is_game_over(&self) -> bool {
        is_zero(&self.legal_moves_for(Side::Black)) && is_zero(&self.legal_moves_for(Side::White))
    }

    fn legal_moves_for(&self, side: Side) -> Vec<u64> {
        match side {
            Side::Black => self.legal_moves_bits(&self.black, &self.white),
            Side::White => self.legal_moves_bits(&self.white, &self.black),
        }
    }

    /// 方向表：位移量与对应哨兵。上下用 N，左右用 1，对角用 N∓1
    fn directions<'a>(
        &self,
        mask_h: &'a [u64],
        mask_v: &'a [u64],
        mask_s: &'a [u64],
    ) -> [(&'a [u64], usize, Shift); 8] {
        let n = self.boardlen;
        [
            (mask_v, n, Shift::Left),      // 上
            (mask_v, n, Shift::Right),     // 下
            (mask_h, 1, Shift::Right),     // 右
            (mask_h, 1, Shift::Left),      // 左
            (mask_s, n - 1, Shift::Left),  // 右上
            (mask_s, n - 1, Shift::Right), // 左下
            (mask_s, n + 1, Shift::Right), // 右下
            (mask_s, n + 1, Shift::Left),  // 左上
        ]
    }

    fn legal_moves_bits(&self, my: &[u64], op: &[u64]) -> Vec<u64> {
        let opens = self.not(&or(my, op));
        let mask_h = and(op, &self.h_sentinel);
        let mask_v = and(op, &self.v_sentinel);
        let mask_s = and(op, &self.s_sentinel);

        let mut legals = vec![0u64; self.words];
        for (mask, len, dir) in self.directions(&mask_h, &mask_v, &mask_s) {
            // 沿该方向累积紧邻的对方棋子段，最长可翻转段为 N-2 子
            let mut run = and(mask, &self.shift(my, len, dir));
            for _ in 0..self.boardlen - 3 {
                run = or(&run, &and(mask, &self.shift(&run, len, dir)));
            }
            legals = or(&legals, &and(&opens, &self.shift(&run, len, dir)));
        }
        legals
    }

    /// 在 pos 落子后被翻转的棋子集合
    fn flip_bits(&self, pos: usize) -> Vec<u64> {
        let (my, op) = match self.turn {
            Side::Black => (&self.black, &self.white),
            Side::White => (&self.white, &self.black),
        };
        let mut mv = vec![0u64; self.words];
        set_bit(&mut mv, pos);

        let mask_h = and(op, &self.h_sentinel);
        let mask_v = and(op, &self.v_sentinel);
        let mask_s = and(op, &self.s_sentinel);

        let mut flips = vec![0u64; self.words];
        for (mask, len, dir) in self.directions(&mask_h, &mask_v, &mask_s) {
            let mut run = and(mask, &self.shift(&mv, len, dir));
            for _ in 0..self.boardlen - 3 {
                run = or(&run, &and(mask, &self.shift(&run, len, dir)));
            }
            // 段的远端必须有己方棋子封口，该段才真正翻转
            if !is_zero(&and(my, &self.shift(&run, len, dir))) {
                flips = or(&flips, &run);
            }
        }
        flips
    }

    fn shift(&self, a: &[u64], n: usize, dir: Shift) -> Vec<u64> {
        match dir {
            Shift::Left => self.shl(a, n),
            Shift::Right => self.shr(a, n),
        }
    }

    /// 把 N² 位向量整体左移 n 位（0 号位在 0 号字最高位），移后清尾
    fn shl(&self, a: &[u64], n: usize) -> Vec<u64> {
        let word_shift = n / WORD_BITS;
        let bit_shift = n % WORD_BITS;
        let mut c = vec![0u64; self.words];
        for i in 0..self.words {
            if i + word_shift < self.words {
                c[i] = a[i + word_shift];
            }
        }
        if bit_shift > 0 {
            for i in 0..self.words - 1 {
                c[i] = (c[i] << bit_shift) | (c[i + 1] >> (WORD_BITS - bit_shift));
            }
            c[self.words - 1] <<= bit_shift;
        }
        self.mask_tail(&mut c);
        c
    }

    /// 整体右移 n 位，移后清尾
    fn shr(&self, a: &[u64], n: usize) -> Vec<u64> {
        let word_shift = n / WORD_BITS;
        let bit_shift = n % WORD_BITS;
        let mut c = vec![0u64; self.words];
        for i in (0..self.words).rev() {
            if i >= word_shift {
                c[i] = a[i - word_shift];
            }
        }
        if bit_shift > 0 {
            for i in (1..self.words).rev() {
                c[i] = (c[i] >> bit_shift) | (c[i - 1] << (WORD_BITS - bit_shift));
            }
            c[0] >>= bit_shift;
        }
        self.mask_tail(&mut c);
        c
    }

    fn not(&self, a: &[u64]) -> Vec<u64> {
        let mut c: Vec<u64> = a.iter().map(|w| !w).collect();
        self.mask_tail(&mut c);
        c
    }

    /// 清零末字中越过 N²-1 的尾部位
    fn mask_tail(&self, words: &mut [u64]) {
        if self.unused_bits > 0 {
            let last = words.len() - 1;
            words[last] &= !((1u64 << self.unused_bits) - 1);
        }
    }

    fn mk_horizontal_sentinel(&self) -> Vec<u64> {
        let mut bits = vec![!0u64; self.words];
        for row in 0..self.boardlen {
            clear_bit(&mut bits, row * self.boardlen);
            clear_bit(&mut bits, row * self.boardlen + self.boardlen - 1);
        }
        self.mask_tail(&mut bits);
        bits
    }

    fn mk_vertical_sentinel(&self) -> Vec<u64> {
        let mut bits = vec![!0u64; self.words];
        for col in 0..self.boardlen {
            clear_bit(&mut bits, col);
            clear_bit(&mut bits, (self.boardlen - 1) * self.boardlen + col);
        }
        self.mask_tail(&mut bits);
        bits
    }
}

fn or(x: &[u64], y: &[u64]) -> Vec<u64> {
    x.iter().zip(y).map(|(a, b)| a | b).collect()
}

fn and(x: &[u64], y: &[u64]) -> Vec<u64> {
    x.iter().zip(y).map(|(a, b)| a & b).collect()
}

fn is_zero(x: &[u64]) -> bool {
    x.iter().all(|&w| w == 0)
}

fn set_bit(words: &mut [u64], pos: usize) {
    words[pos / WORD_BITS] |= 1u64 << (WORD_BITS - 1 - pos % WORD_BITS);
}

fn clear_bit(words: &mut [u64], pos: usize) {
    words[pos / WORD_BITS] &= !(1u64 << (WORD_BITS - 1 - pos % WORD_BITS));
}

fn bit_at(words: &[u64], pos: usize) -> bool {
    words[pos / WORD_BITS] & (1u64 << (WORD_BITS - 1 - pos % WORD_BITS)) != 0
}
