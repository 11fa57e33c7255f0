//! 着手记法
//!
//! 着手写作 `<列><行>`：列用小写字母，行从 1 起计数。第 0~25 列
//! 为 `a`~`z`，更大的列用双字母（第 26 列 `aa`，第 27 列 `ab`，
//! 依此类推）。`pass` 表示弃权。解析大小写不敏感，容忍首尾空白。

use crate::error::ReversiError;

/// 盘面位置：行优先编号 0..N²，负一表示弃权
pub type Position = i64;

/// 弃权
pub const PASS: Position = -1;

/// 解析着手字符串，返回位置与规范化（小写去空白）后的着手文本
///
/// 只校验书写格式，不校验位置是否落在盘内；盘外位置交由规则层
/// 判为非法着手。
pub fn parse_move(msg: &str, boardlen: usize) -> Result<(Position, String), ReversiError> {
    let mv = msg.trim().to_ascii_lowercase();
    if mv.len() < 2 {
        return Err(ReversiError::EmptyMove);
    }
    if mv == "pass" {
        return Ok((PASS, mv));
    }

    let bytes = mv.as_bytes();
    if !bytes[0].is_ascii_lowercase() {
        return Err(ReversiError::MoveFormat(mv.clone()));
    }
    let (col, row_digits) = if bytes[1].is_ascii_lowercase() {
        let digit0 = (bytes[0] - b'a') as i64;
        let digit1 = (bytes[1] - b'a') as i64;
        ((digit0 + 1) * 26 + digit1, &mv[2..])
    } else {
        ((bytes[0] - b'a') as i64, &mv[1..])
    };
    let row: i64 = row_digits
        .parse()
        .map_err(|_| ReversiError::MoveFormat(mv.clone()))?;
    let pos = (row - 1)
        .checked_mul(boardlen as i64)
        .and_then(|p| p.checked_add(col))
        .ok_or_else(|| ReversiError::MoveFormat(mv.clone()))?;
    Ok((pos, mv))
}

/// 位置转着手文本
pub fn position_to_string(pos: Position, boardlen: usize) -> String {
    if pos == PASS {
        return "pass".to_string();
    }
    let row = pos / boardlen as i64 + 1;
    let col = (pos % boardlen as i64) as usize;
    let digit0 = col / 26;
    let digit1 = col % 26;
    let mut out = String::new();
    if digit0 != 0 {
        out.push((b'a' + digit0 as u8 - 1) as char);
    }
    out.push((b'a' + digit1 as u8) as char);
    out.push_str(&row.to_string());
    out
}
