//! 標準出力への行出力
//!
//! GUIとの通信はパイプ経由なので、1行ごとに必ずフラッシュする。

use std::io::Write;

pub fn println_flush(line: &str) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}
