//! Search output channel.
//!
//! The searcher never talks to stdout directly. It is handed a reporter at
//! construction time, and the protocol layer decides how the messages are
//! rendered on the wire.

use crate::types::{Move, Score};

/// 表示用のスコア
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayScore {
    /// centipawn値
    Cp(Score),
    /// 詰みまでの手数（ply、負なら詰まされる側）
    Mate(i32),
}

/// 1回分の探索情報
#[derive(Debug, Clone)]
pub struct SearchInfo<'a> {
    pub depth: i32,
    pub seldepth: Option<i32>,
    pub time_sec: Option<f64>,
    pub nodes: u64,
    pub score: DisplayScore,
    pub pv: &'a [Move],
    pub hashfull: Option<u32>,
}

/// エンジンから呼び出し側への通知
pub trait SearchReporter: Send + Sync {
    /// 反復深化の各段の情報
    fn search_info(&self, info: &SearchInfo);
    /// 自由形式の注記
    fn info_string(&self, text: &str);
    /// 探索終了時の最善手。合法手が無いときは`Move::NONE`。
    fn best_move(&self, mv: Move);
}

/// 何も出力しないレポータ（テスト・ベンチ用）
pub struct NullReporter;

impl SearchReporter for NullReporter {
    fn search_info(&self, _info: &SearchInfo) {}
    fn info_string(&self, _text: &str) {}
    fn best_move(&self, _mv: Move) {}
}
