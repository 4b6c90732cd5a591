//! Per-worker search state.
//!
//! Each worker owns its position, key history and stack; only the node and
//! seldepth counters are shared (relaxed atomics summed by the main worker
//! at report time).

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::movegen::MoveList;
use crate::position::Position;
use crate::types::{Score, SCORE_NONE};

use super::limits::Limiter;
use super::pv::PvList;

/// ノード数と最大到達深さ（メインワーカーが集計のために読む）
#[derive(Default)]
pub(crate) struct ThreadStats {
    nodes: AtomicU64,
    seldepth: AtomicI32,
}

impl ThreadStats {
    pub fn load_nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    pub fn load_seldepth(&self) -> i32 {
        self.seldepth.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.nodes.store(0, Ordering::Relaxed);
        self.seldepth.store(0, Ordering::Relaxed);
    }
}

/// ワーカー1本分の探索状態
pub(crate) struct ThreadData {
    pub id: usize,
    pub stats: Arc<ThreadStats>,

    pub max_depth: i32,
    pub root_pos: Position,
    pub key_history: SmallVec<[u64; 128]>,
    pub root_moves: MoveList,
    pub limiter: Limiter,
    pub cute_chess_workaround: bool,

    pub root_depth: i32,
    pub depth_completed: i32,
    pub last_score: Score,
    pub last_pv: PvList,
}

impl ThreadData {
    pub fn new(id: usize, stats: Arc<ThreadStats>) -> ThreadData {
        ThreadData {
            id,
            stats,
            max_depth: 0,
            root_pos: Position::startpos(),
            key_history: SmallVec::new(),
            root_moves: MoveList::new(),
            limiter: Limiter::Compound(super::limits::CompoundLimiter::new()),
            cute_chess_workaround: false,
            root_depth: 0,
            depth_completed: 0,
            last_score: SCORE_NONE,
            last_pv: PvList::new(),
        }
    }

    #[inline]
    pub fn is_main(&self) -> bool {
        self.id == 0
    }

    #[inline]
    pub fn nodes(&self) -> u64 {
        self.stats.nodes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn inc_nodes(&self) {
        self.stats.nodes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn update_seldepth(&self, ply: i32) {
        if ply > self.stats.seldepth.load(Ordering::Relaxed) {
            self.stats.seldepth.store(ply, Ordering::Relaxed);
        }
    }

    pub fn reset_seldepth(&self) {
        self.stats.seldepth.store(0, Ordering::Relaxed);
    }
}
