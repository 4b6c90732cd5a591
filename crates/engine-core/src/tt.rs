//! 置換表
//!
//! 8バイトエントリのフラット配列。確保はMiB単位で指定し、実際の割り当ては
//! `finalize`まで遅延する。エントリはrelaxedなAtomicU64として読み書きし、
//! 競合で壊れた値は16bitキー照合と合法性検査で弾かれる前提を置く。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::types::{Move, Score, MAX_DEPTH, SCORE_WIN};

/// 既定の置換表サイズ（MiB）
pub const DEFAULT_TT_SIZE_MIB: usize = 64;
/// 置換表サイズの範囲（MiB）
pub const TT_SIZE_MIB_RANGE: std::ops::RangeInclusive<usize> = 1..=131072;

/// スコアの性質
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// 空エントリ
    None = 0,
    /// score <= alpha だった（上界）
    UpperBound = 1,
    /// score >= beta だった（下界）
    LowerBound = 2,
    /// 正確な値
    Exact = 3,
}

impl Bound {
    fn from_u8(v: u8) -> Bound {
        match v & 3 {
            0 => Bound::None,
            1 => Bound::UpperBound,
            2 => Bound::LowerBound,
            _ => Bound::Exact,
        }
    }
}

/// probeの結果
#[derive(Debug, Clone, Copy)]
pub struct ProbedEntry {
    pub score: Score,
    pub depth: i32,
    pub mv: Move,
    pub bound: Bound,
}

fn score_to_tt(score: Score, ply: i32) -> Score {
    if score < -SCORE_WIN {
        score - ply
    } else if score > SCORE_WIN {
        score + ply
    } else {
        score
    }
}

fn score_from_tt(score: Score, ply: i32) -> Score {
    if score < -SCORE_WIN {
        score + ply
    } else if score > SCORE_WIN {
        score - ply
    } else {
        score
    }
}

fn pack(key: u64, score: Score, mv: Move, depth: i32, bound: Bound) -> u64 {
    (key & 0xFFFF)
        | ((score as i16 as u16 as u64) << 16)
        | ((mv.raw() as u64) << 32)
        | ((depth as u8 as u64) << 48)
        | ((bound as u64) << 56)
}

struct Storage {
    entries: Box<[AtomicU64]>,
    entry_count: usize,
    pending_init: bool,
}

/// 置換表
pub struct TranspositionTable {
    storage: RwLock<Storage>,
}

impl TranspositionTable {
    /// サイズだけ決めて生成。使う前に`finalize`を呼ぶこと。
    pub fn new(mib: usize) -> TranspositionTable {
        let tt = TranspositionTable {
            storage: RwLock::new(Storage {
                entries: Box::new([]),
                entry_count: 0,
                pending_init: true,
            }),
        };
        tt.resize(mib);
        tt
    }

    /// 新しいサイズを記録する。割り当ては`finalize`まで遅延する。
    pub fn resize(&self, mib: usize) {
        let bytes = mib * 1024 * 1024;
        let entries = bytes / std::mem::size_of::<AtomicU64>();

        let mut storage = self.storage.write().unwrap();
        if storage.entry_count != entries {
            storage.entries = Box::new([]);
            storage.entry_count = entries;
        }
        storage.pending_init = true;
    }

    /// 保留中の割り当てを実行する。実際に割り当てたらtrueを返す。
    pub fn finalize(&self) -> bool {
        let mut storage = self.storage.write().unwrap();
        if !storage.pending_init {
            return false;
        }
        storage.pending_init = false;

        let count = storage.entry_count;
        storage.entries = (0..count).map(|_| AtomicU64::new(0)).collect();
        log::debug!("transposition table allocated: {count} entries");
        true
    }

    fn index(count: usize, key: u64) -> usize {
        (((key as u128) * (count as u128)) >> 64) as usize
    }

    /// キーに対応するエントリを引く
    pub fn probe(&self, key: u64, ply: i32) -> Option<ProbedEntry> {
        let storage = self.storage.read().unwrap();
        debug_assert!(!storage.pending_init);

        if storage.entries.is_empty() {
            return None;
        }

        let raw = storage.entries[Self::index(storage.entry_count, key)].load(Ordering::Relaxed);

        if raw & 0xFFFF != key & 0xFFFF {
            return None;
        }

        Some(ProbedEntry {
            score: score_from_tt(((raw >> 16) as u16 as i16) as Score, ply),
            mv: Move::from_raw((raw >> 32) as u16),
            depth: ((raw >> 48) as u8) as i32,
            bound: Bound::from_u8((raw >> 56) as u8),
        })
    }

    /// 無条件上書きで格納する
    pub fn put(&self, key: u64, score: Score, mv: Move, depth: i32, ply: i32, bound: Bound) {
        debug_assert!((0..=MAX_DEPTH).contains(&depth));

        let storage = self.storage.read().unwrap();
        debug_assert!(!storage.pending_init);

        if storage.entries.is_empty() {
            return;
        }

        let packed = pack(key, score_to_tt(score, ply), mv, depth, bound);
        storage.entries[Self::index(storage.entry_count, key)].store(packed, Ordering::Relaxed);
    }

    /// 全エントリをゼロにする
    pub fn clear(&self) {
        let storage = self.storage.read().unwrap();
        for entry in storage.entries.iter() {
            entry.store(0, Ordering::Relaxed);
        }
    }

    /// 先頭1000エントリ中の使用率（パーミル）
    pub fn full_permille(&self) -> u32 {
        let storage = self.storage.read().unwrap();
        let sample = storage.entries.len().min(1000);
        let mut filled = 0;
        for entry in storage.entries[..sample].iter() {
            let raw = entry.load(Ordering::Relaxed);
            if Bound::from_u8((raw >> 56) as u8) != Bound::None {
                filled += 1;
            }
        }
        filled
    }
}
