//! 遠方駒（香、角、飛）の利き計算
//!
//! `(square, masked occupancy)` から利きBitboardをO(1)で引く固定テーブル。
//! バックエンドは2種類（PEXT / black magic乗算）で、どちらも同じ
//! per-square データ形状（mask, offset, shift）とテーブル構成を共有し、
//! 同一入力に対して同一出力を返す。選択はビルド時のfeatureで行う。

// 両バックエンドとも常にコンパイルし、テストで突き合わせる
#[cfg_attr(not(feature = "black-magic"), allow(dead_code))]
mod black_magic;
#[cfg_attr(not(feature = "black-magic"), allow(dead_code))]
mod magics;
#[cfg_attr(feature = "black-magic", allow(dead_code))]
mod pext;

use crate::bitboard::Bitboard;
use crate::types::{Color, Square};

#[cfg(not(feature = "black-magic"))]
pub use pext::{bishop_attacks, lance_attacks, rook_attacks};

#[cfg(feature = "black-magic")]
pub use black_magic::{bishop_attacks, lance_attacks, rook_attacks};

/// 角の利き方向 (df, dr)
pub(crate) const BISHOP_DIRS: [(i32, i32); 4] = [(1, 1), (-1, 1), (1, -1), (-1, -1)];

/// 飛の利き方向 (df, dr)
pub(crate) const ROOK_DIRS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// 香の利き方向 (df, dr)
pub(crate) const fn lance_dirs(c: Color) -> [(i32, i32); 1] {
    match c {
        Color::Black => [(0, 1)],
        Color::White => [(0, -1)],
    }
}

/// 1方向の利き（ブロッカーを含む）を盤を走査して求める
pub(crate) fn ray_attacks(sq: Square, df: i32, dr: i32, occ: Bitboard) -> Bitboard {
    let mut out = Bitboard::EMPTY;
    let mut f = sq.file() as i32 + df;
    let mut r = sq.rank() as i32 + dr;
    while (0..9).contains(&f) && (0..9).contains(&r) {
        let t = Square::new(f as u8, r as u8);
        out.set(t);
        if occ.contains(t) {
            break;
        }
        f += df;
        r += dr;
    }
    out
}

/// 複数方向の利きを盤を走査して求める（テーブル構築・検証用）
pub(crate) fn sliding_attacks(sq: Square, dirs: &[(i32, i32)], occ: Bitboard) -> Bitboard {
    let mut out = Bitboard::EMPTY;
    for &(df, dr) in dirs {
        out |= ray_attacks(sq, df, dr, occ);
    }
    out
}

/// 関係する占有マスク（空盤面の利きから各方向の端の升を除いたもの）
pub(crate) fn relevant_mask(sq: Square, dirs: &[(i32, i32)]) -> Bitboard {
    let mut out = Bitboard::EMPTY;
    for &(df, dr) in dirs {
        let mut ray = ray_attacks(sq, df, dr, Bitboard::EMPTY);
        let mut f = sq.file() as i32;
        let mut r = sq.rank() as i32;
        while (0..9).contains(&(f + df)) && (0..9).contains(&(r + dr)) {
            f += df;
            r += dr;
        }
        if f != sq.file() as i32 || r != sq.rank() as i32 {
            ray.clear(Square::new(f as u8, r as u8));
        }
        out |= ray;
    }
    out
}

/// バックエンド共通のper-squareデータ
#[derive(Clone, Copy, Default)]
pub(crate) struct SquareData {
    pub mask: u128,
    pub offset: u32,
    pub shift: u32,
}

/// 1駒種分のテーブル
pub(crate) struct PieceTable {
    pub squares: [SquareData; Square::NUM],
    pub attacks: Vec<Bitboard>,
}

/// maskの部分集合を昇順キャリー順で列挙しつつテーブルを埋める
pub(crate) fn fill_table(
    table: &mut PieceTable,
    sq: Square,
    dirs: &[(i32, i32)],
    index_of: impl Fn(&SquareData, Bitboard) -> usize,
) {
    let data = table.squares[sq.index()];
    let mask = Bitboard::from_raw(data.mask);
    let mut subset = Bitboard::EMPTY;
    loop {
        let idx = index_of(&data, subset);
        table.attacks[data.offset as usize + idx] = sliding_attacks(sq, dirs, subset);
        subset = Bitboard::from_raw(subset.raw().wrapping_sub(mask.raw()) & mask.raw());
        if subset.is_empty() {
            break;
        }
    }
}
