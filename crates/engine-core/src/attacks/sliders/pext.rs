//! PEXTバックエンド
//!
//! idx = extract(occupancy, mask)。BMI2が使えるターゲットではハードウェアの
//! pext命令を2回に分けて使い、それ以外では同じ意味のビット抽出をソフトで行う。

use std::sync::OnceLock;

use crate::bitboard::Bitboard;
use crate::types::{Color, Square};

use super::{fill_table, lance_dirs, relevant_mask, PieceTable, SquareData, BISHOP_DIRS, ROOK_DIRS};

#[cfg(all(target_arch = "x86_64", target_feature = "bmi2"))]
#[inline]
fn pext_u128(value: u128, mask: u128) -> u64 {
    // SAFETY: target_feature = "bmi2" が有効なターゲットでのみコンパイルされる
    unsafe {
        use std::arch::x86_64::_pext_u64;
        let lo = _pext_u64(value as u64, mask as u64);
        let hi = _pext_u64((value >> 64) as u64, (mask >> 64) as u64);
        lo | (hi << (mask as u64).count_ones())
    }
}

#[cfg(not(all(target_arch = "x86_64", target_feature = "bmi2")))]
#[inline]
fn pext_u128(value: u128, mask: u128) -> u64 {
    let mut result = 0u64;
    let mut bit = 0u32;
    let mut m = mask;
    while m != 0 {
        let ls = m & m.wrapping_neg();
        if value & ls != 0 {
            result |= 1 << bit;
        }
        bit += 1;
        m &= m - 1;
    }
    result
}

struct Tables {
    black_lance: PieceTable,
    white_lance: PieceTable,
    bishop: PieceTable,
    rook: PieceTable,
}

static TABLES: OnceLock<Tables> = OnceLock::new();

fn index_of(data: &SquareData, occ: Bitboard) -> usize {
    pext_u128(occ.raw(), data.mask) as usize
}

fn build_piece(dirs: &[(i32, i32)]) -> PieceTable {
    let mut squares = [SquareData::default(); Square::NUM];
    let mut total = 0u32;
    for sq in Square::all() {
        let mask = relevant_mask(sq, dirs);
        let bits = mask.count();
        squares[sq.index()] = SquareData {
            mask: mask.raw(),
            offset: total,
            shift: bits,
        };
        total += 1 << bits;
    }

    let mut table = PieceTable {
        squares,
        attacks: vec![Bitboard::EMPTY; total as usize],
    };
    for sq in Square::all() {
        fill_table(&mut table, sq, dirs, index_of);
    }
    table
}

fn tables() -> &'static Tables {
    TABLES.get_or_init(|| Tables {
        black_lance: build_piece(&lance_dirs(Color::Black)),
        white_lance: build_piece(&lance_dirs(Color::White)),
        bishop: build_piece(&BISHOP_DIRS),
        rook: build_piece(&ROOK_DIRS),
    })
}

#[inline]
fn lookup(table: &PieceTable, sq: Square, occ: Bitboard) -> Bitboard {
    let data = &table.squares[sq.index()];
    let idx = pext_u128(occ.raw(), data.mask) as usize;
    table.attacks[data.offset as usize + idx]
}

/// 香の利き
#[inline]
pub fn lance_attacks(c: Color, sq: Square, occ: Bitboard) -> Bitboard {
    let t = tables();
    match c {
        Color::Black => lookup(&t.black_lance, sq, occ),
        Color::White => lookup(&t.white_lance, sq, occ),
    }
}

/// 角の利き
#[inline]
pub fn bishop_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    lookup(&tables().bishop, sq, occ)
}

/// 飛の利き
#[inline]
pub fn rook_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    lookup(&tables().rook, sq, occ)
}
