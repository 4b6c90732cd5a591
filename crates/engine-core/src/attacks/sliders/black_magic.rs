//! Black magic乗算バックエンド（移植性のためのフォールバック）
//!
//! idx = ((occupancy | !mask) * magic) >> shift。magicとshiftはオフラインで
//! 生成した定数（magics.rs）。テーブル構成はPEXTバックエンドと同一。

use std::sync::OnceLock;

use crate::bitboard::Bitboard;
use crate::types::{Color, Square};

use super::magics;
use super::{fill_table, lance_dirs, relevant_mask, PieceTable, SquareData, BISHOP_DIRS, ROOK_DIRS};

struct Tables {
    black_lance: PieceTable,
    white_lance: PieceTable,
    bishop: PieceTable,
    rook: PieceTable,
}

static TABLES: OnceLock<Tables> = OnceLock::new();

#[inline]
fn calc_idx(occ: Bitboard, mask: u128, magic: u128, shift: u32) -> usize {
    ((occ.raw() | !mask).wrapping_mul(magic) >> shift) as usize
}

fn build_piece(dirs: &[(i32, i32)], piece_magics: &[u128; 81], shifts: &[u32; 81]) -> PieceTable {
    let mut squares = [SquareData::default(); Square::NUM];
    let mut total = 0u32;
    for sq in Square::all() {
        let mask = relevant_mask(sq, dirs);
        squares[sq.index()] = SquareData {
            mask: mask.raw(),
            offset: total,
            shift: shifts[sq.index()],
        };
        total += 1u32 << (128 - shifts[sq.index()]);
    }

    let mut table = PieceTable {
        squares,
        attacks: vec![Bitboard::EMPTY; total as usize],
    };
    for sq in Square::all() {
        let magic = piece_magics[sq.index()];
        fill_table(&mut table, sq, dirs, move |data, occ| {
            calc_idx(occ, data.mask, magic, data.shift)
        });
    }
    table
}

fn tables() -> &'static Tables {
    TABLES.get_or_init(|| Tables {
        black_lance: build_piece(
            &lance_dirs(Color::Black),
            &magics::BLACK_LANCE_MAGICS,
            &magics::BLACK_LANCE_SHIFTS,
        ),
        white_lance: build_piece(
            &lance_dirs(Color::White),
            &magics::WHITE_LANCE_MAGICS,
            &magics::WHITE_LANCE_SHIFTS,
        ),
        bishop: build_piece(&BISHOP_DIRS, &magics::BISHOP_MAGICS, &magics::BISHOP_SHIFTS),
        rook: build_piece(&ROOK_DIRS, &magics::ROOK_MAGICS, &magics::ROOK_SHIFTS),
    })
}

#[inline]
fn lookup(table: &PieceTable, magic: u128, sq: Square, occ: Bitboard) -> Bitboard {
    let data = &table.squares[sq.index()];
    let idx = calc_idx(occ, data.mask, magic, data.shift);
    table.attacks[data.offset as usize + idx]
}

/// 香の利き
#[inline]
pub fn lance_attacks(c: Color, sq: Square, occ: Bitboard) -> Bitboard {
    let t = tables();
    match c {
        Color::Black => lookup(&t.black_lance, magics::BLACK_LANCE_MAGICS[sq.index()], sq, occ),
        Color::White => lookup(&t.white_lance, magics::WHITE_LANCE_MAGICS[sq.index()], sq, occ),
    }
}

/// 角の利き
#[inline]
pub fn bishop_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    lookup(&tables().bishop, magics::BISHOP_MAGICS[sq.index()], sq, occ)
}

/// 飛の利き
#[inline]
pub fn rook_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    lookup(&tables().rook, magics::ROOK_MAGICS[sq.index()], sq, occ)
}
