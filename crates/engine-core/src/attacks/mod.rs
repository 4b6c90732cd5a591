//! 駒の利き生成
//!
//! 跳ばない駒は手番別の81升テーブル、遠方駒はsliders配下の固定テーブルを引く。

pub mod sliders;

use crate::bitboard::Bitboard;
use crate::types::{Color, PieceType, Square};

const fn or(a: Bitboard, b: Bitboard) -> Bitboard {
    Bitboard::from_raw(a.raw() | b.raw())
}

macro_rules! build_sided {
    ($f:ident) => {{
        let mut out = [[Bitboard::EMPTY; Square::NUM]; Color::NUM];
        let mut idx = 0u8;
        while idx < 81 {
            // SAFETY: idx < 81
            let bit = Bitboard::from_square(unsafe { Square::from_u8_unchecked(idx) });
            out[0][idx as usize] = $f(bit, Color::Black);
            out[1][idx as usize] = $f(bit, Color::White);
            idx += 1;
        }
        out
    }};
}

const fn pawn_attack(bit: Bitboard, c: Color) -> Bitboard {
    bit.shift_north_relative(c)
}

const fn knight_attack(bit: Bitboard, c: Color) -> Bitboard {
    or(
        bit.shift_north_relative(c).shift_north_west_relative(c),
        bit.shift_north_relative(c).shift_north_east_relative(c),
    )
}

const fn silver_attack(bit: Bitboard, c: Color) -> Bitboard {
    or(
        or(
            or(bit.shift_north_west(), bit.shift_north_east()),
            or(bit.shift_south_west(), bit.shift_south_east()),
        ),
        bit.shift_north_relative(c),
    )
}

const fn gold_attack(bit: Bitboard, c: Color) -> Bitboard {
    or(
        or(
            or(bit.shift_north(), bit.shift_south()),
            or(bit.shift_west(), bit.shift_east()),
        ),
        or(bit.shift_north_west_relative(c), bit.shift_north_east_relative(c)),
    )
}

const fn king_attack(bit: Bitboard, _c: Color) -> Bitboard {
    or(
        or(
            or(bit.shift_north(), bit.shift_south()),
            or(bit.shift_west(), bit.shift_east()),
        ),
        or(
            or(bit.shift_north_west(), bit.shift_north_east()),
            or(bit.shift_south_west(), bit.shift_south_east()),
        ),
    )
}

/// 歩の利き [Color][Square]
static PAWN_ATTACKS: [[Bitboard; Square::NUM]; Color::NUM] = build_sided!(pawn_attack);

/// 桂の利き [Color][Square]
static KNIGHT_ATTACKS: [[Bitboard; Square::NUM]; Color::NUM] = build_sided!(knight_attack);

/// 銀の利き [Color][Square]
static SILVER_ATTACKS: [[Bitboard; Square::NUM]; Color::NUM] = build_sided!(silver_attack);

/// 金の利き [Color][Square]（成小駒も共用）
static GOLD_ATTACKS: [[Bitboard; Square::NUM]; Color::NUM] = build_sided!(gold_attack);

/// 玉の利き [Color][Square]（両手番で同一）
static KING_ATTACKS: [[Bitboard; Square::NUM]; Color::NUM] = build_sided!(king_attack);

#[inline]
pub fn pawn_attacks(c: Color, sq: Square) -> Bitboard {
    PAWN_ATTACKS[c.index()][sq.index()]
}

#[inline]
pub fn knight_attacks(c: Color, sq: Square) -> Bitboard {
    KNIGHT_ATTACKS[c.index()][sq.index()]
}

#[inline]
pub fn silver_attacks(c: Color, sq: Square) -> Bitboard {
    SILVER_ATTACKS[c.index()][sq.index()]
}

#[inline]
pub fn gold_attacks(c: Color, sq: Square) -> Bitboard {
    GOLD_ATTACKS[c.index()][sq.index()]
}

#[inline]
pub fn king_attacks(sq: Square) -> Bitboard {
    KING_ATTACKS[0][sq.index()]
}

#[inline]
pub fn lance_attacks(c: Color, sq: Square, occ: Bitboard) -> Bitboard {
    sliders::lance_attacks(c, sq, occ)
}

#[inline]
pub fn bishop_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    sliders::bishop_attacks(sq, occ)
}

#[inline]
pub fn rook_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    sliders::rook_attacks(sq, occ)
}

/// 馬の利き（角 + 玉）
#[inline]
pub fn horse_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    bishop_attacks(sq, occ) | king_attacks(sq)
}

/// 竜の利き（飛 + 玉）
#[inline]
pub fn dragon_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    rook_attacks(sq, occ) | king_attacks(sq)
}

/// 任意の駒種の利き
pub fn piece_attacks(pt: PieceType, sq: Square, c: Color, occ: Bitboard) -> Bitboard {
    match pt {
        PieceType::Pawn => pawn_attacks(c, sq),
        PieceType::Lance => lance_attacks(c, sq, occ),
        PieceType::Knight => knight_attacks(c, sq),
        PieceType::Silver => silver_attacks(c, sq),
        PieceType::Gold
        | PieceType::PromotedPawn
        | PieceType::PromotedLance
        | PieceType::PromotedKnight
        | PieceType::PromotedSilver => gold_attacks(c, sq),
        PieceType::Bishop => bishop_attacks(sq, occ),
        PieceType::Rook => rook_attacks(sq, occ),
        PieceType::PromotedBishop => horse_attacks(sq, occ),
        PieceType::PromotedRook => dragon_attacks(sq, occ),
        PieceType::King => king_attacks(sq),
    }
}
