//! 静的交換評価（SEE）
//!
//! move.to()での取り合いを、常に最も安い駒から参加させて模擬し、
//! 指した側がthreshold以上得をするかを返す。駒を取り除いたときに
//! 現れる角・飛の間接利きも追加する。

use crate::attacks;
use crate::bitboard::Bitboard;
use crate::position::Position;
use crate::types::{Color, Move, PieceType, Score};

/// SEE用の駒価値（探索の評価値とは独立）
pub const fn see_value(pt: PieceType) -> Score {
    match pt {
        PieceType::Pawn => 100,
        PieceType::PromotedPawn => 1000,
        PieceType::Lance => 400,
        PieceType::Knight => 500,
        PieceType::PromotedLance => 900,
        PieceType::PromotedKnight => 900,
        PieceType::Silver => 600,
        PieceType::PromotedSilver => 800,
        PieceType::Gold => 800,
        PieceType::Bishop => 1100,
        PieceType::Rook => 1300,
        PieceType::PromotedBishop => 1500,
        PieceType::PromotedRook => 1700,
        PieceType::King => 0,
    }
}

/// 価値昇順（同値は駒種ID順）、玉は最後
const ORDERED_PIECES: [PieceType; PieceType::NUM] = [
    PieceType::Pawn,
    PieceType::Lance,
    PieceType::Knight,
    PieceType::Silver,
    PieceType::PromotedSilver,
    PieceType::Gold,
    PieceType::PromotedLance,
    PieceType::PromotedKnight,
    PieceType::PromotedPawn,
    PieceType::Bishop,
    PieceType::Rook,
    PieceType::PromotedBishop,
    PieceType::PromotedRook,
    PieceType::King,
];

fn gain(pos: &Position, mv: Move) -> Score {
    if mv.is_drop() {
        return see_value(mv.drop_piece_type());
    }

    let mut gain = match pos.piece_on(mv.to()) {
        Some(captured) => see_value(captured.piece_type()),
        None => 0,
    };

    if mv.is_promo() {
        let moving = pos.piece_on(mv.from()).expect("no piece on from-square");
        gain += see_value(moving.piece_type().promoted()) - see_value(moving.piece_type());
    }

    gain
}

fn pop_least_valuable(pos: &Position, occ: &mut Bitboard, attackers: Bitboard, c: Color) -> PieceType {
    for pt in ORDERED_PIECES {
        let pt_attackers = attackers & pos.piece_bb(pt, c);
        if !pt_attackers.is_empty() {
            *occ ^= pt_attackers.isolate_lsb();
            return pt;
        }
    }
    PieceType::King
}

/// sqに斜めから到達できる駒種か（取り除くと角筋が現れる側）
const fn can_move_diagonally(pt: PieceType) -> bool {
    matches!(
        pt,
        PieceType::PromotedLance
            | PieceType::PromotedKnight
            | PieceType::Silver
            | PieceType::PromotedSilver
            | PieceType::Gold
            | PieceType::Bishop
            | PieceType::PromotedBishop
            | PieceType::PromotedRook
    )
}

/// sqに縦横から到達できる駒種か（取り除くと飛筋が現れる側）
const fn can_move_orthogonally(pt: PieceType) -> bool {
    matches!(
        pt,
        PieceType::Pawn
            | PieceType::Lance
            | PieceType::PromotedLance
            | PieceType::PromotedKnight
            | PieceType::Silver
            | PieceType::PromotedSilver
            | PieceType::Gold
            | PieceType::Rook
            | PieceType::PromotedBishop
            | PieceType::PromotedRook
    )
}

/// 指し手の交換がthreshold以上の得になるか
pub fn see(pos: &Position, mv: Move, threshold: Score) -> bool {
    let stm = pos.stm();

    let mut score = gain(pos, mv) - threshold;

    if score < 0 {
        return false;
    }

    let mut next = if mv.is_drop() {
        mv.drop_piece_type()
    } else {
        pos.piece_on(mv.from()).expect("no piece on from-square").piece_type()
    };

    score -= see_value(next);

    if score >= 0 {
        return true;
    }

    let sq = mv.to();
    let mut occ = pos.occupancy() ^ Bitboard::from_square(sq);
    if !mv.is_drop() {
        occ ^= Bitboard::from_square(mv.from());
    }

    let bishops =
        pos.piece_type_bb(PieceType::Bishop) | pos.piece_type_bb(PieceType::PromotedBishop);
    let rooks = pos.piece_type_bb(PieceType::Rook) | pos.piece_type_bb(PieceType::PromotedRook);

    let mut attackers = pos.all_attackers_to(sq, occ);

    let mut curr = stm.flip();

    loop {
        let curr_attackers = attackers & pos.color_bb(curr);

        if curr_attackers.is_empty() {
            break;
        }

        next = pop_least_valuable(pos, &mut occ, curr_attackers, curr);

        if can_move_diagonally(next) {
            attackers |= attacks::bishop_attacks(sq, occ) & bishops;
        }

        if can_move_orthogonally(next) {
            attackers |= attacks::rook_attacks(sq, occ) & rooks;
        }

        attackers &= occ;

        score = -score - 1 - see_value(next);
        curr = curr.flip();

        if score >= 0 {
            // 玉で取り返した直後に相手の利きが残っているなら、その取り返しは成立しない
            if next == PieceType::King && !(attackers & pos.color_bb(curr)).is_empty() {
                curr = curr.flip();
            }
            break;
        }
    }

    curr != stm
}
