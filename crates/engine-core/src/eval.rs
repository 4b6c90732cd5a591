//! 静的評価
//!
//! 手番側から見た駒割りと持ち駒価値に、自玉周りの密度による
//! 簡単な玉の安全度を加える。

use crate::attacks;
use crate::position::{Hand, Position};
use crate::types::{Color, PieceType, Score, SCORE_WIN};

/// 駒の価値
pub mod values {
    use crate::types::Score;

    pub const PAWN: Score = 100;
    pub const PROMOTED_PAWN: Score = 1000;
    pub const LANCE: Score = 400;
    pub const KNIGHT: Score = 500;
    pub const PROMOTED_LANCE: Score = 900;
    pub const PROMOTED_KNIGHT: Score = 900;
    pub const SILVER: Score = 600;
    pub const PROMOTED_SILVER: Score = 800;
    pub const GOLD: Score = 800;
    pub const BISHOP: Score = 1100;
    pub const ROOK: Score = 1300;
    pub const PROMOTED_BISHOP: Score = 1500;
    pub const PROMOTED_ROOK: Score = 1700;
}

/// 駒種の価値（玉は0）
pub const fn piece_value(pt: PieceType) -> Score {
    match pt {
        PieceType::Pawn => values::PAWN,
        PieceType::PromotedPawn => values::PROMOTED_PAWN,
        PieceType::Lance => values::LANCE,
        PieceType::Knight => values::KNIGHT,
        PieceType::PromotedLance => values::PROMOTED_LANCE,
        PieceType::PromotedKnight => values::PROMOTED_KNIGHT,
        PieceType::Silver => values::SILVER,
        PieceType::PromotedSilver => values::PROMOTED_SILVER,
        PieceType::Gold => values::GOLD,
        PieceType::Bishop => values::BISHOP,
        PieceType::Rook => values::ROOK,
        PieceType::PromotedBishop => values::PROMOTED_BISHOP,
        PieceType::PromotedRook => values::PROMOTED_ROOK,
        PieceType::King => 0,
    }
}

const KING_SAFETY_SCALE: Score = 60;

fn hand_value(hand: Hand) -> Score {
    if hand.is_empty() {
        return 0;
    }

    let mut value = 0;
    for pt in PieceType::HAND {
        value += hand.count(pt) as Score * piece_value(pt);
    }
    value
}

fn king_safety(pos: &Position, c: Color) -> Score {
    let ring = attacks::king_attacks(pos.king(c));
    let total = ring.count() as Score;
    let own = (ring & pos.color_bb(c)).count() as Score;
    // 密度を2乗して、囲いの完成に近いほど大きく効かせる
    KING_SAFETY_SCALE * own * own / (total * total)
}

/// 手番側から見た静的評価
pub fn static_eval(pos: &Position) -> Score {
    let stm = pos.stm();
    let nstm = stm.flip();

    let mut score: Score = 0;

    for pt in PieceType::ALL {
        if pt == PieceType::King {
            continue;
        }
        let count =
            pos.piece_bb(pt, stm).count() as Score - pos.piece_bb(pt, nstm).count() as Score;
        score += count * piece_value(pt);
    }

    score += hand_value(pos.hand(stm));
    score -= hand_value(pos.hand(nstm));

    score += king_safety(pos, stm);
    score -= king_safety(pos, nstm);

    score.clamp(-SCORE_WIN + 1, SCORE_WIN - 1)
}
