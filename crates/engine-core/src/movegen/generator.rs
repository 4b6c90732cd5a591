//! 疑似合法手の生成
//!
//! 行き先マスクで生成対象を絞る。王手がかかっている局面では
//! 玉の移動を先に生成し、単独王手なら遮断・取りに限定する。

use crate::attacks;
use crate::bitboard::{offsets, Bitboard};
use crate::position::Position;
use crate::rays::ray_between;
use crate::types::{Color, Move, PieceType, Square};

use super::MoveList;

fn serialize_normals_offset(dst: &mut MoveList, offset: i32, mut attacks: Bitboard) {
    while !attacks.is_empty() {
        let to = attacks.pop();
        dst.push(Move::new_normal(to.offset(-offset), to));
    }
}

fn serialize_promotions_offset(dst: &mut MoveList, offset: i32, mut attacks: Bitboard) {
    while !attacks.is_empty() {
        let to = attacks.pop();
        dst.push(Move::new_promotion(to.offset(-offset), to));
    }
}

fn serialize_normals(dst: &mut MoveList, from: Square, mut attacks: Bitboard) {
    while !attacks.is_empty() {
        dst.push(Move::new_normal(from, attacks.pop()));
    }
}

fn serialize_promotions(dst: &mut MoveList, from: Square, mut attacks: Bitboard) {
    while !attacks.is_empty() {
        dst.push(Move::new_promotion(from, attacks.pop()));
    }
}

fn serialize_drops(dst: &mut MoveList, pt: PieceType, mut targets: Bitboard) {
    while !targets.is_empty() {
        dst.push(Move::new_drop(pt, targets.pop()));
    }
}

/// 成れる駒の共通生成。targetは行き先の最終マスク（自駒除外済み）。
fn generate_piece_moves(
    dst: &mut MoveList,
    stm: Color,
    pieces: Bitboard,
    can_promote: bool,
    attack_getter: impl Fn(Square) -> Bitboard,
    target: Bitboard,
    non_promo_mask: Bitboard,
) {
    let promo_area = Bitboard::promo_area(stm);

    if can_promote {
        // 敵陣内への移動は常に成れる
        let mut movable = pieces;
        while !movable.is_empty() {
            let from = movable.pop();
            serialize_promotions(dst, from, attack_getter(from) & target & promo_area);
        }

        // 敵陣内からは外へ出る移動でも成れる
        let mut movable = pieces & promo_area;
        while !movable.is_empty() {
            let from = movable.pop();
            serialize_promotions(dst, from, attack_getter(from) & target & !promo_area);
        }
    }

    let mut movable = pieces;
    while !movable.is_empty() {
        let from = movable.pop();
        serialize_normals(dst, from, attack_getter(from) & target & non_promo_mask);
    }
}

fn generate_pawns(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    let stm = pos.stm();
    let pawns = pos.piece_bb(PieceType::Pawn, stm);

    let shifted = pawns.shift_north_relative(stm) & target;

    let promos = shifted & Bitboard::promo_area(stm);
    let non_promos = shifted & !Bitboard::relative_rank(stm, 8);

    let offset = offsets::relative(stm, offsets::NORTH);

    serialize_promotions_offset(dst, offset, promos);
    serialize_normals_offset(dst, offset, non_promos);
}

fn generate_lances(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    let stm = pos.stm();
    let occ = pos.occupancy();
    let mut lances = pos.piece_bb(PieceType::Lance, stm);

    let promo_area = Bitboard::promo_area(stm);
    let non_promo_mask = !Bitboard::relative_rank(stm, 8);

    while !lances.is_empty() {
        let from = lances.pop();
        let att = attacks::lance_attacks(stm, from, occ) & target;
        // 香は前にしか動けないので、成れるのは行き先が敵陣のときだけ
        serialize_promotions(dst, from, att & promo_area);
        serialize_normals(dst, from, att & non_promo_mask);
    }
}

fn generate_knights(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    let stm = pos.stm();
    let knights = pos.piece_bb(PieceType::Knight, stm);
    let non_promo_mask = !(Bitboard::relative_rank(stm, 8) | Bitboard::relative_rank(stm, 7));
    generate_piece_moves(
        dst,
        stm,
        knights,
        true,
        |sq| attacks::knight_attacks(stm, sq),
        target,
        non_promo_mask,
    );
}

fn generate_silvers(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    let stm = pos.stm();
    let silvers = pos.piece_bb(PieceType::Silver, stm);
    generate_piece_moves(
        dst,
        stm,
        silvers,
        true,
        |sq| attacks::silver_attacks(stm, sq),
        target,
        Bitboard::ALL,
    );
}

fn generate_golds(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    let stm = pos.stm();
    let golds = pos.piece_bb(PieceType::Gold, stm)
        | pos.piece_bb(PieceType::PromotedPawn, stm)
        | pos.piece_bb(PieceType::PromotedLance, stm)
        | pos.piece_bb(PieceType::PromotedKnight, stm)
        | pos.piece_bb(PieceType::PromotedSilver, stm);
    generate_piece_moves(
        dst,
        stm,
        golds,
        false,
        |sq| attacks::gold_attacks(stm, sq),
        target,
        Bitboard::ALL,
    );
}

fn generate_bishops(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    let stm = pos.stm();
    let occ = pos.occupancy();
    let bishops = pos.piece_bb(PieceType::Bishop, stm);
    generate_piece_moves(
        dst,
        stm,
        bishops,
        true,
        |sq| attacks::bishop_attacks(sq, occ),
        target,
        Bitboard::ALL,
    );
}

fn generate_rooks(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    let stm = pos.stm();
    let occ = pos.occupancy();
    let rooks = pos.piece_bb(PieceType::Rook, stm);
    generate_piece_moves(
        dst,
        stm,
        rooks,
        true,
        |sq| attacks::rook_attacks(sq, occ),
        target,
        Bitboard::ALL,
    );
}

fn generate_horses(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    let stm = pos.stm();
    let occ = pos.occupancy();
    let horses = pos.piece_bb(PieceType::PromotedBishop, stm);
    generate_piece_moves(
        dst,
        stm,
        horses,
        false,
        |sq| attacks::horse_attacks(sq, occ),
        target,
        Bitboard::ALL,
    );
}

fn generate_dragons(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    let stm = pos.stm();
    let occ = pos.occupancy();
    let dragons = pos.piece_bb(PieceType::PromotedRook, stm);
    generate_piece_moves(
        dst,
        stm,
        dragons,
        false,
        |sq| attacks::dragon_attacks(sq, occ),
        target,
        Bitboard::ALL,
    );
}

fn generate_kings(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    let stm = pos.stm();
    let from = pos.king(stm);
    serialize_normals(dst, from, attacks::king_attacks(from) & target);
}

fn generate_board_moves(dst: &mut MoveList, pos: &Position, target: Bitboard) {
    generate_pawns(dst, pos, target);
    generate_lances(dst, pos, target);
    generate_knights(dst, pos, target);
    generate_silvers(dst, pos, target);
    generate_golds(dst, pos, target);
    generate_bishops(dst, pos, target);
    generate_rooks(dst, pos, target);
    generate_horses(dst, pos, target);
    generate_dragons(dst, pos, target);
}

fn generate_drops(dst: &mut MoveList, pos: &Position, targets: Bitboard) {
    let stm = pos.stm();
    let hand = pos.hand(stm);

    if hand.is_empty() || targets.is_empty() {
        return;
    }

    let last_rank = Bitboard::relative_rank(stm, 8);
    let last_two_ranks = last_rank | Bitboard::relative_rank(stm, 7);

    let mut gen = |pt: PieceType, restriction: Bitboard| {
        if hand.count(pt) > 0 {
            serialize_drops(dst, pt, targets & restriction);
        }
    };

    gen(
        PieceType::Pawn,
        !last_rank & !pos.piece_bb(PieceType::Pawn, stm).fill_file(),
    );
    gen(PieceType::Lance, !last_rank);
    gen(PieceType::Knight, !last_two_ranks);
    gen(PieceType::Silver, Bitboard::ALL);
    gen(PieceType::Gold, Bitboard::ALL);
    gen(PieceType::Bishop, Bitboard::ALL);
    gen(PieceType::Rook, Bitboard::ALL);
}

fn generate(dst: &mut MoveList, pos: &Position, mask: Bitboard) {
    let stm = pos.stm();
    let board_target = mask & !pos.color_bb(stm);
    let empty = !pos.occupancy();

    if pos.is_in_check() {
        // 玉の移動を先に
        generate_kings(dst, pos, board_target);

        if pos.checkers().exactly_one() {
            let checker = pos.checkers().lsb_unchecked();
            let block = ray_between(pos.king(stm), checker);
            let restrict = block | Bitboard::from_square(checker);

            generate_board_moves(dst, pos, board_target & restrict);
            generate_drops(dst, pos, empty & mask & block);
        }
        // 両王手は玉を動かすしかない
        return;
    }

    generate_board_moves(dst, pos, board_target);
    generate_kings(dst, pos, board_target);
    generate_drops(dst, pos, empty & mask);
}

/// 全ての疑似合法手
pub fn generate_all(dst: &mut MoveList, pos: &Position) {
    generate(dst, pos, Bitboard::ALL);
}

/// 駒を取る疑似合法手
pub fn generate_captures(dst: &mut MoveList, pos: &Position) {
    generate(dst, pos, pos.color_bb(pos.stm().flip()));
}

/// 駒を取らない疑似合法手（駒打ちを含む）
pub fn generate_non_captures(dst: &mut MoveList, pos: &Position) {
    generate(dst, pos, !pos.occupancy());
}

/// 指定升への取り返し
pub fn generate_recaptures(dst: &mut MoveList, pos: &Position, capture_sq: Square) {
    generate(dst, pos, Bitboard::from_square(capture_sq));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legal_count(pos: &Position) -> usize {
        let mut moves = MoveList::new();
        generate_all(&mut moves, pos);
        moves.iter().filter(|&&mv| pos.is_legal(mv)).count()
    }

    #[test]
    fn test_startpos_has_30_legal_moves() {
        assert_eq!(legal_count(&Position::startpos()), 30);
    }

    #[test]
    fn test_captures_are_subset_of_all() {
        let pos = Position::from_sfen("8l/1l+R2P3/p2pBG1pp/kps1p4/Nn1P2G2/P1P1P2PP/1PS6/1KSG3+r1/LN2+p3L w Sbgn3p 124")
            .unwrap();

        let mut all = MoveList::new();
        generate_all(&mut all, &pos);
        let mut captures = MoveList::new();
        generate_captures(&mut captures, &pos);
        let mut quiets = MoveList::new();
        generate_non_captures(&mut quiets, &pos);

        assert_eq!(all.len(), captures.len() + quiets.len());
        for &mv in &captures {
            assert!(pos.is_capture(mv));
            assert!(all.contains(mv));
        }
        for &mv in &quiets {
            assert!(!pos.is_capture(mv));
            assert!(all.contains(mv));
        }
    }

    #[test]
    fn test_recaptures_target_single_square() {
        // 5eで駒がぶつかっている局面を作る
        let pos = Position::from_sfen("4k4/9/9/4p4/9/4P4/9/9/4K4 b - 1").unwrap();
        let pos = pos.apply_move(Move::from_usi("5f5e").unwrap());
        // 後手が5eの歩を取り返す手だけが生成される
        let mut recaps = MoveList::new();
        generate_recaptures(&mut recaps, &pos, Square::from_usi("5e").unwrap());
        assert!(!recaps.is_empty());
        for &mv in &recaps {
            assert_eq!(mv.to(), Square::from_usi("5e").unwrap());
            assert!(pos.is_capture(mv));
        }
    }

    #[test]
    fn test_mandatory_promotions_suppress_non_promotion() {
        // 先手の歩が2段目: 1aへは成りしか生成されない
        let pos = Position::from_sfen("4k4/6P2/9/9/9/9/9/9/4K4 b - 1").unwrap();
        let mut moves = MoveList::new();
        generate_all(&mut moves, &pos);
        let pawn_moves: Vec<Move> = moves
            .iter()
            .copied()
            .filter(|m| !m.is_drop() && m.from() == Square::from_usi("3b").unwrap())
            .collect();
        assert_eq!(pawn_moves.len(), 1);
        assert!(pawn_moves[0].is_promo());
    }

    #[test]
    fn test_optional_promotion_emits_both() {
        // 3段目への歩の移動は成り・不成の両方
        let pos = Position::from_sfen("4k4/9/9/6P2/9/9/9/9/4K4 b - 1").unwrap();
        let mut moves = MoveList::new();
        generate_all(&mut moves, &pos);
        let pawn_moves: Vec<Move> = moves
            .iter()
            .copied()
            .filter(|m| !m.is_drop() && m.from() == Square::from_usi("3d").unwrap())
            .collect();
        assert_eq!(pawn_moves.len(), 2);
        assert!(pawn_moves.iter().any(|m| m.is_promo()));
        assert!(pawn_moves.iter().any(|m| !m.is_promo()));
    }

    #[test]
    fn test_knight_drop_restrictions() {
        let pos = Position::from_sfen("4k4/9/9/9/9/9/9/9/4K4 b N 1").unwrap();
        let mut moves = MoveList::new();
        generate_all(&mut moves, &pos);
        for &mv in &moves {
            if mv.is_drop() && mv.drop_piece_type() == PieceType::Knight {
                // 一段目・二段目には打てない
                assert!(mv.to().rank() < 7, "illegal knight drop to {}", mv.to());
            }
        }
        // 打てる升は7段 × 9筋から玉のいない79升のうち盤上の空きのみ
        let knight_drops = moves
            .iter()
            .filter(|m| m.is_drop() && m.drop_piece_type() == PieceType::Knight)
            .count();
        assert_eq!(knight_drops, 62);
    }

    #[test]
    fn test_evasion_generation_multi_check_king_only() {
        // 飛と角の両王手
        let pos = Position::from_sfen("4k4/9/9/9/8b/9/9/4r4/4KP3 b - 1").unwrap();
        assert!(pos.checkers().more_than_one());
        let mut moves = MoveList::new();
        generate_all(&mut moves, &pos);
        for &mv in &moves {
            assert!(!mv.is_drop());
            assert_eq!(mv.from(), pos.king(Color::Black));
        }
    }

    #[test]
    fn test_evasion_generation_single_check() {
        // 飛の単独王手: 玉移動・合駒・取りを生成
        let pos = Position::from_sfen("4k4/9/9/9/4r4/9/9/9/4K3L b G 1").unwrap();
        assert!(pos.checkers().exactly_one());
        let mut moves = MoveList::new();
        generate_all(&mut moves, &pos);

        let king = pos.king(Color::Black);
        let checker = pos.checkers().lsb_unchecked();
        for &mv in &moves {
            if mv.is_drop() {
                // 合駒は王手の遮断升のみ
                assert!(ray_between(king, checker).contains(mv.to()));
            } else if mv.from() != king {
                // 玉以外の移動は遮断か王手駒の取り
                let ok = ray_between(king, checker).contains(mv.to()) || mv.to() == checker;
                assert!(ok, "bad evasion {mv}");
            }
        }
        // 金打ちの合駒は玉と飛の間の空き升（5f, 5g, 5h）のみ
        let gold_drops = moves
            .iter()
            .filter(|m| m.is_drop() && m.drop_piece_type() == PieceType::Gold)
            .count();
        assert_eq!(gold_drops, 3);
    }

    #[test]
    fn test_nifu_suppressed_in_generation() {
        // 先手が5筋に歩を持っている: 5筋への歩打ちは生成されない
        let pos = Position::from_sfen("4k4/9/9/9/9/9/4P4/9/4K4 b P 1").unwrap();
        let mut moves = MoveList::new();
        generate_all(&mut moves, &pos);
        for &mv in &moves {
            if mv.is_drop() && mv.drop_piece_type() == PieceType::Pawn {
                assert_ne!(mv.to().file(), Square::from_usi("5e").unwrap().file());
            }
        }
    }
}
