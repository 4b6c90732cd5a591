//! 局面の普遍条件をランダム自己対局で検査する

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use engine_core::movegen::{self, MoveList};
use engine_core::position::{Position, SennichiteStatus};
use engine_core::types::{Color, Move, PieceType, Square};

fn legal_moves(pos: &Position) -> Vec<Move> {
    let mut generated = MoveList::new();
    movegen::generate_all(&mut generated, pos);
    generated
        .iter()
        .copied()
        .filter(|&mv| pos.is_legal(mv))
        .collect()
}

fn total_pieces(pos: &Position, pt: PieceType) -> u32 {
    let mut on_board = 0;
    for sq in Square::all() {
        if let Some(piece) = pos.piece_on(sq) {
            if piece.piece_type().unpromoted() == pt {
                on_board += 1;
            }
        }
    }
    on_board + pos.hand(Color::Black).count(pt) + pos.hand(Color::White).count(pt)
}

fn assert_invariants(pos: &Position) {
    // ハッシュの差分更新はゼロから再計算した値と一致する
    assert_eq!(pos.key(), pos.regenerated_key());

    // SFENの往復
    let sfen = pos.sfen();
    let reparsed = Position::from_sfen(&sfen).unwrap();
    assert_eq!(reparsed.sfen(), sfen);
    assert_eq!(reparsed.key(), pos.key());

    // 玉は双方ちょうど1枚
    assert_eq!(pos.piece_bb(PieceType::King, Color::Black).count(), 1);
    assert_eq!(pos.piece_bb(PieceType::King, Color::White).count(), 1);

    // mailboxとbitboardの整合
    let occ = pos.occupancy();
    for sq in Square::all() {
        match pos.piece_on(sq) {
            Some(piece) => {
                assert!(occ.contains(sq));
                assert!(pos.color_bb(piece.color()).contains(sq));
                assert!(pos.piece_type_bb(piece.piece_type()).contains(sq));
            }
            None => assert!(!occ.contains(sq)),
        }
    }

    // checkersは手番の玉への攻撃駒と一致する
    let stm = pos.stm();
    let nstm = stm.flip();
    assert_eq!(pos.checkers(), pos.attackers_to(pos.king(stm), nstm));

    // 攻撃判定の対称性
    for sq in [pos.king(stm), pos.king(nstm), Square::new(4, 4)] {
        for c in Color::ALL {
            assert_eq!(
                pos.is_attacked(sq, c, occ),
                !pos.attackers_to(sq, c).is_empty()
            );
        }
    }

    // ピンの定義: 王手がかかっていなければ、その駒を取り除くと玉に利きが通る
    if !pos.is_in_check() {
        let mut own = pos.color_bb(stm);
        while !own.is_empty() {
            let sq = own.pop();
            if pos.piece_on(sq).unwrap().piece_type() == PieceType::King {
                continue;
            }
            let without = occ ^ engine_core::Bitboard::from_square(sq);
            let exposes = pos.is_attacked(pos.king(stm), nstm, without);
            assert_eq!(
                pos.pinned().contains(sq),
                exposes,
                "pin mismatch at {sq} in {}",
                pos.sfen()
            );
        }
    }

    // 持ち駒を含めた駒数の保存
    for (pt, expected) in [
        (PieceType::Pawn, 18),
        (PieceType::Lance, 4),
        (PieceType::Knight, 4),
        (PieceType::Silver, 4),
        (PieceType::Gold, 4),
        (PieceType::Bishop, 2),
        (PieceType::Rook, 2),
        (PieceType::King, 2),
    ] {
        assert_eq!(total_pieces(pos, pt), expected, "conservation of {pt:?}");
    }
}

#[test]
fn test_invariants_hold_through_random_games() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x5EED);

    for _ in 0..20 {
        let mut pos = Position::startpos();
        assert_invariants(&pos);

        for _ in 0..120 {
            let moves = legal_moves(&pos);
            if moves.is_empty() {
                break;
            }

            let mv = moves[rng.random_range(0..moves.len())];

            // 指し手文字列の往復
            assert_eq!(Move::from_usi(&mv.to_usi()).unwrap(), mv);
            assert_eq!(Move::from_uci(&mv.to_uci()).unwrap(), mv);

            pos = pos.apply_move(mv);
            assert_invariants(&pos);
        }
    }
}

#[test]
fn test_null_move_hash_laws() {
    let pos = Position::startpos();

    // null moveは手番のビットだけを反転する
    let null = pos.apply_null_move();
    assert_eq!(null.key(), pos.key() ^ engine_core::position::zobrist::stm());

    // 2回のnull moveでキーは元に戻る
    assert_eq!(null.apply_null_move().key(), pos.key());
}

#[test]
fn test_nifu_rejected() {
    // 先手の歩が5筋にある局面では、5筋への歩打ちは疑似合法ですらない
    let pos = Position::from_sfen("4k4/9/9/9/9/9/4P4/9/4K4 b P 1").unwrap();

    let drop = Move::from_usi("P*5e").unwrap();
    assert!(!pos.is_pseudolegal(drop));

    // 他の筋へは打てる
    let ok = Move::from_usi("P*4e").unwrap();
    assert!(pos.is_pseudolegal(ok));
    assert!(pos.is_legal(ok));
}

#[test]
fn test_pawn_drop_mate_rejected() {
    // 歩を打つと即詰みになる形: 打ち歩詰めで不可
    let pos = Position::from_sfen("3lkl3/9/3G1G3/9/9/9/9/9/K8 b P 1").unwrap();
    let drop = Move::from_usi("P*5b").unwrap();
    assert!(pos.is_pseudolegal(drop));
    assert!(!pos.is_legal(drop));

    // 同じ形でも逃げ道があれば打てる
    let pos = Position::from_sfen("3lkl3/9/3G5/9/9/9/9/9/K8 b P 1").unwrap();
    assert!(pos.is_legal(drop));
}

#[test]
fn test_mandatory_promotion_pseudolegality() {
    let pos = Position::from_sfen("4k4/6P2/9/9/9/9/9/9/4K4 b - 1").unwrap();
    // 二段目の歩が一段目へ不成で進むことはできない
    assert!(!pos.is_pseudolegal(Move::from_usi("3b3a").unwrap()));
    assert!(pos.is_pseudolegal(Move::from_usi("3b3a+").unwrap()));
}

#[test]
fn test_sennichite_perpetual_check() {
    // 飛車が4筋と5筋で王手を繰り返し、玉が往復する
    let start = Position::from_sfen("5k3/9/9/9/4R4/9/9/9/K8 b - 1").unwrap();
    let cycle = ["5e4e", "4a5a", "4e5e", "5a4a"];

    let mut pos = start.clone();
    let mut history: Vec<u64> = Vec::new();

    let mut statuses = Vec::new();
    for mv in cycle.iter().cycle().take(13) {
        history.push(pos.key());
        pos = pos.apply_move(Move::from_usi(mv).unwrap());
        statuses.push(pos.test_sennichite(false, &history, 16));
    }

    // 12手目で玉側から見た同一局面が4回目: 連続王手ではないのでDraw
    for status in &statuses[..11] {
        assert_eq!(*status, SennichiteStatus::None);
    }
    assert_eq!(statuses[11], SennichiteStatus::Draw);
    // 13手目の王手で、王手をかけられ続けた側の同一局面が4回目: 王手側の反則
    assert_eq!(statuses[12], SennichiteStatus::Win);
}

#[test]
fn test_sennichite_cute_chess_workaround() {
    let start = Position::from_sfen("5k3/9/9/9/4R4/9/9/9/K8 b - 1").unwrap();
    let cycle = ["5e4e", "4a5a", "4e5e", "5a4a"];

    let mut pos = start.clone();
    let mut history: Vec<u64> = Vec::new();

    let mut statuses = Vec::new();
    for mv in cycle.iter().cycle().take(13) {
        history.push(pos.key());
        pos = pos.apply_move(Move::from_usi(mv).unwrap());
        statuses.push(pos.test_sennichite(true, &history, 16));
    }

    // 互換モードでは「今王手がかかっているか」だけで判定する
    assert_eq!(statuses[11], SennichiteStatus::Draw);
    assert_eq!(statuses[12], SennichiteStatus::Win);
}

#[test]
fn test_sennichite_plain_repetition_is_draw() {
    // 王手なしの往復
    let start = Position::from_sfen("4k4/9/9/9/9/9/9/9/4K4 b - 1").unwrap();
    let cycle = ["5i4i", "5a4a", "4i5i", "4a5a"];

    let mut pos = start.clone();
    let mut history: Vec<u64> = Vec::new();

    let mut last = SennichiteStatus::None;
    for mv in cycle.iter().cycle().take(12) {
        history.push(pos.key());
        pos = pos.apply_move(Move::from_usi(mv).unwrap());
        last = pos.test_sennichite(false, &history, 16);
    }
    assert_eq!(last, SennichiteStatus::Draw);
}

#[test]
fn test_sennichite_outside_window_ignored() {
    // 繰り返しが窓の外に出るほど昔なら検出されない
    let start = Position::from_sfen("5k3/9/9/9/4R4/9/9/9/K8 b - 1").unwrap();
    let cycle = ["5e4e", "4a5a", "4e5e", "5a4a"];

    let mut pos = start.clone();
    let mut history: Vec<u64> = Vec::new();
    for mv in cycle.iter().cycle().take(13) {
        history.push(pos.key());
        pos = pos.apply_move(Move::from_usi(mv).unwrap());
    }
    // 窓を4手に絞ると3回の一致は見つからない
    assert_eq!(pos.test_sennichite(false, &history, 4), SennichiteStatus::None);
}
