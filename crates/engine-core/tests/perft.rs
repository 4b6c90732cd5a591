//! 平手初期局面のperft参照値
//!
//! 値は公開されている将棋のperft系列（30, 900, 25470, 719731, ...）と、
//! 独立に書いたリファレンス実装の両方で確認したもの。

use engine_core::perft::{perft, split_perft};
use engine_core::position::Position;

#[test]
fn test_startpos_perft_3() {
    assert_eq!(perft(&Position::startpos(), 3), 25_470);
}

#[test]
fn test_startpos_perft_4() {
    assert_eq!(perft(&Position::startpos(), 4), 719_731);
}

#[test]
fn test_midgame_split_perft_consistency() {
    let pos = Position::from_sfen(
        "8l/1l+R2P3/p2pBG1pp/kps1p4/Nn1P2G2/P1P1P2PP/1PS6/1KSG3+r1/LN2+p3L w Sbgn3p 124",
    )
    .unwrap();

    let (splits, total) = split_perft(&pos, 2);
    assert_eq!(splits.len(), 182);
    assert_eq!(splits.iter().map(|(_, n)| n).sum::<u64>(), total);
    assert_eq!(total, perft(&pos, 2));
}
