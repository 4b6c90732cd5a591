//! 升目間のレイテーブル
//!
//! - `ray_between(a, b)`: 空盤面で角か飛がaからbへ届くとき、その間の升（両端を除く）
//! - `ray_intersecting(a, b)`: 同一ライン上の2升を通る直線全体（両端を含む）

use std::sync::OnceLock;

use crate::attacks::sliders::{sliding_attacks, BISHOP_DIRS, ROOK_DIRS};
use crate::bitboard::Bitboard;
use crate::types::Square;

struct RayTables {
    between: Vec<Bitboard>,
    intersecting: Vec<Bitboard>,
}

static TABLES: OnceLock<RayTables> = OnceLock::new();

fn build() -> RayTables {
    let mut between = vec![Bitboard::EMPTY; Square::NUM * Square::NUM];
    let mut intersecting = vec![Bitboard::EMPTY; Square::NUM * Square::NUM];

    for a in Square::all() {
        let a_bit = Bitboard::from_square(a);
        let rook = sliding_attacks(a, &ROOK_DIRS, Bitboard::EMPTY);
        let bishop = sliding_attacks(a, &BISHOP_DIRS, Bitboard::EMPTY);

        for b in Square::all() {
            if a == b {
                continue;
            }
            let b_bit = Bitboard::from_square(b);
            let idx = a.index() * Square::NUM + b.index();

            let dirs: &[(i32, i32)] = if rook.contains(b) {
                &ROOK_DIRS
            } else if bishop.contains(b) {
                &BISHOP_DIRS
            } else {
                continue;
            };

            between[idx] = sliding_attacks(a, dirs, b_bit) & sliding_attacks(b, dirs, a_bit);
            intersecting[idx] = (a_bit | sliding_attacks(a, dirs, Bitboard::EMPTY))
                & (b_bit | sliding_attacks(b, dirs, Bitboard::EMPTY));
        }
    }

    RayTables { between, intersecting }
}

fn tables() -> &'static RayTables {
    TABLES.get_or_init(build)
}

/// aとbの間の升（両端を除く）。届かない組は空。
#[inline]
pub fn ray_between(a: Square, b: Square) -> Bitboard {
    tables().between[a.index() * Square::NUM + b.index()]
}

/// aとbを通る直線全体。同一ライン上にない組は空。
#[inline]
pub fn ray_intersecting(a: Square, b: Square) -> Bitboard {
    tables().intersecting[a.index() * Square::NUM + b.index()]
}
