//! Zobrist hashing for position identification
//!
//! One 64-bit key per (piece, square), one for the side to move, and one per
//! (color, piece type, count) for pieces in hand. Keys are generated from a
//! fixed seed so hashes are reproducible across runs.

use lazy_static::lazy_static;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::types::{Color, Piece, PieceType, Square};

/// Hand keys are indexed by count, 0..=18 covers every piece type.
const MAX_HAND_COUNT: usize = 18;

pub struct ZobristTable {
    piece_square: [[u64; Square::NUM]; Piece::NUM],
    stm: u64,
    hand: [[[u64; MAX_HAND_COUNT + 1]; 7]; Color::NUM],
}

impl ZobristTable {
    fn new() -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x590D_3524_D1D6_301C);

        let mut table = ZobristTable {
            piece_square: [[0; Square::NUM]; Piece::NUM],
            stm: 0,
            hand: [[[0; MAX_HAND_COUNT + 1]; 7]; Color::NUM],
        };

        for piece in 0..Piece::NUM {
            for sq in 0..Square::NUM {
                table.piece_square[piece][sq] = rng.random();
            }
        }

        table.stm = rng.random();

        for color in 0..Color::NUM {
            for pt in 0..7 {
                for count in 0..=MAX_HAND_COUNT {
                    table.hand[color][pt][count] = rng.random();
                }
            }
        }

        table
    }
}

lazy_static! {
    static ref ZOBRIST: ZobristTable = ZobristTable::new();
}

/// 盤上の駒のキー
#[inline]
pub fn piece_square(piece: Piece, sq: Square) -> u64 {
    ZOBRIST.piece_square[piece.index()][sq.index()]
}

/// 手番のキー
#[inline]
pub fn stm() -> u64 {
    ZOBRIST.stm
}

/// 持ち駒枚数のキー
#[inline]
pub fn piece_in_hand(c: Color, pt: PieceType, count: u32) -> u64 {
    debug_assert!(count <= pt.max_in_hand());
    ZOBRIST.hand[c.index()][pt.hand_index()][count as usize]
}

/// 局面のハッシュキー（差分更新とregenの両方で使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Keys {
    all: u64,
}

impl Keys {
    #[inline]
    pub(crate) fn from_raw(all: u64) -> Keys {
        Keys { all }
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.all
    }

    #[inline]
    pub fn clear(&mut self) {
        self.all = 0;
    }

    #[inline]
    pub fn flip_piece(&mut self, piece: Piece, sq: Square) {
        self.all ^= piece_square(piece, sq);
    }

    #[inline]
    pub fn move_piece(&mut self, piece: Piece, from: Square, to: Square) {
        self.all ^= piece_square(piece, from) ^ piece_square(piece, to);
    }

    #[inline]
    pub fn flip_stm(&mut self) {
        self.all ^= stm();
    }

    #[inline]
    pub fn flip_hand_count(&mut self, c: Color, pt: PieceType, count: u32) {
        self.all ^= piece_in_hand(c, pt, count);
    }

    #[inline]
    pub fn switch_hand_count(&mut self, c: Color, pt: PieceType, before: u32, after: u32) {
        self.all ^= piece_in_hand(c, pt, before) ^ piece_in_hand(c, pt, after);
    }
}
