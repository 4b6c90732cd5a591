//! 将棋エンジンのコアライブラリ
//!
//! 81升のbitboard局面表現、利き生成、疑似合法手生成と合法性検査、
//! 置換表を共有する反復深化アルファベータ探索を提供する。
//! 外部プロトコルとの通信は`search::SearchReporter`を介して行い、
//! このクレート自身は標準入出力に触れない。

pub mod attacks;
pub mod bitboard;
pub mod eval;
pub mod movegen;
pub mod perft;
pub mod position;
pub mod rays;
pub mod search;
pub mod see;
pub mod tt;
pub mod types;

pub use bitboard::Bitboard;
pub use movegen::{MoveList, MovePicker};
pub use position::{Position, SennichiteStatus, SfenError};
pub use search::Searcher;
pub use tt::TranspositionTable;
pub use types::{Color, Move, Piece, PieceType, Square};
