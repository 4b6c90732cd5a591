//! SFENの読み書き

use crate::types::{Color, Piece, PieceType, Square};

use super::Position;

/// SFENが解釈できなかったときのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfenError {
    message: String,
}

impl SfenError {
    fn new(message: impl Into<String>) -> SfenError {
        SfenError {
            message: message.into(),
        }
    }

    /// エラーの内容
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for SfenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SfenError {}

impl Position {
    /// SFEN文字列から局面を生成
    pub fn from_sfen(sfen: &str) -> Result<Position, SfenError> {
        let parts: Vec<&str> = sfen.split_whitespace().collect();
        Position::from_sfen_parts(&parts)
    }

    /// 空白区切り済みのSFENから局面を生成
    pub fn from_sfen_parts(parts: &[&str]) -> Result<Position, SfenError> {
        if parts.len() < 3 || parts.len() > 4 {
            return Err(SfenError::new("wrong number of SFEN parts"));
        }

        let mut pos = Position::empty();

        let ranks: Vec<&str> = parts[0].split('/').collect();
        if ranks.len() != 9 {
            return Err(SfenError::new("wrong number of ranks in SFEN"));
        }

        for (rank_idx, rank) in ranks.iter().enumerate() {
            let rank_nr = 8 - rank_idx as u8;
            let mut file_idx = 0u32;

            let mut chars = rank.chars().peekable();
            while let Some(c) = chars.next() {
                if let Some(empty) = c.to_digit(10) {
                    file_idx += empty;
                } else if c == '+' {
                    let Some(promoted) = chars.next() else {
                        return Err(SfenError::new("+ found at end of rank with no matching piece"));
                    };
                    let piece_str = format!("+{promoted}");
                    let Some(piece) = Piece::from_sfen_str(&piece_str) else {
                        return Err(SfenError::new(format!("invalid promoted piece {piece_str}")));
                    };
                    if file_idx > 8 {
                        return Err(SfenError::new("wrong number of files in rank"));
                    }
                    pos.add_piece(Square::new(file_idx as u8, rank_nr), piece);
                    file_idx += 1;
                } else if let Some(piece) = Piece::from_sfen_str(&c.to_string()) {
                    if file_idx > 8 {
                        return Err(SfenError::new("wrong number of files in rank"));
                    }
                    pos.add_piece(Square::new(file_idx as u8, rank_nr), piece);
                    file_idx += 1;
                } else {
                    return Err(SfenError::new(format!("invalid piece char {c}")));
                }
            }

            if file_idx != 9 {
                return Err(SfenError::new("wrong number of files in rank"));
            }
        }

        if pos.piece_bb(PieceType::King, Color::Black).count() != 1 {
            return Err(SfenError::new("black must have exactly 1 king"));
        }
        if pos.piece_bb(PieceType::King, Color::White).count() != 1 {
            return Err(SfenError::new("white must have exactly 1 king"));
        }

        let stm = parts[1];
        if stm.len() != 1 {
            return Err(SfenError::new("invalid side to move"));
        }
        let Some(stm) = Color::from_sfen_char(stm.chars().next().unwrap()) else {
            return Err(SfenError::new("invalid side to move"));
        };
        pos.stm = stm;

        let hand = parts[2];
        if hand != "-" {
            let mut next_count: Option<u32> = None;
            let mut chars = hand.chars().peekable();
            while let Some(c) = chars.next() {
                if let Some(digit) = c.to_digit(10) {
                    let mut count = digit;
                    if let Some(next) = chars.peek().and_then(|n| n.to_digit(10)) {
                        count = count * 10 + next;
                        chars.next();
                    }
                    if chars.peek().is_none() {
                        return Err(SfenError::new(
                            "piece count found at end of hand with no matching piece",
                        ));
                    }
                    if count == 0 {
                        return Err(SfenError::new("0 found in hand"));
                    }
                    next_count = Some(count);
                } else if let Some(piece) = Piece::from_sfen_str(&c.to_string()) {
                    if piece.is_promoted() || piece.piece_type() == PieceType::King {
                        return Err(SfenError::new(format!("invalid piece {c} found in hand")));
                    }
                    let count = next_count.take().unwrap_or(1);
                    if count > piece.piece_type().max_in_hand() {
                        return Err(SfenError::new(format!("too many {c} in hand")));
                    }
                    pos.hands[piece.color().index()].set(piece.piece_type(), count);
                } else {
                    return Err(SfenError::new(format!("invalid piece {c} found in hand")));
                }
            }
        }

        if parts.len() == 4 {
            let Ok(move_count) = parts[3].parse::<u32>() else {
                return Err(SfenError::new(format!("invalid move count {}", parts[3])));
            };
            if move_count == 0 {
                return Err(SfenError::new(format!("invalid move count {}", parts[3])));
            }
            pos.move_count = move_count;
        }

        pos.regen_key();
        pos.update_attacks();

        // 手番でない側に王手がかかっている局面は成立しない
        let nstm = pos.stm.flip();
        if pos.is_attacked(pos.king(nstm), pos.stm, pos.occupancy()) {
            return Err(SfenError::new("side not to move is in check"));
        }

        if pos.is_in_check() {
            pos.consecutive_checks[pos.stm.index()] = 1;
        }

        Ok(pos)
    }

    /// SFEN文字列に変換
    pub fn sfen(&self) -> String {
        let mut out = String::new();

        for rank in (0..9u8).rev() {
            let mut file = 0u8;
            while file < 9 {
                match self.piece_on(Square::new(file, rank)) {
                    None => {
                        let mut empty = 1u8;
                        while file + empty < 9 && self.piece_on(Square::new(file + empty, rank)).is_none() {
                            empty += 1;
                        }
                        out.push_str(&empty.to_string());
                        file += empty;
                    }
                    Some(piece) => {
                        out.push_str(&piece.sfen_str());
                        file += 1;
                    }
                }
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(self.stm.sfen_char());
        out.push(' ');

        let black = self.hand(Color::Black);
        let white = self.hand(Color::White);
        if black.is_empty() && white.is_empty() {
            out.push('-');
        } else {
            out.push_str(&black.sfen(Color::Black));
            out.push_str(&white.sfen(Color::White));
        }

        out.push(' ');
        out.push_str(&self.move_count.to_string());

        out
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "   9   8   7   6   5   4   3   2   1")?;
        writeln!(f, " +---+---+---+---+---+---+---+---+---+")?;

        for rank in (0..9u8).rev() {
            for file in 0..9u8 {
                match self.piece_on(Square::new(file, rank)) {
                    Some(piece) => {
                        let pad = if piece.is_promoted() { "" } else { " " };
                        write!(f, " |{pad}{piece}")?;
                    }
                    None => write!(f, " |  ")?,
                }
            }
            writeln!(f, " | {}", (b'a' + 8 - rank) as char)?;
            writeln!(f, " +---+---+---+---+---+---+---+---+---+")?;
        }

        writeln!(f)?;
        writeln!(f, "Black pieces in hand: {}", self.hand(Color::Black))?;
        writeln!(f, "White pieces in hand: {}", self.hand(Color::White))?;
        writeln!(f)?;
        write!(f, "{} to move", self.stm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTPOS_SFEN: &str = "lnsgkgsnl/1r5b1/ppppppppp/9/9/9/9/1B5R1/LNSGKGSNL b - 1";

    #[test]
    fn test_startpos_sfen() {
        assert_eq!(Position::startpos().sfen(), STARTPOS_SFEN);
    }

    #[test]
    fn test_startpos_roundtrip() {
        let pos = Position::from_sfen(STARTPOS_SFEN).unwrap();
        assert_eq!(pos.sfen(), STARTPOS_SFEN);
        assert_eq!(pos.key(), Position::startpos().key());
        assert_eq!(pos, Position::startpos());
    }

    #[test]
    fn test_complex_midgame_sfen() {
        let sfen = "8l/1l+R2P3/p2pBG1pp/kps1p4/Nn1P2G2/P1P1P2PP/1PS6/1KSG3+r1/LN2+p3L w Sbgn3p 124";
        let pos = Position::from_sfen(sfen).unwrap();

        assert_eq!(pos.stm(), Color::White);
        assert_eq!(pos.move_count(), 124);
        assert_eq!(pos.hand(Color::Black).count(PieceType::Silver), 1);
        assert_eq!(pos.hand(Color::White).count(PieceType::Bishop), 1);
        assert_eq!(pos.hand(Color::White).count(PieceType::Gold), 1);
        assert_eq!(pos.hand(Color::White).count(PieceType::Knight), 1);
        assert_eq!(pos.hand(Color::White).count(PieceType::Pawn), 3);

        assert_eq!(pos.sfen(), sfen);
    }

    #[test]
    fn test_sfen_errors() {
        assert!(Position::from_sfen("").is_err());
        assert!(Position::from_sfen("lnsgkgsnl/1r5b1/ppppppppp b - 1").is_err());
        // 段の数が違う
        assert!(Position::from_sfen("9/9/9/9/9/9/9/9 b - 1").is_err());
        // 筋の数が違う
        assert!(Position::from_sfen("8/9/9/9/4k4/9/9/9/4K4 b - 1").is_err());
        // 不正な駒
        assert!(Position::from_sfen("xnsgkgsnl/1r5b1/ppppppppp/9/9/9/9/1B5R1/LNSGKGSNL b - 1").is_err());
        // 不正な手番
        assert!(Position::from_sfen("lnsgkgsnl/1r5b1/ppppppppp/9/9/9/9/1B5R1/LNSGKGSNL x - 1").is_err());
        // 不正な手数
        assert!(Position::from_sfen("lnsgkgsnl/1r5b1/ppppppppp/9/9/9/9/1B5R1/LNSGKGSNL b - x").is_err());
        // 玉が足りない
        assert!(Position::from_sfen("lnsg1gsnl/1r5b1/ppppppppp/9/9/9/9/1B5R1/LNSGKGSNL b - 1").is_err());
        // 手番でない側に王手がかかっている
        assert!(Position::from_sfen("4k4/4R4/9/9/9/9/9/9/4K4 b - 1").is_err());
    }

    #[test]
    fn test_sfen_hand_two_digit_count() {
        let sfen = "4k4/9/9/9/9/9/9/9/4K4 b 18P 1";
        let pos = Position::from_sfen(sfen).unwrap();
        assert_eq!(pos.hand(Color::Black).count(PieceType::Pawn), 18);
        assert_eq!(pos.sfen(), sfen);
    }

    #[test]
    fn test_sfen_move_count_defaults_to_one() {
        let pos = Position::from_sfen("lnsgkgsnl/1r5b1/ppppppppp/9/9/9/9/1B5R1/LNSGKGSNL b -").unwrap();
        assert_eq!(pos.move_count(), 1);
    }
}
