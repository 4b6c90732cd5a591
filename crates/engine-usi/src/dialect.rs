//! プロトコル方言（USI / cutechess向けUCI互換）
//!
//! コマンドの流れは共通で、指し手・局面・盤面表示の文字列化だけが違う。
//! 方言はゼロサイズの型として表し、ハンドラとレポータが共有する。

use engine_core::position::Position;
use engine_core::types::{Color, Move, MoveParseError, Square};

/// プロトコルごとの文字列化の違い
pub trait Dialect: Copy + Send + Sync + 'static {
    /// ハンドシェイクコマンド（"usi" / "uci"）
    fn name(self) -> &'static str;
    /// ハンドシェイク応答（"usiok" / "uciok"）
    fn ok_token(self) -> &'static str;
    /// 新規対局コマンド（"usinewgame" / "ucinewgame"）
    fn newgame_command(self) -> &'static str;

    /// 先手の残り時間のトークン
    fn btime_token(self) -> &'static str;
    /// 後手の残り時間のトークン
    fn wtime_token(self) -> &'static str;
    /// 先手の加算のトークン
    fn binc_token(self) -> &'static str;
    /// 後手の加算のトークン
    fn winc_token(self) -> &'static str;

    /// オプション公開名（USIはHashをUSI_Hashにする）
    fn option_name(self, name: &str) -> String;
    /// setoptionで受けた名前を内部名（小文字）へ
    fn transform_option_name(self, lower: &str) -> String;

    /// ハンドシェイク応答の直前に出す追加行
    fn extra_initial_info(self) -> &'static [&'static str];

    /// "position"の局面部分（"sfen ..." / "fen ..."）を解釈する
    fn parse_position(self, args: &[&str]) -> Result<Position, String>;
    /// 指し手文字列を解釈する
    fn parse_move(self, s: &str) -> Result<Move, MoveParseError>;
    /// 指し手を文字列化する
    fn format_move(self, mv: Move) -> String;
    /// 詰みスコア（ply）を文字列化する
    fn format_mate(self, plies: i32) -> String;

    /// 盤面表示
    fn board_string(self, pos: &Position) -> String;
    /// "d"コマンドの局面行
    fn fen_line(self, pos: &Position) -> String;
}

/// USI（標準）
#[derive(Clone, Copy)]
pub struct Usi;

impl Dialect for Usi {
    fn name(self) -> &'static str {
        "usi"
    }

    fn ok_token(self) -> &'static str {
        "usiok"
    }

    fn newgame_command(self) -> &'static str {
        "usinewgame"
    }

    fn btime_token(self) -> &'static str {
        "btime"
    }

    fn wtime_token(self) -> &'static str {
        "wtime"
    }

    fn binc_token(self) -> &'static str {
        "binc"
    }

    fn winc_token(self) -> &'static str {
        "winc"
    }

    fn option_name(self, name: &str) -> String {
        // GUI側が意味を固定しているオプションはUSI_プレフィックスを付ける
        if name == "Hash" {
            format!("USI_{name}")
        } else {
            name.to_string()
        }
    }

    fn transform_option_name(self, lower: &str) -> String {
        lower.strip_prefix("usi_").unwrap_or(lower).to_string()
    }

    fn extra_initial_info(self) -> &'static [&'static str] {
        &[]
    }

    fn parse_position(self, args: &[&str]) -> Result<Position, String> {
        if args.is_empty() || args[0] != "sfen" {
            return Err("expected 'sfen'".to_string());
        }
        if args.len() == 1 {
            return Err("missing sfen".to_string());
        }
        Position::from_sfen_parts(&args[1..])
            .map_err(|e| format!("failed to parse sfen: {}", e.message()))
    }

    fn parse_move(self, s: &str) -> Result<Move, MoveParseError> {
        Move::from_usi(s)
    }

    fn format_move(self, mv: Move) -> String {
        mv.to_usi()
    }

    fn format_mate(self, plies: i32) -> String {
        plies.to_string()
    }

    fn board_string(self, pos: &Position) -> String {
        format!("{pos}")
    }

    fn fen_line(self, pos: &Position) -> String {
        format!("Sfen: {}", pos.sfen())
    }
}

/// cutechess互換のUCI方言
///
/// 筋を英字・段を数字で書き、持ち駒はFENの角括弧に入れる。手番の色は
/// 反転して見せるので、時計のトークンも入れ替わる。
#[derive(Clone, Copy)]
pub struct UciLike;

impl Dialect for UciLike {
    fn name(self) -> &'static str {
        "uci"
    }

    fn ok_token(self) -> &'static str {
        "uciok"
    }

    fn newgame_command(self) -> &'static str {
        "ucinewgame"
    }

    // GUIから見たWhiteがエンジン内部の先手
    fn btime_token(self) -> &'static str {
        "wtime"
    }

    fn wtime_token(self) -> &'static str {
        "btime"
    }

    fn binc_token(self) -> &'static str {
        "winc"
    }

    fn winc_token(self) -> &'static str {
        "binc"
    }

    fn option_name(self, name: &str) -> String {
        name.to_string()
    }

    fn transform_option_name(self, lower: &str) -> String {
        lower.to_string()
    }

    fn extra_initial_info(self) -> &'static [&'static str] {
        &["option name UCI_Variant type combo default shogi var shogi"]
    }

    fn parse_position(self, args: &[&str]) -> Result<Position, String> {
        if args.is_empty() || args[0] != "fen" {
            return Err("expected 'fen'".to_string());
        }
        if args.len() == 1 {
            return Err("missing fen".to_string());
        }

        let parts = &args[1..];
        if parts.len() < 3 {
            return Err("failed to parse FEN: wrong number of FEN parts".to_string());
        }

        let board_part = parts[0];
        let hand_start = board_part
            .find('[')
            .ok_or_else(|| "failed to parse FEN: failed to find hand".to_string())?;
        if hand_start == 0 {
            return Err("failed to parse FEN: missing board".to_string());
        }
        let hand_end = board_part[hand_start + 1..]
            .find(']')
            .map(|i| hand_start + 1 + i)
            .ok_or_else(|| "failed to parse FEN: failed to find hand".to_string())?;

        if parts[1] != "w" && parts[1] != "b" {
            return Err("failed to parse FEN: invalid side to move".to_string());
        }

        let board = &board_part[..hand_start];
        let hand = if hand_end == hand_start + 1 {
            "-"
        } else {
            &board_part[hand_start + 1..hand_end]
        };
        // 色は反転して見せているので、内部の手番は逆になる
        let stm = if parts[1] == "w" { "b" } else { "w" };

        let move_count;
        let mut sfen_parts = vec![board, stm, hand];
        if parts.len() >= 6 {
            let fullmove: u32 = parts[5]
                .parse()
                .map_err(|_| "failed to parse FEN: invalid fullmove number".to_string())?;
            move_count = (fullmove * 2).saturating_sub((stm == "b") as u32).max(1).to_string();
            sfen_parts.push(&move_count);
        }

        Position::from_sfen_parts(&sfen_parts)
            .map_err(|e| format!("failed to parse constructed sfen: {}", e.message()))
    }

    fn parse_move(self, s: &str) -> Result<Move, MoveParseError> {
        Move::from_uci(s)
    }

    fn format_move(self, mv: Move) -> String {
        mv.to_uci()
    }

    fn format_mate(self, plies: i32) -> String {
        // UCIでは手数（move）で数える
        let moves = (plies.abs() + 1) / 2;
        if plies < 0 {
            (-moves).to_string()
        } else {
            moves.to_string()
        }
    }

    fn board_string(self, pos: &Position) -> String {
        let mut out = String::new();
        out.push_str(" +---+---+---+---+---+---+---+---+---+\n");
        for rank in (0..9u8).rev() {
            for file in 0..9u8 {
                match pos.piece_on(Square::new(file, rank)) {
                    Some(piece) => {
                        let pad = if piece.is_promoted() { "" } else { " " };
                        out.push_str(&format!(" |{pad}{piece}"));
                    }
                    None => out.push_str(" |  "),
                }
            }
            out.push_str(&format!(" | {}\n", (b'1' + rank) as char));
            out.push_str(" +---+---+---+---+---+---+---+---+---+\n");
        }
        out.push_str("   a   b   c   d   e   f   g   h   i\n");
        out.push_str(&format!("\nBlack pieces in hand: {}", pos.hand(Color::Black)));
        out.push_str(&format!("\nWhite pieces in hand: {}", pos.hand(Color::White)));
        out.push_str(&format!(
            "\n\n{} to move",
            if pos.stm() == Color::Black { "Black" } else { "White" }
        ));
        out
    }

    fn fen_line(self, pos: &Position) -> String {
        let sfen = pos.sfen();
        let parts: Vec<&str> = sfen.split_whitespace().collect();

        let stm = if parts[1] == "w" { "b" } else { "w" };
        let fullmove = (pos.move_count() + 1) / 2;
        let hand = if parts[2] == "-" { "" } else { parts[2] };

        format!("Fen: {}[{}] {} - - 0 {}", parts[0], hand, stm, fullmove)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::types::PieceType;

    #[test]
    fn test_usi_move_roundtrip() {
        let d = Usi;
        let mv = d.parse_move("7g7f").unwrap();
        assert_eq!(d.format_move(mv), "7g7f");
    }

    #[test]
    fn test_uci_position_color_flip() {
        let d = UciLike;
        // UCIのfenで手番wはエンジン内部の先手b
        let pos = d
            .parse_position(&["fen", "lnsgkgsnl/1r5b1/ppppppppp/9/9/9/9/1B5R1/LNSGKGSNL[-]", "w", "-", "-", "0", "1"])
            .unwrap();
        assert_eq!(pos.stm(), Color::Black);
        assert_eq!(pos, Position::startpos());
    }

    #[test]
    fn test_uci_position_with_hand() {
        let d = UciLike;
        let pos = d
            .parse_position(&["fen", "4k4/9/9/9/9/9/9/9/4K4[RBp]", "w", "-", "-", "0", "1"])
            .unwrap();
        assert_eq!(pos.hand(Color::Black).count(PieceType::Rook), 1);
        assert_eq!(pos.hand(Color::Black).count(PieceType::Bishop), 1);
        assert_eq!(pos.hand(Color::White).count(PieceType::Pawn), 1);
    }

    #[test]
    fn test_uci_fen_line_roundtrips_through_parse() {
        let d = UciLike;
        let pos = Position::startpos();
        let line = d.fen_line(&pos);
        let fen = line.strip_prefix("Fen: ").unwrap();
        let parts: Vec<&str> = fen.split_whitespace().collect();
        let reparsed = {
            let mut args = vec!["fen"];
            args.extend(&parts);
            d.parse_position(&args).unwrap()
        };
        assert_eq!(reparsed, pos);
    }

    #[test]
    fn test_uci_mate_display_in_moves() {
        let d = UciLike;
        assert_eq!(d.format_mate(1), "1");
        assert_eq!(d.format_mate(3), "2");
        assert_eq!(d.format_mate(-2), "-1");
        assert_eq!(Usi.format_mate(3), "3");
    }
}
