//! 局面（Position）
//!
//! 盤面・持ち駒・手番・ハッシュ・王手/ピン情報を持つ状態機械。
//! 局面は値として扱い、`apply_move`は新しい局面を返す。

mod hand;
mod sfen;
pub mod zobrist;

pub use hand::Hand;
pub use sfen::SfenError;

use crate::attacks;
use crate::bitboard::Bitboard;
use crate::movegen::{self, MoveList};
use crate::rays::{ray_between, ray_intersecting};
use crate::types::{Color, Move, Piece, PieceType, Square};

use zobrist::Keys;

/// 千日手判定の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SennichiteStatus {
    /// 千日手ではない
    None,
    /// 千日手（引き分け）
    Draw,
    /// 連続王手の千日手。王手をかけていない側（現局面の手番から見た相手）の勝ち
    Win,
}

/// 局面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    colors: [Bitboard; Color::NUM],
    pieces: [Bitboard; PieceType::NUM],
    mailbox: [Option<Piece>; Square::NUM],
    hands: [Hand; Color::NUM],
    keys: Keys,
    stm: Color,
    move_count: u32,
    consecutive_checks: [u32; Color::NUM],
    checkers: Bitboard,
    pinned: Bitboard,
}

impl Position {
    pub(crate) fn empty() -> Position {
        Position {
            colors: [Bitboard::EMPTY; Color::NUM],
            pieces: [Bitboard::EMPTY; PieceType::NUM],
            mailbox: [None; Square::NUM],
            hands: [Hand::EMPTY; Color::NUM],
            keys: Keys::default(),
            stm: Color::Black,
            move_count: 1,
            consecutive_checks: [0; Color::NUM],
            checkers: Bitboard::EMPTY,
            pinned: Bitboard::EMPTY,
        }
    }

    /// 平手初期局面
    pub fn startpos() -> Position {
        let mut pos = Position::empty();

        let back = [
            PieceType::Lance,
            PieceType::Knight,
            PieceType::Silver,
            PieceType::Gold,
            PieceType::King,
            PieceType::Gold,
            PieceType::Silver,
            PieceType::Knight,
            PieceType::Lance,
        ];
        for file in 0..9u8 {
            pos.add_piece(Square::new(file, 0), back[file as usize].with_color(Color::Black));
            pos.add_piece(Square::new(file, 8), back[file as usize].with_color(Color::White));
            pos.add_piece(Square::new(file, 2), PieceType::Pawn.with_color(Color::Black));
            pos.add_piece(Square::new(file, 6), PieceType::Pawn.with_color(Color::White));
        }
        // 先手: 角8h、飛2h / 後手: 角2b、飛8b
        pos.add_piece(Square::new(1, 1), PieceType::Bishop.with_color(Color::Black));
        pos.add_piece(Square::new(7, 1), PieceType::Rook.with_color(Color::Black));
        pos.add_piece(Square::new(7, 7), PieceType::Bishop.with_color(Color::White));
        pos.add_piece(Square::new(1, 7), PieceType::Rook.with_color(Color::White));

        pos.regen_key();
        pos.update_attacks();
        pos
    }

    /// 全体の占有
    #[inline]
    pub fn occupancy(&self) -> Bitboard {
        self.colors[0] | self.colors[1]
    }

    /// 手番側の占有
    #[inline]
    pub fn color_bb(&self, c: Color) -> Bitboard {
        self.colors[c.index()]
    }

    /// 駒種の占有（両手番）
    #[inline]
    pub fn piece_type_bb(&self, pt: PieceType) -> Bitboard {
        self.pieces[pt.index()]
    }

    /// 特定の駒の占有
    #[inline]
    pub fn piece_bb(&self, pt: PieceType, c: Color) -> Bitboard {
        self.pieces[pt.index()] & self.colors[c.index()]
    }

    /// 升目上の駒
    #[inline]
    pub fn piece_on(&self, sq: Square) -> Option<Piece> {
        self.mailbox[sq.index()]
    }

    /// 手番
    #[inline]
    pub fn stm(&self) -> Color {
        self.stm
    }

    /// 手数（1始まり）
    #[inline]
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// 持ち駒
    #[inline]
    pub fn hand(&self, c: Color) -> Hand {
        self.hands[c.index()]
    }

    /// 玉の位置
    #[inline]
    pub fn king(&self, c: Color) -> Square {
        self.piece_bb(PieceType::King, c).lsb_unchecked()
    }

    /// 局面のハッシュキー
    #[inline]
    pub fn key(&self) -> u64 {
        self.keys.value()
    }

    /// 手番の玉に王手をかけている駒
    #[inline]
    pub fn checkers(&self) -> Bitboard {
        self.checkers
    }

    /// ピンされている手番側の駒
    #[inline]
    pub fn pinned(&self) -> Bitboard {
        self.pinned
    }

    /// 手番の玉に王手がかかっているか
    #[inline]
    pub fn is_in_check(&self) -> bool {
        !self.checkers.is_empty()
    }

    /// 手番側の連続王手数
    #[inline]
    pub fn consecutive_checks(&self, c: Color) -> u32 {
        self.consecutive_checks[c.index()]
    }

    /// 指し手を適用した新しい局面を返す
    ///
    /// 渡す指し手は合法であること。
    pub fn apply_move(&self, mv: Move) -> Position {
        debug_assert!(mv.is_some());

        let mut pos = self.clone();
        let stm = self.stm;

        if mv.is_drop() {
            pos.drop_piece(mv.to(), mv.drop_piece_type().with_color(stm));
        } else {
            let piece = pos.piece_on(mv.from()).expect("no piece on from-square");
            debug_assert_eq!(piece.color(), stm);
            if mv.is_promo() {
                pos.promote_piece(mv.from(), mv.to(), piece);
            } else {
                pos.move_piece(mv.from(), mv.to(), piece);
            }
        }

        pos.move_count += 1;
        pos.stm = stm.flip();
        pos.keys.flip_stm();

        pos.update_attacks();

        if pos.is_in_check() {
            pos.consecutive_checks[pos.stm.index()] += 1;
        } else {
            pos.consecutive_checks[pos.stm.index()] = 0;
        }

        pos
    }

    /// 手番だけを渡した新しい局面を返す
    pub fn apply_null_move(&self) -> Position {
        let mut pos = self.clone();

        pos.move_count += 1;
        pos.stm = pos.stm.flip();
        pos.keys.flip_stm();

        pos.update_attacks();

        pos
    }

    /// 千日手判定
    ///
    /// key_historyは現局面より前の各局面のキー。同手番の局面（1つおき）を
    /// limit手前まで遡り、現局面と同一のキーを数える。3回見つかったら
    /// （現局面を含め4回目の出現）結果を返す。
    pub fn test_sennichite(
        &self,
        cute_chess_workaround: bool,
        key_history: &[u64],
        limit: usize,
    ) -> SennichiteStatus {
        let len = key_history.len() as i64;
        let end = (len - limit as i64 - 1).max(0);

        let mut repetitions = 3;

        let mut i = len - 4;
        while i >= end {
            if key_history[i as usize] == self.key() {
                repetitions -= 1;
                if repetitions == 0 {
                    // 古いcutechessは連続王手の千日手を扱えないので、
                    // 現在王手がかかっているかどうかだけで判定する
                    return if cute_chess_workaround {
                        if self.is_in_check() {
                            SennichiteStatus::Win
                        } else {
                            SennichiteStatus::Draw
                        }
                    } else if self.consecutive_checks[self.stm.index()] >= 2 {
                        SennichiteStatus::Win
                    } else {
                        SennichiteStatus::Draw
                    };
                }
            }
            i -= 2;
        }

        SennichiteStatus::None
    }

    /// 駒を取る手かどうか
    #[inline]
    pub fn is_capture(&self, mv: Move) -> bool {
        !mv.is_drop() && self.piece_on(mv.to()).is_some()
    }

    /// 歩・香・桂が行き所を失う段（そこへの不成の移動と打ちは禁止）
    fn promo_required_zone(&self, pt: PieceType, c: Color) -> Bitboard {
        let mut zone = Bitboard::EMPTY;
        if matches!(pt, PieceType::Pawn | PieceType::Lance | PieceType::Knight) {
            zone |= Bitboard::relative_rank(c, 8);
        }
        if pt == PieceType::Knight {
            zone |= Bitboard::relative_rank(c, 7);
        }
        zone
    }

    /// 疑似合法かどうか
    ///
    /// 置換表から読んだ指し手がこの局面で意味を成すかの検査。自玉の安全は
    /// 見ない（それは`is_legal`）。
    pub fn is_pseudolegal(&self, mv: Move) -> bool {
        debug_assert!(mv.is_some());

        let stm = self.stm;
        let occ = self.occupancy();

        if mv.is_drop() {
            let pt = mv.drop_piece_type();

            // 持っていない駒は打てない
            if self.hands[stm.index()].count(pt) == 0 {
                return false;
            }

            // 空き升にしか打てない
            if occ.contains(mv.to()) {
                return false;
            }

            // 行き所のない升には打てない
            if self.promo_required_zone(pt, stm).contains(mv.to()) {
                return false;
            }

            // 二歩
            if pt == PieceType::Pawn {
                let stm_pawn_files = self.piece_bb(PieceType::Pawn, stm).fill_file();
                if stm_pawn_files.contains(mv.to()) {
                    return false;
                }
            }

            return true;
        }

        let moving = match self.piece_on(mv.from()) {
            Some(piece) if piece.color() == stm => piece,
            _ => return false,
        };

        // 自分の駒と玉は取れない
        if let Some(captured) = self.piece_on(mv.to()) {
            if captured.color() == stm || captured.piece_type() == PieceType::King {
                return false;
            }
        }

        if mv.is_promo() {
            // 成れない駒は成れない
            if !moving.piece_type().can_promote() {
                return false;
            }

            // 敵陣に入る・出る・中で動く手でしか成れない
            let promo_area = Bitboard::promo_area(stm);
            if !promo_area.contains(mv.from()) && !promo_area.contains(mv.to()) {
                return false;
            }
        } else {
            // 行き所のない升への不成は不可
            if self.promo_required_zone(moving.piece_type(), stm).contains(mv.to()) {
                return false;
            }
        }

        // 実際に利きのある升にしか動けない
        let att = attacks::piece_attacks(moving.piece_type(), mv.from(), stm, occ);
        att.contains(mv.to())
    }

    /// 合法かどうか（疑似合法であることが前提）
    pub fn is_legal(&self, mv: Move) -> bool {
        debug_assert!(mv.is_some());

        let stm = self.stm;
        let nstm = stm.flip();
        let stm_king = self.king(stm);

        if mv.is_drop() {
            if self.is_in_check() {
                // 両王手は玉を動かすしかない
                if self.checkers.more_than_one() {
                    return false;
                }

                let checker = self.checkers.lsb_unchecked();
                let check_ray = ray_between(stm_king, checker);

                // 合駒は王手の遮断になっていなければならない
                if !check_ray.contains(mv.to()) {
                    return false;
                }
            }

            // 打ち歩詰め
            if mv.drop_piece_type() == PieceType::Pawn {
                let drop_bb = Bitboard::from_square(mv.to());
                let gives_check = !(drop_bb.shift_north_relative(stm)
                    & self.piece_bb(PieceType::King, nstm))
                .is_empty();
                if gives_check {
                    // この歩打ちが詰みでないことを確かめる。
                    // 遅いが打ち歩の王手自体が稀。
                    let new_pos = self.apply_move(mv);

                    let mut replies = MoveList::new();
                    movegen::generate_all(&mut replies, &new_pos);

                    return replies.iter().any(|&reply| new_pos.is_legal(reply));
                }
            }

            // 駒を打って自玉に王手がかかることはない
            return true;
        }

        let moving = self.piece_on(mv.from()).expect("no piece on from-square");

        if moving.piece_type() == PieceType::King {
            // 王手している駒から離れる方向も攻撃升なので、玉を除いて判定する
            let kingless_occ = self.occupancy() ^ self.piece_bb(PieceType::King, stm);
            return !self.is_attacked(mv.to(), nstm, kingless_occ);
        } else if self.checkers.more_than_one() {
            // 両王手は玉を動かすしかない
            return false;
        }

        if self.pinned.contains(mv.from()) {
            let pin_ray = ray_intersecting(mv.from(), stm_king);
            if !pin_ray.contains(mv.to()) {
                return false;
            }
        }

        if self.is_in_check() {
            let checker = self.checkers.lsb_unchecked();
            // 王手駒の升を含む
            let check_ray = ray_between(stm_king, checker) | Bitboard::from_square(checker);

            // 王手は遮断するか王手駒を取るしかない
            if !check_ray.contains(mv.to()) {
                return false;
            }
        }

        true
    }

    /// sqがattacker側の駒に攻撃されているか（占有は引数で与える）
    pub fn is_attacked(&self, sq: Square, attacker: Color, occ: Bitboard) -> bool {
        let defender = attacker.flip();

        let horses = self.piece_bb(PieceType::PromotedBishop, attacker);
        let dragons = self.piece_bb(PieceType::PromotedRook, attacker);
        let rooks = dragons | self.piece_bb(PieceType::Rook, attacker);

        let pawns = self.piece_bb(PieceType::Pawn, attacker);
        if !(pawns & attacks::pawn_attacks(defender, sq)).is_empty() {
            return true;
        }

        let knights = self.piece_bb(PieceType::Knight, attacker);
        if !(knights & attacks::knight_attacks(defender, sq)).is_empty() {
            return true;
        }

        let silvers = self.piece_bb(PieceType::Silver, attacker);
        if !(silvers & attacks::silver_attacks(defender, sq)).is_empty() {
            return true;
        }

        let golds = self.piece_bb(PieceType::Gold, attacker)
            | self.piece_bb(PieceType::PromotedPawn, attacker)
            | self.piece_bb(PieceType::PromotedLance, attacker)
            | self.piece_bb(PieceType::PromotedKnight, attacker)
            | self.piece_bb(PieceType::PromotedSilver, attacker);
        if !(golds & attacks::gold_attacks(defender, sq)).is_empty() {
            return true;
        }

        let kings = horses | dragons | self.piece_bb(PieceType::King, attacker);
        if !(kings & attacks::king_attacks(sq)).is_empty() {
            return true;
        }

        let lances = rooks | self.piece_bb(PieceType::Lance, attacker);
        if !(lances & attacks::lance_attacks(defender, sq, occ)).is_empty() {
            return true;
        }

        let bishops = horses | self.piece_bb(PieceType::Bishop, attacker);
        if !(bishops & attacks::bishop_attacks(sq, occ)).is_empty() {
            return true;
        }

        !(rooks & attacks::rook_attacks(sq, occ)).is_empty()
    }

    /// sqを攻撃しているattacker側の駒の集合
    pub fn attackers_to(&self, sq: Square, attacker: Color) -> Bitboard {
        let defender = attacker.flip();
        let occ = self.occupancy();

        let mut attackers = Bitboard::EMPTY;

        let horses = self.piece_bb(PieceType::PromotedBishop, attacker);
        let dragons = self.piece_bb(PieceType::PromotedRook, attacker);

        let pawns = self.piece_bb(PieceType::Pawn, attacker);
        attackers |= pawns & attacks::pawn_attacks(defender, sq);

        let lances = self.piece_bb(PieceType::Lance, attacker);
        attackers |= lances & attacks::lance_attacks(defender, sq, occ);

        let knights = self.piece_bb(PieceType::Knight, attacker);
        attackers |= knights & attacks::knight_attacks(defender, sq);

        let silvers = self.piece_bb(PieceType::Silver, attacker);
        attackers |= silvers & attacks::silver_attacks(defender, sq);

        let golds = self.piece_bb(PieceType::Gold, attacker)
            | self.piece_bb(PieceType::PromotedPawn, attacker)
            | self.piece_bb(PieceType::PromotedLance, attacker)
            | self.piece_bb(PieceType::PromotedKnight, attacker)
            | self.piece_bb(PieceType::PromotedSilver, attacker);
        attackers |= golds & attacks::gold_attacks(defender, sq);

        let bishops = horses | self.piece_bb(PieceType::Bishop, attacker);
        attackers |= bishops & attacks::bishop_attacks(sq, occ);

        let rooks = dragons | self.piece_bb(PieceType::Rook, attacker);
        attackers |= rooks & attacks::rook_attacks(sq, occ);

        let kings = horses | dragons | self.piece_bb(PieceType::King, attacker);
        attackers |= kings & attacks::king_attacks(sq);

        attackers
    }

    /// 両手番のsqへの攻撃駒（SEE用、占有は引数で与える）
    pub fn all_attackers_to(&self, sq: Square, occ: Bitboard) -> Bitboard {
        let black = self.colors[Color::Black.index()];
        let white = self.colors[Color::White.index()];

        let mut attackers = Bitboard::EMPTY;

        let horses = self.piece_type_bb(PieceType::PromotedBishop);
        let dragons = self.piece_type_bb(PieceType::PromotedRook);

        let pawns = self.piece_type_bb(PieceType::Pawn);
        attackers |= pawns & black & attacks::pawn_attacks(Color::White, sq);
        attackers |= pawns & white & attacks::pawn_attacks(Color::Black, sq);

        let lances = self.piece_type_bb(PieceType::Lance);
        attackers |= lances & black & attacks::lance_attacks(Color::White, sq, occ);
        attackers |= lances & white & attacks::lance_attacks(Color::Black, sq, occ);

        let knights = self.piece_type_bb(PieceType::Knight);
        attackers |= knights & black & attacks::knight_attacks(Color::White, sq);
        attackers |= knights & white & attacks::knight_attacks(Color::Black, sq);

        let silvers = self.piece_type_bb(PieceType::Silver);
        attackers |= silvers & black & attacks::silver_attacks(Color::White, sq);
        attackers |= silvers & white & attacks::silver_attacks(Color::Black, sq);

        let golds = self.piece_type_bb(PieceType::Gold)
            | self.piece_type_bb(PieceType::PromotedPawn)
            | self.piece_type_bb(PieceType::PromotedLance)
            | self.piece_type_bb(PieceType::PromotedKnight)
            | self.piece_type_bb(PieceType::PromotedSilver);
        attackers |= golds & black & attacks::gold_attacks(Color::White, sq);
        attackers |= golds & white & attacks::gold_attacks(Color::Black, sq);

        let bishops = horses | self.piece_type_bb(PieceType::Bishop);
        attackers |= bishops & attacks::bishop_attacks(sq, occ);

        let rooks = dragons | self.piece_type_bb(PieceType::Rook);
        attackers |= rooks & attacks::rook_attacks(sq, occ);

        let kings = horses | dragons | self.piece_type_bb(PieceType::King);
        attackers |= kings & attacks::king_attacks(sq);

        attackers
    }

    /// キーをゼロから計算し直した値（差分更新の検証用）
    pub fn regenerated_key(&self) -> u64 {
        let mut keys = Keys::default();

        let mut occ = self.occupancy();
        while !occ.is_empty() {
            let sq = occ.pop();
            let piece = self.piece_on(sq).expect("mailbox out of sync");
            keys.flip_piece(piece, sq);
        }

        if self.stm == Color::White {
            keys.flip_stm();
        }

        for c in Color::ALL {
            let hand = self.hands[c.index()];
            for pt in PieceType::HAND {
                keys.flip_hand_count(c, pt, hand.count(pt));
            }
        }

        keys.value()
    }

    pub(crate) fn regen_key(&mut self) {
        self.keys = Keys::from_raw(self.regenerated_key());
    }

    pub(crate) fn add_piece(&mut self, sq: Square, piece: Piece) {
        debug_assert!(self.piece_on(sq).is_none());

        self.colors[piece.color().index()].set(sq);
        self.pieces[piece.piece_type().index()].set(sq);
        self.mailbox[sq.index()] = Some(piece);

        self.keys.flip_piece(piece, sq);
    }

    fn move_piece(&mut self, from: Square, to: Square, piece: Piece) {
        debug_assert_ne!(from, to);

        self.capture_on(to, piece.color());

        let move_bb = Bitboard::from_square(from) | Bitboard::from_square(to);
        self.colors[piece.color().index()] ^= move_bb;
        self.pieces[piece.piece_type().index()] ^= move_bb;

        self.mailbox[from.index()] = None;
        self.mailbox[to.index()] = Some(piece);

        self.keys.move_piece(piece, from, to);
    }

    fn promote_piece(&mut self, from: Square, to: Square, piece: Piece) {
        debug_assert_ne!(from, to);
        debug_assert!(!piece.is_promoted());

        self.capture_on(to, piece.color());

        let promoted = piece.promoted();

        self.colors[piece.color().index()] ^= Bitboard::from_square(from) | Bitboard::from_square(to);
        self.pieces[piece.piece_type().index()] ^= Bitboard::from_square(from);
        self.pieces[promoted.piece_type().index()] ^= Bitboard::from_square(to);

        self.mailbox[from.index()] = None;
        self.mailbox[to.index()] = Some(promoted);

        self.keys.flip_piece(piece, from);
        self.keys.flip_piece(promoted, to);
    }

    fn capture_on(&mut self, to: Square, capturer: Color) {
        let Some(captured) = self.piece_on(to) else {
            return;
        };
        debug_assert_ne!(captured.color(), capturer);
        debug_assert_ne!(captured.piece_type(), PieceType::King);

        self.colors[captured.color().index()].toggle(to);
        self.pieces[captured.piece_type().index()].toggle(to);

        let hand_pt = captured.piece_type().unpromoted();
        let new_count = self.hands[capturer.index()].increment(hand_pt);
        self.keys.switch_hand_count(capturer, hand_pt, new_count - 1, new_count);

        self.keys.flip_piece(captured, to);
    }

    fn drop_piece(&mut self, sq: Square, piece: Piece) {
        debug_assert!(self.piece_on(sq).is_none());
        debug_assert!(self.hands[piece.color().index()].count(piece.piece_type()) > 0);

        self.add_piece(sq, piece);

        let new_count = self.hands[piece.color().index()].decrement(piece.piece_type());
        self.keys
            .switch_hand_count(piece.color(), piece.piece_type(), new_count + 1, new_count);
    }

    pub(crate) fn update_attacks(&mut self) {
        let stm = self.stm;
        let nstm = stm.flip();

        let stm_king = self.king(stm);

        self.checkers = self.attackers_to(stm_king, nstm);
        self.pinned = Bitboard::EMPTY;

        let stm_occ = self.color_bb(stm);
        let nstm_occ = self.color_bb(nstm);

        let nstm_lances = self.piece_bb(PieceType::Lance, nstm);
        let nstm_bishops =
            self.piece_bb(PieceType::Bishop, nstm) | self.piece_bb(PieceType::PromotedBishop, nstm);
        let nstm_rooks =
            self.piece_bb(PieceType::Rook, nstm) | self.piece_bb(PieceType::PromotedRook, nstm);

        // 敵駒だけを占有として飛び利きを見ると、自駒を貫通した潜在的な攻撃駒が得られる
        let mut potential = (attacks::lance_attacks(stm, stm_king, nstm_occ) & nstm_lances)
            | (attacks::bishop_attacks(stm_king, nstm_occ) & nstm_bishops)
            | (attacks::rook_attacks(stm_king, nstm_occ) & nstm_rooks);

        while !potential.is_empty() {
            let attacker = potential.pop();
            let maybe_pinned = stm_occ & ray_between(attacker, stm_king);

            if maybe_pinned.exactly_one() {
                self.pinned |= maybe_pinned;
            }
        }
    }
}
