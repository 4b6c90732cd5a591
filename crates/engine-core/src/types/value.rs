//! 評価値と探索深さの定数

/// 評価値
pub type Score = i32;

/// 無限大
pub const SCORE_INF: Score = 32767;
/// 詰みスコア（ply 0で詰ましたときの値）
pub const SCORE_MATE: Score = 32766;
/// これ以上は勝ち確定として扱う閾値
pub const SCORE_WIN: Score = 25000;
/// 無効値
pub const SCORE_NONE: Score = -SCORE_INF;

/// 最大探索深さ
pub const MAX_DEPTH: i32 = 255;

/// 最大深さ以内の詰みスコアの下限
pub const SCORE_MAX_MATE: Score = SCORE_MATE - MAX_DEPTH;

/// ply手で詰ましたときのスコア
#[inline]
pub const fn mate_in(ply: i32) -> Score {
    SCORE_MATE - ply
}

/// ply手で詰まされたときのスコア
#[inline]
pub const fn mated_in(ply: i32) -> Score {
    -SCORE_MATE + ply
}

/// 詰みスコアかどうか
#[inline]
pub const fn is_mate_score(score: Score) -> bool {
    score >= SCORE_MAX_MATE || score <= -SCORE_MAX_MATE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mate_scores() {
        assert_eq!(mate_in(0), SCORE_MATE);
        assert_eq!(mated_in(0), -SCORE_MATE);
        assert!(is_mate_score(mate_in(5)));
        assert!(is_mate_score(mated_in(5)));
        assert!(!is_mate_score(SCORE_WIN - 1));
        assert!(mate_in(1) > mate_in(2));
        assert!(mated_in(1) < mated_in(2));
    }
}
