//! Multi-threaded iterative-deepening alpha-beta search.
//!
//! N worker threads plus the caller's thread coordinate through three
//! barriers: `reset` and `idle` (workers + coordinator) hand out fresh work,
//! `search_end` (workers only) synchronizes completion. Workers share only
//! the transposition table, the stop flag and the per-thread counters; each
//! owns its position, key history and stack.

pub mod limits;
mod pv;
mod report;
mod thread;

pub use limits::{CompoundLimiter, Limiter, MoveTimeLimiter, NodeLimiter, TimeLimits, TimeManager};
pub use pv::PvList;
pub use report::{DisplayScore, NullReporter, SearchInfo, SearchReporter};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use lazy_static::lazy_static;

use crate::eval;
use crate::movegen::{self, MoveList, MovePicker};
use crate::position::{Position, SennichiteStatus};
use crate::tt::{Bound, TranspositionTable, DEFAULT_TT_SIZE_MIB};
use crate::types::{Move, Score, Square, MAX_DEPTH, SCORE_INF, SCORE_MATE, SCORE_MAX_MATE, SCORE_NONE};

use thread::{ThreadData, ThreadStats};

/// 千日手判定で遡る手数
const SENNICHITE_WINDOW: usize = 16;

/// 反復深化のワーカースタック（探索の再帰が深いので広めに取る）
const SEARCH_STACK_SIZE: usize = 16 * 1024 * 1024;

lazy_static! {
    /// LMRの削減量テーブル [depth][move_number]
    static ref LMR_TABLE: Box<[[i8; 64]; 256]> = {
        let mut table = Box::new([[0i8; 64]; 256]);
        for (depth, row) in table.iter_mut().enumerate().skip(1) {
            for (move_number, entry) in row.iter_mut().enumerate().skip(1) {
                *entry =
                    (0.2 + (depth as f64).ln() * (move_number as f64).ln() / 3.5).floor() as i8;
            }
        }
        table
    };
}

fn lmr_reduction(depth: i32, move_number: u32) -> i32 {
    LMR_TABLE[depth.clamp(0, 255) as usize][move_number.min(63) as usize] as i32
}

fn draw_score(nodes: u64) -> Score {
    2 - (nodes % 4) as Score
}

fn generate_legal(dst: &mut MoveList, pos: &Position) {
    let mut generated = MoveList::new();
    movegen::generate_all(&mut generated, pos);

    for &mv in &generated {
        if pos.is_legal(mv) {
            dst.push(mv);
        }
    }
}

struct Job {
    root_pos: Position,
    key_history: Vec<u64>,
    root_moves: MoveList,
    max_depth: i32,
    limiter: Limiter,
    start_time: Instant,
    infinite: bool,
    cute_chess_workaround: bool,
}

impl Job {
    fn idle() -> Job {
        Job {
            root_pos: Position::startpos(),
            key_history: Vec::new(),
            root_moves: MoveList::new(),
            max_depth: 0,
            limiter: Limiter::Compound(CompoundLimiter::new()),
            start_time: Instant::now(),
            infinite: false,
            cute_chess_workaround: false,
        }
    }
}

struct PoolShared {
    tt: Arc<TranspositionTable>,
    reporter: Arc<dyn SearchReporter>,

    reset_barrier: Barrier,
    idle_barrier: Barrier,
    search_end_barrier: Barrier,

    stop: AtomicBool,
    quit: AtomicBool,

    searching: Mutex<bool>,

    running_threads: Mutex<usize>,
    stop_signal: Condvar,

    job: Mutex<Job>,
    stats: Vec<Arc<ThreadStats>>,
}

/// 探索器
///
/// 構築時にレポータを受け取り、進捗と結果はすべてそこへ流す。
pub struct Searcher {
    tt: Arc<TranspositionTable>,
    reporter: Arc<dyn SearchReporter>,
    cute_chess_workaround: bool,

    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

impl Searcher {
    /// ワーカー1本で生成
    pub fn new(reporter: Arc<dyn SearchReporter>) -> Searcher {
        let tt = Arc::new(TranspositionTable::new(DEFAULT_TT_SIZE_MIB));
        let (shared, handles) = spawn_pool(tt.clone(), reporter.clone(), 1);
        Searcher {
            tt,
            reporter,
            cute_chess_workaround: false,
            shared,
            handles,
        }
    }

    /// ワーカー数を変更する（探索中は不可）
    pub fn set_threads(&mut self, threads: usize) {
        if threads == 0 {
            log::warn!("thread count 0 requested, using 1");
        }
        let threads = threads.max(1);
        if threads == self.shared.stats.len() {
            return;
        }

        self.stop();
        shutdown_pool(&self.shared, std::mem::take(&mut self.handles));

        let (shared, handles) = spawn_pool(self.tt.clone(), self.reporter.clone(), threads);
        self.shared = shared;
        self.handles = handles;
    }

    /// 置換表サイズを変更する。割り当ては次の探索開始まで遅延する。
    pub fn set_tt_size(&self, mib: usize) {
        self.tt.resize(mib);
    }

    /// 連続王手の千日手をcutechess互換の判定にする
    pub fn set_cute_chess_workaround(&mut self, enabled: bool) {
        self.cute_chess_workaround = enabled;
    }

    /// 新しい対局の準備
    pub fn new_game(&self) {
        self.tt.finalize();
        self.tt.clear();
    }

    /// isready相当。保留中の割り当てを済ませる。
    pub fn ensure_ready(&self) {
        self.tt.finalize();
    }

    /// 置換表の使用率（パーミル）
    pub fn hashfull(&self) -> u32 {
        self.tt.full_permille()
    }

    /// 探索を開始する。ワーカーを起こしてすぐ戻る。
    pub fn start_search(
        &self,
        pos: &Position,
        key_history: &[u64],
        start_time: Instant,
        infinite: bool,
        max_depth: i32,
        limiter: Limiter,
    ) {
        debug_assert!(!self.is_searching());

        let shared = &self.shared;

        // ワーカーをreset待ちから起こす
        shared.reset_barrier.wait();

        let mut searching = shared.searching.lock().unwrap();
        *searching = true;

        self.tt.finalize();

        let mut root_moves = MoveList::new();
        generate_legal(&mut root_moves, pos);

        let no_moves = root_moves.is_empty();
        if no_moves {
            self.reporter.info_string("no legal moves");
            self.reporter.search_info(&SearchInfo {
                depth: 1,
                seldepth: None,
                time_sec: None,
                nodes: 0,
                score: DisplayScore::Mate(0),
                pv: &[],
                hashfull: None,
            });
        }

        {
            let mut job = shared.job.lock().unwrap();
            *job = Job {
                root_pos: pos.clone(),
                key_history: key_history.to_vec(),
                root_moves,
                max_depth: if no_moves { 0 } else { max_depth.clamp(1, MAX_DEPTH) },
                limiter,
                start_time,
                infinite,
                cute_chess_workaround: self.cute_chess_workaround,
            };
        }

        for stats in &shared.stats {
            stats.reset();
        }

        shared.stop.store(false, Ordering::Relaxed);
        *shared.running_threads.lock().unwrap() = shared.stats.len();

        // ワーカーを探索へ送り出す
        shared.idle_barrier.wait();
    }

    /// 停止を要求し、全ワーカーが探索を抜けるまで待つ
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Relaxed);

        let mut running = self.shared.running_threads.lock().unwrap();
        while *running > 0 {
            running = self.shared.stop_signal.wait(running).unwrap();
        }
    }

    /// 探索中かどうか
    pub fn is_searching(&self) -> bool {
        *self.shared.searching.lock().unwrap()
    }
}

impl Drop for Searcher {
    fn drop(&mut self) {
        self.stop();
        shutdown_pool(&self.shared, std::mem::take(&mut self.handles));
    }
}

fn spawn_pool(
    tt: Arc<TranspositionTable>,
    reporter: Arc<dyn SearchReporter>,
    threads: usize,
) -> (Arc<PoolShared>, Vec<JoinHandle<()>>) {
    let stats: Vec<Arc<ThreadStats>> = (0..threads).map(|_| Arc::new(ThreadStats::default())).collect();

    let shared = Arc::new(PoolShared {
        tt,
        reporter,
        reset_barrier: Barrier::new(threads + 1),
        idle_barrier: Barrier::new(threads + 1),
        search_end_barrier: Barrier::new(threads),
        stop: AtomicBool::new(false),
        quit: AtomicBool::new(false),
        searching: Mutex::new(false),
        running_threads: Mutex::new(0),
        stop_signal: Condvar::new(),
        job: Mutex::new(Job::idle()),
        stats,
    });

    let handles = (0..threads)
        .map(|id| {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name(format!("search-{id}"))
                .stack_size(SEARCH_STACK_SIZE)
                .spawn(move || worker_loop(shared, id))
                .expect("failed to spawn search thread")
        })
        .collect();

    (shared, handles)
}

fn shutdown_pool(shared: &Arc<PoolShared>, handles: Vec<JoinHandle<()>>) {
    shared.quit.store(true, Ordering::Relaxed);

    shared.reset_barrier.wait();
    shared.idle_barrier.wait();

    for handle in handles {
        let _ = handle.join();
    }
}

fn worker_loop(shared: Arc<PoolShared>, id: usize) {
    let mut td = ThreadData::new(id, shared.stats[id].clone());

    loop {
        shared.reset_barrier.wait();
        shared.idle_barrier.wait();

        if shared.quit.load(Ordering::Relaxed) {
            return;
        }

        let (start_time, infinite) = {
            let job = shared.job.lock().unwrap();
            td.root_pos = job.root_pos.clone();
            td.key_history.clear();
            td.key_history.extend_from_slice(&job.key_history);
            td.root_moves = job.root_moves.clone();
            td.max_depth = job.max_depth;
            td.limiter = job.limiter.clone();
            td.cute_chess_workaround = job.cute_chess_workaround;
            (job.start_time, job.infinite)
        };

        run_search(&shared, &mut td, start_time, infinite);
    }
}

fn run_search(shared: &PoolShared, td: &mut ThreadData, start_time: Instant, infinite: bool) {
    let ctx = SearchContext { shared };

    if !td.root_moves.is_empty() {
        let root_pos = td.root_pos.clone();
        let mut root_pv = PvList::new();

        td.last_score = SCORE_NONE;
        td.last_pv.clear();
        td.depth_completed = 0;

        let mut depth = 1;
        loop {
            td.root_depth = depth;
            td.reset_seldepth();
            root_pv.clear();

            let score =
                ctx.search::<true, true>(td, &root_pos, &mut root_pv, depth, 0, -SCORE_INF, SCORE_INF);

            if ctx.has_stopped() {
                break;
            }

            td.depth_completed = depth;
            td.last_score = score;
            td.last_pv = root_pv.clone();

            if depth >= td.max_depth {
                break;
            }

            if td.is_main() {
                if !infinite && td.limiter.stop_soft(td.nodes()) {
                    break;
                }
                report(shared, td, start_time.elapsed().as_secs_f64());
            }

            depth += 1;
        }
    }

    let finish = |running: &Mutex<usize>| {
        *running.lock().unwrap() -= 1;
        shared.stop_signal.notify_all();
        shared.search_end_barrier.wait();
    };

    if td.is_main() {
        let mut searching = shared.searching.lock().unwrap();

        shared.stop.store(true, Ordering::Relaxed);
        finish(&shared.running_threads);

        if td.root_moves.is_empty() {
            shared.reporter.best_move(Move::NONE);
        } else {
            if td.depth_completed > 0 {
                report(shared, td, start_time.elapsed().as_secs_f64());
            }
            // 深さ1すら完了する前に停止された場合はルートの先頭の手を返す
            let best = if td.last_pv.is_empty() {
                td.root_moves.at(0)
            } else {
                td.last_pv.first()
            };
            shared.reporter.best_move(best);
        }

        *searching = false;
    } else {
        finish(&shared.running_threads);
    }
}

fn report(shared: &PoolShared, td: &ThreadData, time: f64) {
    let mut total_nodes = 0u64;
    let mut max_seldepth = 0;

    for stats in &shared.stats {
        total_nodes += stats.load_nodes();
        max_seldepth = max_seldepth.max(stats.load_seldepth());
    }

    let score = if td.last_score.abs() >= SCORE_MAX_MATE {
        if td.last_score > 0 {
            DisplayScore::Mate(SCORE_MATE - td.last_score)
        } else {
            DisplayScore::Mate(-(SCORE_MATE + td.last_score))
        }
    } else {
        let mut cp = td.last_score;
        // 千日手付近の揺らぎは0に丸める
        if cp.abs() <= 2 {
            cp = 0;
        }
        DisplayScore::Cp(cp)
    };

    shared.reporter.search_info(&SearchInfo {
        depth: td.depth_completed,
        seldepth: Some(max_seldepth),
        time_sec: Some(time),
        nodes: total_nodes,
        score,
        pv: td.last_pv.as_slice(),
        hashfull: Some(shared.tt.full_permille()),
    });
}

struct SearchContext<'a> {
    shared: &'a PoolShared,
}

impl SearchContext<'_> {
    #[inline]
    fn has_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::Relaxed)
    }

    fn search<const PV: bool, const ROOT: bool>(
        &self,
        td: &mut ThreadData,
        pos: &Position,
        pv: &mut PvList,
        depth: i32,
        ply: i32,
        mut alpha: Score,
        beta: Score,
    ) -> Score {
        debug_assert!(PV || !ROOT);
        debug_assert!((0..=MAX_DEPTH).contains(&ply));

        if !ROOT && td.is_main() && td.root_depth > 1 && td.limiter.stop_hard(td.nodes()) {
            self.shared.stop.store(true, Ordering::Relaxed);
            return 0;
        }

        if depth <= 0 {
            return self.qsearch::<PV>(td, pos, ply, alpha, beta, None);
        }

        td.inc_nodes();

        if PV {
            td.update_seldepth(ply + 1);
        }

        if ply >= MAX_DEPTH {
            return if pos.is_in_check() {
                0
            } else {
                eval::static_eval(pos)
            };
        }

        let tt_entry = self.shared.tt.probe(pos.key(), ply);
        let tt_move = tt_entry.map_or(Move::NONE, |e| e.mv);

        // 置換表による枝刈りはPVノードでは行わない
        if !PV {
            if let Some(entry) = tt_entry {
                if entry.depth >= depth {
                    match entry.bound {
                        Bound::Exact => return entry.score,
                        Bound::UpperBound if entry.score <= alpha => return entry.score,
                        Bound::LowerBound if entry.score >= beta => return entry.score,
                        _ => {}
                    }
                }
            }
        }

        // reverse futility pruning
        if !PV && !pos.is_in_check() && depth <= 4 {
            let static_eval = eval::static_eval(pos);
            if static_eval - 120 * depth >= beta {
                return static_eval;
            }
        }

        let mut best_score = -SCORE_INF;
        let mut best_move = Move::NONE;
        let mut bound = Bound::UpperBound;
        let mut legal_moves = 0u32;

        let lmr_move_threshold = if ROOT { 7 } else { 5 };

        let mut picker = MovePicker::new_main(pos, tt_move);
        let mut child_pv = PvList::new();

        loop {
            let mv = picker.next();
            if mv.is_none() {
                break;
            }

            if ROOT {
                if !td.root_moves.contains(mv) {
                    continue;
                }
            } else if !pos.is_legal(mv) {
                continue;
            }

            legal_moves += 1;
            child_pv.clear();

            let is_capture = pos.is_capture(mv);

            td.key_history.push(pos.key());
            let new_pos = pos.apply_move(mv);

            let sennichite =
                new_pos.test_sennichite(td.cute_chess_workaround, &td.key_history, SENNICHITE_WINDOW);

            let score = match sennichite {
                SennichiteStatus::Win => {
                    // 連続王手の千日手になる手は指せない
                    td.key_history.pop();
                    continue;
                }
                SennichiteStatus::Draw => draw_score(td.nodes()),
                SennichiteStatus::None => {
                    let new_depth = depth - 1;

                    if legal_moves == 1 {
                        -self.search::<PV, false>(
                            td,
                            &new_pos,
                            &mut child_pv,
                            new_depth,
                            ply + 1,
                            -beta,
                            -alpha,
                        )
                    } else {
                        // 後半の静かな手は削減した深さのゼロ窓で試す
                        let mut reduced_depth = new_depth;
                        if depth >= 2 && legal_moves > lmr_move_threshold && !is_capture {
                            let r = lmr_reduction(depth, legal_moves) + if PV { 1 } else { 0 };
                            reduced_depth = (new_depth - r).min(new_depth - 1).max(1);
                        }

                        let mut score = -self.search::<false, false>(
                            td,
                            &new_pos,
                            &mut child_pv,
                            reduced_depth,
                            ply + 1,
                            -(alpha + 1),
                            -alpha,
                        );

                        if score > alpha && reduced_depth < new_depth {
                            score = -self.search::<false, false>(
                                td,
                                &new_pos,
                                &mut child_pv,
                                new_depth,
                                ply + 1,
                                -(alpha + 1),
                                -alpha,
                            );
                        }

                        if PV && score > alpha {
                            score = -self.search::<true, false>(
                                td,
                                &new_pos,
                                &mut child_pv,
                                new_depth,
                                ply + 1,
                                -beta,
                                -alpha,
                            );
                        }

                        score
                    }
                }
            };

            td.key_history.pop();

            if self.has_stopped() {
                return 0;
            }

            if score > best_score {
                best_score = score;
            }

            if score > alpha {
                alpha = score;
                best_move = mv;
                bound = Bound::Exact;

                pv.update(mv, &child_pv);

                if score >= beta {
                    bound = Bound::LowerBound;
                    break;
                }
            }
        }

        if legal_moves == 0 {
            // 合法手なし = 詰み（将棋ではステイルメイトも負け）
            return -SCORE_MATE + ply;
        }

        self.shared
            .tt
            .put(pos.key(), best_score, best_move, depth, ply, bound);

        best_score
    }

    fn qsearch<const PV: bool>(
        &self,
        td: &mut ThreadData,
        pos: &Position,
        ply: i32,
        mut alpha: Score,
        beta: Score,
        capture_sq: Option<Square>,
    ) -> Score {
        td.inc_nodes();

        if PV {
            td.update_seldepth(ply + 1);
        }

        if ply >= MAX_DEPTH {
            return if pos.is_in_check() {
                0
            } else {
                eval::static_eval(pos)
            };
        }

        let stand_pat = eval::static_eval(pos);

        if stand_pat >= beta {
            return stand_pat;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        let mut best_score = stand_pat;

        let mut picker = MovePicker::new_qsearch(pos, capture_sq);

        loop {
            let mv = picker.next();
            if mv.is_none() {
                break;
            }

            if !pos.is_legal(mv) {
                continue;
            }

            let new_pos = pos.apply_move(mv);

            // 取り合いの応酬だけを掘る
            let score = -self.qsearch::<PV>(td, &new_pos, ply + 1, -beta, -alpha, Some(mv.to()));

            if self.has_stopped() {
                return 0;
            }

            if score > best_score {
                best_score = score;

                if score > alpha {
                    alpha = score;

                    if score >= beta {
                        break;
                    }
                }
            }
        }

        best_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct CollectingReporter {
        pub best: StdMutex<Option<Move>>,
        pub infos: StdMutex<Vec<(i32, DisplayScore)>>,
    }

    impl CollectingReporter {
        fn new() -> Arc<CollectingReporter> {
            Arc::new(CollectingReporter {
                best: StdMutex::new(None),
                infos: StdMutex::new(Vec::new()),
            })
        }
    }

    impl SearchReporter for CollectingReporter {
        fn search_info(&self, info: &SearchInfo) {
            self.infos.lock().unwrap().push((info.depth, info.score));
        }
        fn info_string(&self, _text: &str) {}
        fn best_move(&self, mv: Move) {
            *self.best.lock().unwrap() = Some(mv);
        }
    }

    fn search_to_depth(pos: &Position, depth: i32, threads: usize) -> (Move, Option<DisplayScore>) {
        let reporter = CollectingReporter::new();
        let mut searcher = Searcher::new(reporter.clone());
        searcher.set_threads(threads);
        searcher.set_tt_size(1);

        searcher.start_search(pos, &[], Instant::now(), false, depth, Limiter::Compound(CompoundLimiter::new()));

        // 探索終了を待つ
        while searcher.is_searching() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        searcher.stop();

        let best = reporter.best.lock().unwrap().unwrap_or(Move::NONE);
        let last = reporter.infos.lock().unwrap().last().map(|(_, s)| *s);
        (best, last)
    }

    #[test]
    fn test_search_returns_legal_move_from_startpos() {
        let pos = Position::startpos();
        let (best, _) = search_to_depth(&pos, 3, 1);
        assert!(best.is_some());
        assert!(pos.is_pseudolegal(best));
        assert!(pos.is_legal(best));
    }

    #[test]
    fn test_search_finds_mate_in_one() {
        // 後手玉は5aの一択、金を打てば詰み
        let pos = Position::from_sfen("4k4/9/4P4/9/9/9/9/9/4K4 b G 1").unwrap();
        let (best, score) = search_to_depth(&pos, 3, 1);
        assert_eq!(best, Move::from_usi("G*5b").unwrap());
        assert_eq!(score, Some(DisplayScore::Mate(1)));
    }

    #[test]
    fn test_search_reports_mate_zero_when_mated() {
        // 手番側に合法手が無い（頭金で詰まされている）
        let pos = Position::from_sfen("9/9/9/9/9/9/4k4/4g4/4K4 b - 1").unwrap();
        let reporter = CollectingReporter::new();
        let searcher = Searcher::new(reporter.clone());
        searcher.start_search(
            &pos,
            &[],
            Instant::now(),
            false,
            2,
            Limiter::Compound(CompoundLimiter::new()),
        );
        while searcher.is_searching() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        searcher.stop();
        assert_eq!(*reporter.best.lock().unwrap(), Some(Move::NONE));
    }

    #[test]
    fn test_multithreaded_search_completes() {
        let pos = Position::startpos();
        let (best, _) = search_to_depth(&pos, 3, 3);
        assert!(pos.is_legal(best));
    }

    #[test]
    fn test_node_limit_stops_search() {
        let reporter = CollectingReporter::new();
        let searcher = Searcher::new(reporter.clone());
        searcher.set_tt_size(1);

        searcher.start_search(
            &Position::startpos(),
            &[],
            Instant::now(),
            false,
            MAX_DEPTH,
            Limiter::Node(NodeLimiter::new(5_000)),
        );
        while searcher.is_searching() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        searcher.stop();
        assert!(reporter.best.lock().unwrap().is_some());
    }

    #[test]
    fn test_stop_interrupts_infinite_search() {
        let reporter = CollectingReporter::new();
        let searcher = Searcher::new(reporter.clone());
        searcher.set_tt_size(1);

        searcher.start_search(
            &Position::startpos(),
            &[],
            Instant::now(),
            true,
            MAX_DEPTH,
            Limiter::Compound(CompoundLimiter::new()),
        );
        std::thread::sleep(std::time::Duration::from_millis(30));
        searcher.stop();

        // stop()から戻った時点でワーカーは全て探索を抜けている
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        while searcher.is_searching() && Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(!searcher.is_searching());
    }

    #[test]
    fn test_lmr_table_matches_formula() {
        assert_eq!(lmr_reduction(1, 1), 0);
        let expected = (0.2 + (20f64).ln() * (30f64).ln() / 3.5).floor() as i32;
        assert_eq!(lmr_reduction(20, 30), expected);
        // 範囲外は端に丸める
        assert_eq!(lmr_reduction(300, 100), lmr_reduction(255, 63));
    }

    #[test]
    fn test_draw_score_jitter_band() {
        for nodes in 0..8u64 {
            let s = draw_score(nodes);
            assert!((-1..=2).contains(&s));
        }
    }
}
