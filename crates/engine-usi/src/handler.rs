//! コマンド処理とエンジン出力
//!
//! USIとUCI互換はコマンドの流れが同じなので、ハンドラは方言に対して
//! 総称的に書き、文字列化の違いだけをDialectに委ねる。

use std::time::Instant;

use engine_core::perft::split_perft;
use engine_core::position::Position;
use engine_core::search::{
    CompoundLimiter, DisplayScore, Limiter, MoveTimeLimiter, NodeLimiter, SearchInfo,
    SearchReporter, TimeLimits, TimeManager,
};
use engine_core::tt::{DEFAULT_TT_SIZE_MIB, TT_SIZE_MIB_RANGE};
use engine_core::types::{Color, Move, MAX_DEPTH};

use crate::dialect::Dialect;
use crate::io::println_flush;
use crate::state::EngineState;

pub const ENGINE_NAME: &str = "Kestrel";
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ENGINE_AUTHOR: &str = "the Kestrel developers";

/// 最大スレッド数（公開オプションの上限）
const MAX_THREADS: usize = 256;

/// コマンド処理の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    Quit,
    Unknown,
}

/// 方言に依存しないプロトコルハンドラの入口
pub trait Protocol {
    fn print_initial_info(&self);
    fn handle(
        &self,
        state: &mut EngineState,
        command: &str,
        args: &[&str],
        start_time: Instant,
    ) -> CommandResult;
}

/// 探索結果を方言の形式で標準出力へ流すレポータ
pub struct DialectReporter<D: Dialect> {
    dialect: D,
}

impl<D: Dialect> DialectReporter<D> {
    pub fn new(dialect: D) -> DialectReporter<D> {
        DialectReporter { dialect }
    }
}

impl<D: Dialect> SearchReporter for DialectReporter<D> {
    fn search_info(&self, info: &SearchInfo) {
        let mut line = format!("info depth {}", info.depth);

        if let Some(seldepth) = info.seldepth {
            line.push_str(&format!(" seldepth {seldepth}"));
        }

        if let Some(time) = info.time_sec {
            line.push_str(&format!(" time {}", (time * 1000.0) as u64));
        }

        line.push_str(&format!(" nodes {}", info.nodes));

        if let Some(time) = info.time_sec {
            if time > 0.0 {
                line.push_str(&format!(" nps {}", (info.nodes as f64 / time) as u64));
            }
        }

        match info.score {
            DisplayScore::Cp(cp) => line.push_str(&format!(" score cp {cp}")),
            DisplayScore::Mate(plies) => {
                line.push_str(&format!(" score mate {}", self.dialect.format_mate(plies)))
            }
        }

        if let Some(hashfull) = info.hashfull {
            line.push_str(&format!(" hashfull {hashfull}"));
        }

        line.push_str(" pv");
        for &mv in info.pv {
            line.push(' ');
            line.push_str(&self.dialect.format_move(mv));
        }

        println_flush(&line);
    }

    fn info_string(&self, text: &str) {
        println_flush(&format!("info string {text}"));
    }

    fn best_move(&self, mv: Move) {
        if mv.is_none() {
            println_flush("bestmove resign");
        } else {
            println_flush(&format!("bestmove {}", self.dialect.format_move(mv)));
        }
    }
}

/// 方言総称のコマンドハンドラ
pub struct Handler<D: Dialect> {
    dialect: D,
}

impl<D: Dialect> Handler<D> {
    pub fn new(dialect: D) -> Handler<D> {
        Handler { dialect }
    }

    fn info_string(&self, text: &str) {
        println_flush(&format!("info string {text}"));
    }

    fn handle_position(&self, state: &mut EngineState, args: &[&str]) {
        if state.searcher.is_searching() {
            self.info_string("still searching");
            return;
        }

        if args.is_empty() {
            return;
        }

        let moves_at = args.iter().position(|&a| a == "moves").unwrap_or(args.len());

        if args[0] == "startpos" {
            state.pos = Position::startpos();
            state.key_history.clear();
        } else {
            match self.dialect.parse_position(&args[..moves_at]) {
                Ok(pos) => {
                    state.pos = pos;
                    state.key_history.clear();
                }
                Err(err) => {
                    self.info_string(&err);
                    return;
                }
            }
        }

        if moves_at >= args.len() {
            return;
        }

        for token in &args[moves_at + 1..] {
            let Ok(mv) = self.dialect.parse_move(token) else {
                self.info_string(&format!("invalid move '{token}'"));
                break;
            };
            if !state.pos.is_pseudolegal(mv) || !state.pos.is_legal(mv) {
                self.info_string(&format!("illegal move '{token}'"));
                break;
            }
            state.key_history.push(state.pos.key());
            state.pos = state.pos.apply_move(mv);
        }
    }

    fn handle_go(&self, state: &mut EngineState, args: &[&str], start_time: Instant) {
        if state.searcher.is_searching() {
            self.info_string("still searching");
            return;
        }

        let mut limiter = CompoundLimiter::new();
        let mut infinite = false;
        let mut max_depth = MAX_DEPTH;

        let mut btime: Option<f64> = None;
        let mut wtime: Option<f64> = None;
        let mut binc: Option<f64> = None;
        let mut winc: Option<f64> = None;

        let mut iter = args.iter();
        while let Some(&token) = iter.next() {
            let mut next_number = |what: &str| -> Option<u64> {
                match iter.next().and_then(|v| v.parse::<u64>().ok()) {
                    Some(v) => Some(v),
                    None => {
                        self.info_string(&format!("missing or invalid {what}"));
                        None
                    }
                }
            };

            if token == "infinite" {
                infinite = true;
            } else if token == "depth" {
                let Some(depth) = next_number("depth") else { return };
                max_depth = (depth as i32).clamp(1, MAX_DEPTH);
            } else if token == "nodes" {
                let Some(nodes) = next_number("node limit") else { return };
                limiter.add(Limiter::Node(NodeLimiter::new(nodes)));
            } else if token == "movetime" {
                let Some(ms) = next_number("move time limit") else { return };
                limiter.add(Limiter::MoveTime(MoveTimeLimiter::new(
                    start_time,
                    ms as f64 / 1000.0,
                )));
            } else if token == self.dialect.btime_token() {
                let Some(ms) = next_number(self.dialect.btime_token()) else { return };
                btime = Some(ms as f64 / 1000.0);
            } else if token == self.dialect.wtime_token() {
                let Some(ms) = next_number(self.dialect.wtime_token()) else { return };
                wtime = Some(ms as f64 / 1000.0);
            } else if token == self.dialect.binc_token() {
                let Some(ms) = next_number(self.dialect.binc_token()) else { return };
                binc = Some(ms as f64 / 1000.0);
            } else if token == self.dialect.winc_token() {
                let Some(ms) = next_number(self.dialect.winc_token()) else { return };
                winc = Some(ms as f64 / 1000.0);
            }
        }

        let (time, inc) = match state.pos.stm() {
            Color::Black => (btime, binc),
            Color::White => (wtime, winc),
        };

        if let Some(remaining) = time {
            limiter.add(Limiter::Time(TimeManager::new(
                start_time,
                TimeLimits {
                    remaining,
                    increment: inc.unwrap_or(0.0),
                },
            )));
        } else if inc.is_some() {
            self.info_string("warning: increment given but no time, ignoring");
        }

        state.searcher.start_search(
            &state.pos,
            &state.key_history,
            start_time,
            infinite,
            max_depth,
            Limiter::Compound(limiter),
        );
    }

    fn handle_setoption(&self, state: &mut EngineState, args: &[&str]) {
        if state.searcher.is_searching() {
            self.info_string("still searching");
            return;
        }

        if args.len() < 2 || args[0] != "name" {
            return;
        }

        let value_at = args.iter().position(|&a| a == "value");

        let Some(value_at) = value_at else {
            self.info_string("missing value");
            return;
        };
        if value_at + 1 >= args.len() {
            self.info_string("missing value");
            return;
        }

        let name = self.dialect.transform_option_name(&args[1].to_lowercase());
        let value = args[value_at + 1..].join(" ");

        match name.as_str() {
            "hash" => {
                if let Ok(mib) = value.parse::<usize>() {
                    let mib = mib.clamp(*TT_SIZE_MIB_RANGE.start(), *TT_SIZE_MIB_RANGE.end());
                    state.searcher.set_tt_size(mib);
                } else {
                    self.info_string(&format!("invalid hash size '{value}'"));
                }
            }
            "threads" => {
                if let Ok(threads) = value.parse::<usize>() {
                    state.searcher.set_threads(threads.clamp(1, MAX_THREADS));
                } else {
                    self.info_string(&format!("invalid thread count '{value}'"));
                }
            }
            "cutechessworkaround" => match value.as_str() {
                "true" => state.searcher.set_cute_chess_workaround(true),
                "false" => state.searcher.set_cute_chess_workaround(false),
                _ => self.info_string(&format!("invalid value '{value}'")),
            },
            _ => {
                self.info_string(&format!("unknown option '{}'", args[1]));
            }
        }
    }

    fn handle_display(&self, state: &EngineState) {
        let pos = &state.pos;

        println_flush(&self.dialect.board_string(pos));
        println_flush("");
        println_flush(&self.dialect.fen_line(pos));
        println_flush(&format!("Key: {:#018x}", pos.key()));

        let mut line = "Checkers:".to_string();
        let mut checkers = pos.checkers();
        while !checkers.is_empty() {
            line.push(' ');
            line.push_str(&checkers.pop().to_usi());
        }
        println_flush(&line);

        let mut line = "Pinned:".to_string();
        let mut pinned = pos.pinned();
        while !pinned.is_empty() {
            line.push(' ');
            line.push_str(&pinned.pop().to_usi());
        }
        println_flush(&line);
    }

    fn handle_split_perft(&self, state: &EngineState, args: &[&str]) {
        let Some(depth) = args.first().and_then(|a| a.parse::<i32>().ok()) else {
            return;
        };

        let start = Instant::now();
        let (splits, total) = split_perft(&state.pos, depth);

        for (mv, count) in &splits {
            println_flush(&format!("{} : {count}", self.dialect.format_move(*mv)));
        }

        let elapsed = start.elapsed().as_secs_f64();
        let nps = if elapsed > 0.0 { (total as f64 / elapsed) as u64 } else { 0 };

        println_flush("");
        println_flush(&format!("total: {total}"));
        println_flush(&format!("{nps} nps"));
    }
}

impl<D: Dialect> Protocol for Handler<D> {
    fn print_initial_info(&self) {
        println_flush(&format!("id name {ENGINE_NAME} {ENGINE_VERSION}"));
        println_flush(&format!("id author {ENGINE_AUTHOR}"));

        println_flush(&format!(
            "option name {} type spin default {} min {} max {}",
            self.dialect.option_name("Hash"),
            DEFAULT_TT_SIZE_MIB,
            TT_SIZE_MIB_RANGE.start(),
            TT_SIZE_MIB_RANGE.end()
        ));
        println_flush(&format!(
            "option name {} type spin default 1 min 1 max {}",
            self.dialect.option_name("Threads"),
            MAX_THREADS
        ));
        println_flush(&format!(
            "option name {} type check default false",
            self.dialect.option_name("CuteChessWorkaround")
        ));

        for line in self.dialect.extra_initial_info() {
            println_flush(line);
        }

        println_flush(self.dialect.ok_token());
    }

    fn handle(
        &self,
        state: &mut EngineState,
        command: &str,
        args: &[&str],
        start_time: Instant,
    ) -> CommandResult {
        match command {
            "quit" => return CommandResult::Quit,
            "isready" => {
                state.searcher.ensure_ready();
                println_flush("readyok");
            }
            "position" => self.handle_position(state, args),
            "go" => self.handle_go(state, args, start_time),
            "stop" => {
                if state.searcher.is_searching() {
                    state.searcher.stop();
                } else {
                    self.info_string("not searching");
                }
            }
            "setoption" => self.handle_setoption(state, args),
            "d" | "display" => self.handle_display(state),
            "splitperft" | "perft" => self.handle_split_perft(state, args),
            cmd if cmd == self.dialect.name() => self.print_initial_info(),
            cmd if cmd == self.dialect.newgame_command() => {
                if state.searcher.is_searching() {
                    self.info_string("still searching");
                } else {
                    state.searcher.new_game();
                }
            }
            _ => return CommandResult::Unknown,
        }

        CommandResult::Continue
    }
}
