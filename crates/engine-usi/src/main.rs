//! USI/UCI互換プロトコルのフロントエンド
//!
//! 標準入力を1行ずつ読み、ハンドシェイク（usi/uci）または--protocolで
//! 選ばれた方言のハンドラへ流す。探索本体はengine-core側にあり、
//! 出力はレポータ経由で方言の形式に整形される。

mod dialect;
mod handler;
mod io;
mod state;

use std::io::BufRead;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::warn;

use engine_core::search::Searcher;

use dialect::{Dialect, UciLike, Usi};
use handler::{CommandResult, DialectReporter, Handler, Protocol};
use state::EngineState;

/// 起動時に方言を固定する場合の指定
#[derive(Parser)]
#[command(name = "engine-usi")]
struct Args {
    /// プロトコル（usi または uci）。省略時は最初のコマンドで決まる。
    #[arg(long)]
    protocol: Option<String>,
}

fn create_session(key: &str) -> Option<(Box<dyn Protocol>, EngineState)> {
    fn build<D: Dialect>(dialect: D) -> (Box<dyn Protocol>, EngineState) {
        let reporter = Arc::new(DialectReporter::new(dialect));
        let searcher = Searcher::new(reporter);
        (Box::new(Handler::new(dialect)), EngineState::new(searcher))
    }

    match key {
        "usi" => Some(build(Usi)),
        "uci" => Some(build(UciLike)),
        _ => None,
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    if let Some(protocol) = &args.protocol {
        if !matches!(protocol.as_str(), "usi" | "uci") {
            anyhow::bail!("unknown protocol '{protocol}'");
        }
    }

    let stdin = std::io::stdin();
    let mut session: Option<(Box<dyn Protocol>, EngineState)> = None;

    for line in stdin.lock().lines() {
        let line = line?;
        let start_time = Instant::now();

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, cmd_args)) = tokens.split_first() else {
            continue;
        };

        if session.is_none() {
            let key = match command {
                "usi" | "uci" => command,
                _ => args.protocol.as_deref().unwrap_or("usi"),
            };
            session = create_session(key);
        }

        let (protocol, state) = session.as_mut().expect("session exists");

        match protocol.handle(state, command, cmd_args, start_time) {
            CommandResult::Continue => {}
            CommandResult::Quit => break,
            CommandResult::Unknown => warn!("unknown command '{command}'"),
        }
    }

    Ok(())
}
