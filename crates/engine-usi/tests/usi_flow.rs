use assert_cmd::Command;
use predicates::str::contains;

fn run(script: &str) -> String {
    let mut cmd = Command::cargo_bin("engine-usi").expect("binary available");
    let output = cmd
        .write_stdin(script)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8_lossy(&output).into_owned()
}

#[test]
fn handshake_prints_id_and_options() {
    let out = run("usi\nquit\n");
    assert!(out.contains("id name"), "{out}");
    assert!(out.contains("id author"), "{out}");
    assert!(out.contains("option name USI_Hash type spin"), "{out}");
    assert!(out.contains("option name Threads type spin"), "{out}");
    assert!(out.lines().any(|l| l == "usiok"), "{out}");
}

#[test]
fn isready_answers_readyok() {
    let out = run("usi\nisready\nquit\n");
    assert!(out.lines().any(|l| l == "readyok"), "{out}");
}

#[test]
fn position_moves_are_applied() {
    let out = run("usi\nposition startpos moves 7g7f 3c3d\nd\nquit\n");
    assert!(
        out.contains("Sfen: lnsgkgsnl/1r5b1/pppppp1pp/6p2/9/2P6/PP1PPPPPP/1B5R1/LNSGKGSNL b - 3"),
        "{out}"
    );
}

#[test]
fn illegal_position_move_is_reported() {
    // 自分の駒の上に移動する手は弾かれ、局面は動かない
    let out = run("usi\nposition startpos moves 7g7g\nd\nquit\n");
    assert!(out.contains("illegal move '7g7g'"), "{out}");
    assert!(
        out.contains("Sfen: lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b - 1"),
        "{out}"
    );
}

#[test]
fn go_depth_produces_info_and_bestmove() {
    let out = run("usi\nisready\nposition startpos\ngo depth 3\nquit\n");
    assert!(out.contains("info depth"), "{out}");
    assert!(out.contains("score cp"), "{out}");
    assert!(out.contains(" pv "), "{out}");
    let best = out
        .lines()
        .find(|l| l.starts_with("bestmove "))
        .unwrap_or_else(|| panic!("no bestmove in {out}"));
    let mv = best.trim_start_matches("bestmove ").trim();
    assert!(engine_core::types::Move::from_usi(mv).is_ok(), "{best}");
}

#[test]
fn mate_in_one_is_reported_as_mate_score() {
    let out = run(
        "usi\nisready\nposition sfen 4k4/9/4P4/9/9/9/9/9/4K4 b G 1\ngo depth 4\nquit\n",
    );
    assert!(out.contains("score mate 1"), "{out}");
    assert!(out.contains("bestmove G*5b"), "{out}");
}

#[test]
fn mated_position_resigns() {
    let out = run("usi\nisready\nposition sfen 9/9/9/9/9/9/4k4/4g4/4K4 b - 1\ngo depth 2\nquit\n");
    assert!(out.contains("no legal moves"), "{out}");
    assert!(out.contains("bestmove resign"), "{out}");
}

#[test]
fn perft_command_counts_startpos() {
    let out = run("usi\nposition startpos\nperft 2\nquit\n");
    assert!(out.contains("total: 900"), "{out}");
}

#[test]
fn setoption_changes_hash_and_threads() {
    let out = run(
        "usi\nsetoption name USI_Hash value 8\nsetoption name Threads value 2\nisready\nposition startpos\ngo depth 2\nquit\n",
    );
    assert!(out.contains("bestmove"), "{out}");
    assert!(!out.contains("unknown option"), "{out}");
}

#[test]
fn commands_during_search_are_refused() {
    let out = run("usi\nisready\nposition startpos\ngo infinite\nposition startpos\nstop\nquit\n");
    assert!(out.contains("info string still searching"), "{out}");
    assert!(out.contains("bestmove"), "{out}");
}

#[test]
fn unknown_option_gets_info_string() {
    Command::cargo_bin("engine-usi")
        .unwrap()
        .write_stdin("usi\nsetoption name Bogus value 1\nquit\n")
        .assert()
        .success()
        .stdout(contains("unknown option 'Bogus'"));
}
