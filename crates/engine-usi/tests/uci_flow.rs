use assert_cmd::Command;

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
fn uci_handshake() {
    let out = run("uci\nquit\n");
    assert!(out.contains("id name"), "{out}");
    assert!(out.contains("option name UCI_Variant"), "{out}");
    assert!(out.lines().any(|l| l == "uciok"), "{out}");
    // USIのプレフィックスは付かない
    assert!(out.contains("option name Hash type spin"), "{out}");
}

#[test]
fn uci_bestmove_uses_letter_file_notation() {
    let out = run("uci\nisready\nposition startpos\ngo depth 2\nquit\n");
    let best = out
        .lines()
        .find(|l| l.starts_with("bestmove "))
        .unwrap_or_else(|| panic!("no bestmove in {out}"));
    let mv = best.trim_start_matches("bestmove ").trim();
    assert!(engine_core::types::Move::from_uci(mv).is_ok(), "{best}");
}

#[test]
fn uci_position_fen_with_hand_brackets() {
    let out = run("uci\nposition fen 4k4/9/9/9/9/9/9/9/4K4[R] w - - 0 1\nd\nquit\n");
    // 盤面表示はUCI流（下に筋の英字）
    assert!(out.contains("   a   b   c   d   e   f   g   h   i"), "{out}");
    assert!(out.contains("Black pieces in hand: R"), "{out}");
    assert!(out.contains("Fen: 4k4/9/9/9/9/9/9/9/4K4[R] w - - 0 1"), "{out}");
}

#[test]
fn uci_clock_tokens_are_swapped() {
    // GUIのWhite = エンジンの先手なので、先手番でwtimeが使われる
    let out = run("uci\nisready\nposition startpos\ngo wtime 1000 btime 1000 winc 100 binc 100\nquit\n");
    assert!(out.contains("bestmove"), "{out}");
    assert!(!out.contains("warning: increment given but no time"), "{out}");
}

#[test]
fn uci_newgame_command() {
    let out = run("uci\nucinewgame\nisready\nquit\n");
    assert!(out.lines().any(|l| l == "readyok"), "{out}");
}
