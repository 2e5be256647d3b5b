//! End-to-end search scenarios: the full stack from position setup through
//! iterative deepening to the reported `bestmove`.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rukh::chess::movegen::{generate_moves, MoveList};
use rukh::chess::position::Position;
use rukh::evaluation::endgame::Catalogue;
use rukh::evaluation::material::MaterialScorer;
use rukh::evaluation::KNOWN_WIN;
use rukh::search::{Limits, Search};

fn setup(input: &str) -> Position {
    Position::try_from(input).expect("parsing legal position: {input}")
}

fn run_search(position: &Position, limits: Limits) -> String {
    let mut search = Search::new(
        position.clone(),
        MaterialScorer,
        limits,
        Arc::new(AtomicBool::new(false)),
    );
    let mut out = Vec::new();
    search.run(&mut out).expect("writing to a buffer succeeds");
    String::from_utf8(out).expect("search output is ASCII")
}

fn bestmove(output: &str) -> String {
    output
        .lines()
        .find_map(|line| line.strip_prefix("bestmove "))
        .expect("search reports a bestmove")
        .to_string()
}

#[test]
fn depth_one_returns_a_legal_move() {
    let position = Position::starting();
    let output = run_search(
        &position,
        Limits {
            depth: 1,
            ..Limits::default()
        },
    );
    let best = bestmove(&output);
    let mut moves = MoveList::new();
    generate_moves(&position, &mut moves);
    assert!(
        moves.iter().any(|m| position.uci(*m) == best),
        "bestmove {best} is not one of the 20 legal moves"
    );
    assert!(output.contains("info depth 1 score cp"), "output: {output}");
    assert!(output.contains(" pv "), "output: {output}");
}

#[test]
fn kpk_is_recognized_as_won() {
    let position = setup("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
    assert!(!position.is_draw());
    let score = Catalogue::new()
        .probe(&position)
        .expect("KPK pattern applies");
    assert!(score >= KNOWN_WIN, "got {score}");
}

#[test]
fn bare_kings_are_drawn() {
    let position = setup("8/8/8/8/8/8/4k3/4K3 w - - 0 1");
    assert!(position.is_draw());
}

#[test]
fn finds_mate_in_two() {
    // Two rooks roll the king up the board.
    let position = setup("6k1/8/8/8/8/8/R7/1R5K w - - 0 1");
    let output = run_search(
        &position,
        Limits {
            depth: 4,
            ..Limits::default()
        },
    );
    assert!(output.contains("score mate "), "output: {output}");
    // The winning plan starts by cutting the king off with either rook.
    let best = bestmove(&output);
    assert!(best == "b1b7" || best == "a2a7", "bestmove: {best}");
}

#[test]
fn node_limit_terminates_the_search() {
    let position = Position::starting();
    let output = run_search(
        &position,
        Limits {
            nodes: 5_000,
            ..Limits::default()
        },
    );
    // Still produces a legal best move from the completed iterations.
    let best = bestmove(&output);
    let mut moves = MoveList::new();
    generate_moves(&position, &mut moves);
    assert!(moves.iter().any(|m| position.uci(*m) == best));
}

#[test]
fn movetime_terminates_the_search() {
    let position = Position::starting();
    let output = run_search(
        &position,
        Limits {
            movetime: 100,
            ..Limits::default()
        },
    );
    let _ = bestmove(&output);
}

#[test]
fn preset_stop_flag_still_reports_a_move() {
    // A search cancelled before any iteration completes falls back to some
    // legal move instead of staying silent.
    let position = Position::starting();
    let mut search = Search::new(
        position.clone(),
        MaterialScorer,
        Limits {
            depth: 1,
            ..Limits::default()
        },
        Arc::new(AtomicBool::new(true)),
    );
    let mut out = Vec::new();
    search.run(&mut out).expect("writing to a buffer succeeds");
    let output = String::from_utf8(out).expect("search output is ASCII");
    let best = bestmove(&output);
    let mut moves = MoveList::new();
    generate_moves(&position, &mut moves);
    assert!(moves.iter().any(|m| position.uci(*m) == best));
}
