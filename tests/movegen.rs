//! Move generation correctness, pinned down by perft: the node counts of
//! full legal game trees are compared against the well-known reference
//! numbers. Perft exercises generation, do/undo and the special moves
//! (castling, en passant, promotions) together.

use rukh::chess::movegen::{generate_moves, MoveList};
use rukh::chess::position::Position;

fn setup(input: &str) -> Position {
    Position::try_from(input).expect("parsing legal position: {input}")
}

fn legal_move_count(position: &Position) -> usize {
    let mut moves = MoveList::new();
    generate_moves(position, &mut moves);
    moves.len()
}

#[test]
fn perft_starting_position() {
    let mut position = Position::starting();
    assert_eq!(position.perft(0), 1);
    assert_eq!(position.perft(1), 20);
    assert_eq!(position.perft(2), 400);
    assert_eq!(position.perft(3), 8_902);
    assert_eq!(position.perft(4), 197_281);
}

// Expensive in unoptimized builds; run with `cargo test -- --ignored` or in
// release mode.
#[ignore]
#[test]
fn perft_starting_position_deep() {
    let mut position = Position::starting();
    assert_eq!(position.perft(5), 4_865_609);
}

#[test]
fn perft_kiwipete() {
    let mut position =
        setup("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
    assert_eq!(position.perft(1), 48);
    assert_eq!(position.perft(2), 2_039);
    assert_eq!(position.perft(3), 97_862);
}

#[ignore]
#[test]
fn perft_kiwipete_deep() {
    let mut position =
        setup("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
    assert_eq!(position.perft(4), 4_085_603);
}

#[test]
fn perft_endgame() {
    // Position 3 from the chess programming wiki perft results.
    let mut position = setup("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1");
    assert_eq!(position.perft(1), 14);
    assert_eq!(position.perft(2), 191);
    assert_eq!(position.perft(3), 2_812);
    assert_eq!(position.perft(4), 43_238);
    assert_eq!(position.perft(5), 674_624);
}

#[test]
fn perft_promotions() {
    // Position 4: promotion-heavy.
    let mut position = setup("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1");
    assert_eq!(position.perft(1), 6);
    assert_eq!(position.perft(2), 264);
    assert_eq!(position.perft(3), 9_467);
    assert_eq!(position.perft(4), 422_333);
}

#[test]
fn perft_talkchess() {
    // Position 5: a well-known trap for castling/en-passant bugs.
    let mut position = setup("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8");
    assert_eq!(position.perft(1), 44);
    assert_eq!(position.perft(2), 1_486);
    assert_eq!(position.perft(3), 62_379);
    assert_eq!(position.perft(4), 2_103_487);
}

#[test]
fn chess_programming_wiki_move_counts() {
    // Depth-1 counts for the remaining reference positions.
    assert_eq!(
        legal_move_count(&setup(
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1"
        )),
        6
    );
    // Mirrored.
    assert_eq!(
        legal_move_count(&setup(
            "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1"
        )),
        6
    );
    assert_eq!(
        legal_move_count(&setup(
            "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10"
        )),
        46
    );
}

#[test]
fn en_passant_is_generated() {
    let position = setup("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3");
    let mut moves = MoveList::new();
    generate_moves(&position, &mut moves);
    assert!(moves.iter().any(|m| position.uci(*m) == "e5f6"));
}
