//! Move generation: produces all legal moves (or the capture/promotion
//! subset for quiescence search) for the side to move.
//!
//! Pseudo-legal candidates are enumerated per piece kind from the occupancy
//! bitboards and pre-calculated attack tables, then filtered for self-check
//! by simulating the post-move occupancy. Castling is validated in full at
//! generation time (rights, empty squares, attacked squares).
//!
//! Generation appends into a caller-supplied [`MoveList`]: the search owns a
//! scratch list per recursion depth so no allocation happens on the hot
//! path.

use arrayvec::ArrayVec;

use crate::chess::attacks::{
    bishop_attacks, pawn_attacks, queen_attacks, rook_attacks, KING_ATTACKS, KNIGHT_ATTACKS,
};
use crate::chess::bitboard::Bitboard;
use crate::chess::core::{
    CastleRights, CastlingSide, File, Move, PieceKind, Player, Rank, Square,
};
use crate::chess::position::Position;

/// No position has more legal moves than fit here.
pub const MAX_MOVES: usize = 256;

/// Fixed-capacity scratch buffer the generator appends into.
pub type MoveList = ArrayVec<Move, MAX_MOVES>;

/// Appends all legal moves of the side to move to `moves`.
pub fn generate_moves(position: &Position, moves: &mut MoveList) {
    generate_pseudo_legal::<false>(position, moves);
    moves.retain(|m| is_legal(position, *m));
}

/// Appends the quiescence subset (captures, including en passant, and
/// promotions) of legal moves to `moves`.
pub fn generate_quiescence(position: &Position, moves: &mut MoveList) {
    generate_pseudo_legal::<true>(position, moves);
    moves.retain(|m| is_legal(position, *m));
}

fn generate_pseudo_legal<const CAPTURES_ONLY: bool>(position: &Position, moves: &mut MoveList) {
    let us = position.side_to_move();
    let them = us.other();
    let occupied = position.occupied();
    let ours = position.pieces(us);
    let theirs = position.pieces(them);
    let allowed = if CAPTURES_ONLY { theirs } else { !ours };

    for from in position.pieces_of(us, PieceKind::Knight).iter() {
        for to in (KNIGHT_ATTACKS[from as usize] & allowed).iter() {
            moves.push(Move::new(from, to));
        }
    }
    for from in position.pieces_of(us, PieceKind::Bishop).iter() {
        for to in (bishop_attacks(from, occupied) & allowed).iter() {
            moves.push(Move::new(from, to));
        }
    }
    for from in position.pieces_of(us, PieceKind::Rook).iter() {
        for to in (rook_attacks(from, occupied) & allowed).iter() {
            moves.push(Move::new(from, to));
        }
    }
    for from in position.pieces_of(us, PieceKind::Queen).iter() {
        for to in (queen_attacks(from, occupied) & allowed).iter() {
            moves.push(Move::new(from, to));
        }
    }
    for from in position.pieces_of(us, PieceKind::King).iter() {
        for to in (KING_ATTACKS[from as usize] & allowed).iter() {
            moves.push(Move::new(from, to));
        }
    }

    let promotion_rank = them.backrank();
    let start_rank = match us {
        Player::White => Rank::Two,
        Player::Black => Rank::Seven,
    };
    for from in position.pieces_of(us, PieceKind::Pawn).iter() {
        for to in (pawn_attacks(us, from) & theirs).iter() {
            push_pawn_move(moves, from, to, promotion_rank);
        }
        if let Some(square) = position.en_passant_square() {
            if pawn_attacks(us, from).is_set(square) {
                moves.push(Move::new(from, square));
            }
        }
        let to = match from.shifted(us.push_offset()) {
            Some(to) => to,
            // A pawn never stands on the last rank.
            None => continue,
        };
        if occupied.is_set(to) {
            continue;
        }
        if to.rank() == promotion_rank {
            push_promotions(moves, from, to);
        } else if !CAPTURES_ONLY {
            moves.push(Move::new(from, to));
            if from.rank() == start_rank {
                if let Some(double) = to.shifted(us.push_offset()) {
                    if !occupied.is_set(double) {
                        moves.push(Move::new(from, double));
                    }
                }
            }
        }
    }

    if !CAPTURES_ONLY {
        generate_castling(position, moves);
    }
}

fn push_pawn_move(moves: &mut MoveList, from: Square, to: Square, promotion_rank: Rank) {
    if to.rank() == promotion_rank {
        push_promotions(moves, from, to);
    } else {
        moves.push(Move::new(from, to));
    }
}

fn push_promotions(moves: &mut MoveList, from: Square, to: Square) {
    for kind in [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ] {
        moves.push(Move::promoting(from, to, kind));
    }
}

// Emits a castling move only when the right is present, the squares between
// king and rook are empty and the king's current, crossed and landing
// squares are not attacked.
fn generate_castling(position: &Position, moves: &mut MoveList) {
    let us = position.side_to_move();
    let them = us.other();
    let rank = us.backrank();
    let occupied = position.occupied();
    let king = Square::new(File::E, rank);

    if position
        .castling_rights()
        .contains(CastleRights::single(us, CastlingSide::Short))
    {
        let crossed = Square::new(File::F, rank);
        let landing = Square::new(File::G, rank);
        if !occupied.is_set(crossed)
            && !occupied.is_set(landing)
            && !position.attacked(king, them)
            && !position.attacked(crossed, them)
            && !position.attacked(landing, them)
        {
            moves.push(Move::castling(CastlingSide::Short));
        }
    }
    if position
        .castling_rights()
        .contains(CastleRights::single(us, CastlingSide::Long))
    {
        let rook_path = Square::new(File::B, rank);
        let landing = Square::new(File::C, rank);
        let crossed = Square::new(File::D, rank);
        if !occupied.is_set(rook_path)
            && !occupied.is_set(landing)
            && !occupied.is_set(crossed)
            && !position.attacked(king, them)
            && !position.attacked(crossed, them)
            && !position.attacked(landing, them)
        {
            moves.push(Move::castling(CastlingSide::Long));
        }
    }
}

// A pseudo-legal move is legal when the mover's king is not attacked after
// it. Instead of making the move and rolling it back, the post-move
// occupancy is simulated: the mover leaves its source square, occupies the
// destination and the captured piece (the en passant victim included)
// disappears from its side's attack sets.
fn is_legal(position: &Position, m: Move) -> bool {
    if m.castle().is_some() {
        // Fully validated during generation.
        return true;
    }
    let us = position.side_to_move();
    let them = us.other();
    let from_bb = Bitboard::from(m.from());
    let to_bb = Bitboard::from(m.to());
    let mut occupancy = (position.occupied() - from_bb) | to_bb;
    let mut removed = if position.at(m.to()).is_some() {
        to_bb
    } else {
        Bitboard::empty()
    };

    let moved = match position.at(m.from()) {
        Some(piece) => piece,
        None => return false,
    };
    if moved.kind == PieceKind::Pawn && Some(m.to()) == position.en_passant_square() {
        let victim = match m.to().shifted(-us.push_offset()) {
            Some(square) => Bitboard::from(square),
            None => return false,
        };
        occupancy = occupancy - victim;
        removed = victim;
    }

    let king = if moved.kind == PieceKind::King {
        m.to()
    } else {
        position.king_square(us)
    };
    !position.attacked_with(king, them, occupancy, removed)
}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use pretty_assertions::assert_eq;

    use super::{generate_moves, generate_quiescence, MoveList};
    use crate::chess::position::Position;

    fn setup(input: &str) -> Position {
        Position::try_from(input).expect("parsing legal position: {input}")
    }

    fn get_moves(position: &Position) -> Vec<String> {
        let mut moves = MoveList::new();
        generate_moves(position, &mut moves);
        moves
            .iter()
            .map(|m| position.uci(*m))
            .sorted()
            .collect::<Vec<_>>()
    }

    fn sorted_moves(moves: &[&str]) -> Vec<String> {
        moves
            .iter()
            .map(|m| (*m).to_string())
            .sorted()
            .collect::<Vec<_>>()
    }

    #[test]
    fn starting_moves() {
        assert_eq!(
            get_moves(&Position::starting()),
            sorted_moves(&[
                "a2a3", "a2a4", "b1a3", "b1c3", "b2b3", "b2b4", "c2c3", "c2c4", "d2d3", "d2d4",
                "e2e3", "e2e4", "f2f3", "f2f4", "g1f3", "g1h3", "g2g3", "g2g4", "h2h3", "h2h4"
            ])
        );
    }

    #[test]
    fn double_check_evasions() {
        assert_eq!(
            get_moves(&setup("3kn3/R2p1N2/8/8/7B/6K1/3R4/8 b - - 0 1")),
            sorted_moves(&["d8c8"])
        );
        assert_eq!(
            get_moves(&setup("8/5Nk1/7p/4Bp2/3q4/8/8/5KR1 b - - 0 1")),
            sorted_moves(&["g7f8", "g7f7", "g7h7"])
        );
    }

    #[test]
    fn pins() {
        // The pawn is pinned but can capture en passant.
        assert_eq!(
            get_moves(&setup("6qk/8/8/3Pp3/8/8/K7/8 w - e6 0 1")),
            sorted_moves(&["a2a1", "a2a3", "a2b1", "a2b2", "a2b3", "d5e6"])
        );
        // The pawn is pinned and there is no en passant: it can't move.
        assert_eq!(
            get_moves(&setup("6qk/8/8/3Pp3/8/8/K7/8 w - - 0 1")),
            sorted_moves(&["a2a1", "a2a3", "a2b1", "a2b2", "a2b3"])
        );
        // The pawn is pinned by a bishop and can't move at all.
        assert_eq!(
            get_moves(&setup("k7/1p6/8/8/8/8/8/4K2B b - - 0 1")),
            sorted_moves(&["a8a7", "a8b8"])
        );
    }

    #[test]
    fn en_passant_discovered_check() {
        // Capturing en passant would expose the king along the fifth rank.
        assert_eq!(
            get_moves(&setup("8/8/8/KPp4r/8/8/6k1/8 w - c6 0 1")),
            sorted_moves(&["a5a4", "a5a6", "a5b6", "b5b6"])
        );
    }

    #[test]
    fn castle() {
        // Can castle both sides.
        assert_eq!(
            get_moves(&setup("r3k2r/8/8/8/8/8/6N1/4K3 b kq - 0 1")),
            sorted_moves(&[
                "a8a7", "a8a6", "a8a5", "a8a4", "a8a3", "a8a2", "a8a1", "a8b8", "a8c8", "a8d8",
                "h8f8", "h8g8", "h8h7", "h8h6", "h8h5", "h8h4", "h8h3", "h8h2", "h8h1", "e8e7",
                "e8d8", "e8d7", "e8f8", "e8f7", "e8c8", "e8g8"
            ])
        );
        // Castling short is blocked by an attack on the crossed square.
        assert_eq!(
            get_moves(&setup("r3k2r/8/8/8/8/8/6R1/4K3 b kq - 0 1")),
            sorted_moves(&[
                "a8a7", "a8a6", "a8a5", "a8a4", "a8a3", "a8a2", "a8a1", "a8b8", "a8c8", "a8d8",
                "h8f8", "h8g8", "h8h7", "h8h6", "h8h5", "h8h4", "h8h3", "h8h2", "h8h1", "e8e7",
                "e8d8", "e8d7", "e8f8", "e8f7", "e8c8"
            ])
        );
        // Castling long is not blocked: the attacked b8 square is not on the
        // king's path.
        assert_eq!(
            get_moves(&setup("r3k2r/8/8/8/8/8/1R6/4K3 b q - 0 1")),
            sorted_moves(&[
                "a8a7", "a8a6", "a8a5", "a8a4", "a8a3", "a8a2", "a8a1", "a8b8", "a8c8", "a8d8",
                "h8f8", "h8g8", "h8h7", "h8h6", "h8h5", "h8h4", "h8h3", "h8h2", "h8h1", "e8e7",
                "e8d8", "e8d7", "e8f8", "e8f7", "e8c8"
            ])
        );
    }

    #[test]
    fn quiescence_subset() {
        let position =
            setup("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3");
        let mut all = MoveList::new();
        generate_moves(&position, &mut all);
        let mut noisy = MoveList::new();
        generate_quiescence(&position, &mut noisy);
        // The only capture is the en passant one.
        assert_eq!(
            noisy.iter().map(|m| position.uci(*m)).collect::<Vec<_>>(),
            vec!["e5f6"]
        );
        for m in &noisy {
            assert!(all.contains(m));
            assert!(position.move_is_capture(*m) || m.promotion().is_some());
        }
    }

    #[test]
    fn quiescence_promotions() {
        let position = setup("3n4/4P3/8/8/1k6/8/8/4K3 w - - 0 1");
        let mut noisy = MoveList::new();
        generate_quiescence(&position, &mut noisy);
        assert_eq!(
            noisy.iter().map(|m| position.uci(*m)).sorted().collect::<Vec<_>>(),
            sorted_moves(&[
                "e7d8q", "e7d8r", "e7d8b", "e7d8n", "e7e8q", "e7e8r", "e7e8b", "e7e8n"
            ])
        );
    }
}
