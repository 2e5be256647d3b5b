//! Move ordering. The [`MovePicker`] hands out generated moves from the most
//! to the least promising one: the remembered principal-variation move
//! first, then captures ordered by [MVV/LVA], then killer moves, then the
//! remaining quiet moves by their history score. Good ordering is what makes
//! alpha-beta cut: the earlier the best move is tried, the more of the tree
//! is pruned.
//!
//! [MVV/LVA]: https://www.chessprogramming.org/MVV-LVA

use arrayvec::ArrayVec;

use crate::chess::core::{Move, PieceKind};
use crate::chess::position::Position;
use crate::chess::movegen::{MoveList, MAX_MOVES};
use crate::search::state::SearchState;
use crate::evaluation::PIECE_VALUES;

const PV_SCORE: i32 = 1_000_000;
const CAPTURE_SCORE: i32 = 100_000;
const PROMOTION_SCORE: i32 = 90_000;
const KILLER_SCORE: i32 = 80_000;

pub(super) struct MovePicker {
    scored: ArrayVec<(Move, i32), MAX_MOVES>,
    index: usize,
}

impl MovePicker {
    /// Scores the moves for the given position. Quiet-move heuristics (PV
    /// hint, killers, history) are only consulted in the main search;
    /// quiescence orders purely by capture value.
    pub(super) fn new(
        position: &Position,
        moves: &MoveList,
        state: &SearchState,
        use_quiet_heuristics: bool,
    ) -> Self {
        let pv_hint = if use_quiet_heuristics {
            state.pv_hint(position.hash())
        } else {
            None
        };
        let mut scored = ArrayVec::new();
        for m in moves {
            let score = if pv_hint == Some(*m) {
                PV_SCORE
            } else if position.move_is_capture(*m) {
                let victim = position
                    .at(m.to())
                    .map_or(PieceKind::Pawn, |piece| piece.kind);
                let attacker = position
                    .at(m.from())
                    .map_or(PieceKind::Pawn, |piece| piece.kind);
                // Most valuable victim first, least valuable attacker as the
                // tie break.
                CAPTURE_SCORE + 10 * PIECE_VALUES[victim as usize]
                    - PIECE_VALUES[attacker as usize]
            } else if let Some(promotion) = m.promotion() {
                PROMOTION_SCORE + PIECE_VALUES[promotion as usize]
            } else if use_quiet_heuristics && state.is_killer(state.ply, *m) {
                KILLER_SCORE
            } else if use_quiet_heuristics {
                state.history(position.side_to_move(), m.from(), m.to()) as i32
            } else {
                0
            };
            scored.push((*m, score));
        }
        Self { scored, index: 0 }
    }

    /// Picks the best not-yet-returned move, or `None` when exhausted.
    pub(super) fn next(&mut self) -> Option<Move> {
        if self.index == self.scored.len() {
            return None;
        }
        let mut best = self.index;
        for i in self.index + 1..self.scored.len() {
            if self.scored[i].1 > self.scored[best].1 {
                best = i;
            }
        }
        self.scored.swap(self.index, best);
        let (m, _) = self.scored[self.index];
        self.index += 1;
        Some(m)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::MovePicker;
    use crate::chess::core::Move;
    use crate::chess::movegen::{generate_moves, MoveList};
    use crate::chess::position::Position;
    use crate::search::state::SearchState;

    fn setup(input: &str) -> Position {
        Position::try_from(input).expect("parsing legal position: {input}")
    }

    fn pick_all(position: &Position, state: &SearchState) -> Vec<String> {
        let mut moves = MoveList::new();
        generate_moves(position, &mut moves);
        let mut picker = MovePicker::new(position, &moves, state, true);
        let mut ordered = Vec::new();
        while let Some(m) = picker.next() {
            ordered.push(position.uci(m));
        }
        ordered
    }

    #[test]
    fn yields_every_move_once() {
        let position = Position::starting();
        let ordered = pick_all(&position, &SearchState::new());
        assert_eq!(ordered.len(), 20);
        let mut deduplicated = ordered.clone();
        deduplicated.sort();
        deduplicated.dedup();
        assert_eq!(deduplicated.len(), 20);
    }

    #[test]
    fn best_capture_first() {
        // A pawn can grab a queen, a rook can grab a pawn.
        let position = setup("4k3/5p2/2q5/3P4/8/5R2/8/4K3 w - - 0 1");
        let ordered = pick_all(&position, &SearchState::new());
        assert_eq!(ordered[0], "d5c6");
        assert_eq!(ordered[1], "f3f7");
    }

    #[test]
    fn pv_hint_trumps_captures() {
        let position = setup("4k3/5p2/2q5/3P4/8/5R2/8/4K3 w - - 0 1");
        let mut state = SearchState::new();
        let hint = position.parse_uci("e1d1").expect("legal move");
        state.update_pv(position.hash(), hint);
        let ordered = pick_all(&position, &state);
        assert_eq!(ordered[0], "e1d1");
        assert_eq!(ordered[1], "d5c6");
    }

    #[test]
    fn killers_before_other_quiets() {
        let position = Position::starting();
        let mut state = SearchState::new();
        let killer = Move::new(crate::chess::core::Square::G2, crate::chess::core::Square::G4);
        state.update_killers(0, killer);
        let ordered = pick_all(&position, &state);
        assert_eq!(ordered[0], "g2g4");
    }
}
