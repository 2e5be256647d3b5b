//! A very basic [`Scorer`] based on material advantage with "[standard piece
//! valuations]".
//!
//! While not very strong in practice, this scorer is great for exercising
//! the search and the rest of the infrastructure: it is stable, easy to
//! understand and deterministic.
//!
//! [standard piece valuations]: https://en.wikipedia.org/wiki/Chess_piece_relative_value

use crate::chess::core::{Piece, PieceKind, Player};
use crate::chess::position::Position;
use crate::evaluation::{Scorer, Value, PIECE_VALUES};

/// Counts material of both sides and returns the difference from the side to
/// move's perspective.
#[derive(Copy, Clone, Debug, Default)]
pub struct MaterialScorer;

fn side_material(position: &Position, player: Player) -> Value {
    [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ]
    .into_iter()
    .map(|kind| {
        PIECE_VALUES[kind as usize] * position.piece_count(Piece::new(player, kind)) as Value
    })
    .sum()
}

impl Scorer for MaterialScorer {
    fn score(&self, position: &Position) -> Value {
        let advantage =
            side_material(position, Player::White) - side_material(position, Player::Black);
        match position.side_to_move() {
            Player::White => advantage,
            Player::Black => -advantage,
        }
    }
}
