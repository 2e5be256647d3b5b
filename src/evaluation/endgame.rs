//! Recognition of a small catalogue of endgame material signatures with
//! known outcomes. When a pattern applies, the returned score is exact (up
//! to the heuristic sweeteners that steer the winning side towards the
//! mating plan), which lets the search skip the generic scorer in trivially
//! decided positions.
//!
//! Patterns are plain `(applies, score)` function pairs registered for both
//! strong sides; the generic "king and extra material versus lone king"
//! pattern is the fallback when no specialized one fits.

use crate::chess::core::{File, Piece, PieceKind, Player};
use crate::chess::position::Position;
use crate::evaluation::{bitbase, Value, DRAW, EVAL_CEILING, KNOWN_WIN, PIECE_VALUES};

/// Weights to push the weak king to edges and corners.
#[rustfmt::skip]
const PUSH_TO_EDGE_BONUS: [Value; 64] = [
    100, 90, 80, 70, 70, 80, 90, 100,
     90, 60, 50, 40, 40, 50, 60,  90,
     80, 50, 30, 20, 20, 30, 40,  80,
     70, 40, 20, 10, 10, 20, 40,  70,
     70, 40, 20, 10, 10, 20, 40,  70,
     80, 50, 30, 20, 20, 30, 40,  80,
     90, 60, 50, 40, 40, 50, 60,  90,
    100, 90, 80, 70, 70, 80, 90, 100,
];

/// Weights to push the weak king to a corner of the right color. The
/// default pushes towards the dark corners (a1, h8); for a light-squared
/// bishop the board is flipped vertically first.
#[rustfmt::skip]
const PUSH_TO_DARK_CORNER_BONUS: [Value; 64] = [
    100, 90, 80, 70, 70, 60, 50,  40,
     90, 60, 50, 40, 40, 50, 60,  50,
     80, 50, 30, 20, 20, 30, 40,  60,
     70, 40, 20, 10, 10, 20, 40,  70,
     70, 40, 20, 10, 10, 20, 40,  70,
     60, 50, 30, 20, 20, 30, 40,  80,
     50, 60, 50, 40, 40, 50, 60,  90,
     40, 50, 60, 70, 70, 80, 90, 100,
];

/// Weights to bring both kings close to each other, by king distance.
const PUSH_CLOSE: [Value; 8] = [0, 7, 6, 5, 4, 3, 2, 1];

type AppliesFn = fn(&Position, Player) -> bool;
type ScoreFn = fn(&Position, Player) -> Value;

struct Pattern {
    strong_side: Player,
    applies: AppliesFn,
    score: ScoreFn,
}

/// The set of recognized endgame patterns. Specialized patterns (KPK, KNBK)
/// are consulted first; generic KXK covers the rest of the lone-king
/// positions.
pub struct Catalogue {
    patterns: Vec<Pattern>,
}

impl Catalogue {
    #[must_use]
    pub fn new() -> Self {
        let mut patterns = Vec::new();
        for strong_side in [Player::White, Player::Black] {
            patterns.push(Pattern {
                strong_side,
                applies: kpk_applies,
                score: kpk_score,
            });
            patterns.push(Pattern {
                strong_side,
                applies: knbk_applies,
                score: knbk_score,
            });
        }
        Self { patterns }
    }

    /// Returns the exact, side-to-move-oriented score when one side has a
    /// lone king and the other has extra material; `None` means no endgame
    /// knowledge applies and the generic scorer should be used.
    #[must_use]
    pub fn probe(&self, position: &Position) -> Option<Value> {
        let white_alone = lone_king(position, Player::White);
        let black_alone = lone_king(position, Player::Black);
        let strong_side = match (white_alone, black_alone) {
            (false, true) => Player::White,
            (true, false) => Player::Black,
            _ => return None,
        };
        for pattern in &self.patterns {
            if pattern.strong_side == strong_side && (pattern.applies)(position, strong_side) {
                return Some((pattern.score)(position, strong_side));
            }
        }
        Some(kxk_score(position, strong_side))
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::new()
    }
}

fn lone_king(position: &Position, side: Player) -> bool {
    position.pieces(side).count() == 1
}

fn oriented(value: Value, position: &Position, strong_side: Player) -> Value {
    if position.side_to_move() == strong_side {
        value
    } else {
        -value
    }
}

fn kpk_applies(position: &Position, strong_side: Player) -> bool {
    position.piece_count(Piece::new(strong_side, PieceKind::Pawn)) == 1
        && position
            .piece_count(Piece::new(strong_side.other(), PieceKind::Pawn))
            == 0
        && position.pieces_kind(PieceKind::Knight).is_empty()
        && position.pieces_kind(PieceKind::Bishop).is_empty()
        && position.pieces_kind(PieceKind::Rook).is_empty()
        && position.pieces_kind(PieceKind::Queen).is_empty()
}

// King and pawn versus king is decided exactly by the bitbase after
// canonicalizing the strong side to White and the pawn to the queenside
// half of the board.
fn kpk_score(position: &Position, strong_side: Player) -> Value {
    let mut strong_king = position.king_square(strong_side);
    let mut pawn = position.piece_list(Piece::new(strong_side, PieceKind::Pawn))[0];
    let mut weak_king = position.king_square(strong_side.other());

    if strong_side == Player::Black {
        strong_king = strong_king.flipped_vertically();
        pawn = pawn.flipped_vertically();
        weak_king = weak_king.flipped_vertically();
    }
    if pawn.file() > File::D {
        strong_king = strong_king.flipped_horizontally();
        pawn = pawn.flipped_horizontally();
        weak_king = weak_king.flipped_horizontally();
    }
    let us = if position.side_to_move() == strong_side {
        Player::White
    } else {
        Player::Black
    };

    if !bitbase::probe(strong_king, pawn, weak_king, us) {
        return DRAW;
    }
    let value = KNOWN_WIN + Value::from(pawn.rank() as u8);
    oriented(value, position, strong_side)
}

fn knbk_applies(position: &Position, strong_side: Player) -> bool {
    position.piece_count(Piece::new(strong_side, PieceKind::Knight)) == 1
        && position.piece_count(Piece::new(strong_side, PieceKind::Bishop)) == 1
        && position
            .piece_count(Piece::new(strong_side.other(), PieceKind::Knight))
            == 0
        && position
            .piece_count(Piece::new(strong_side.other(), PieceKind::Bishop))
            == 0
        && position.pieces_kind(PieceKind::Pawn).is_empty()
        && position.pieces_kind(PieceKind::Rook).is_empty()
        && position.pieces_kind(PieceKind::Queen).is_empty()
}

// Knight and bishop mate only works in a corner of the bishop's color: the
// score grows as the weak king is driven there.
fn knbk_score(position: &Position, strong_side: Player) -> Value {
    let weak_king = position.king_square(strong_side.other());
    let bishop = position.piece_list(Piece::new(strong_side, PieceKind::Bishop))[0];
    let light_squared = (bishop.rank() as u8 + bishop.file() as u8) % 2 == 1;

    let corner_key = if light_squared {
        weak_king.flipped_vertically()
    } else {
        weak_king
    };
    let value = KNOWN_WIN + PUSH_TO_DARK_CORNER_BONUS[corner_key as usize];
    oriented(Value::min(value, EVAL_CEILING - 1), position, strong_side)
}

// Any extra material against a lone king: count it and steer the strong
// king towards the weak one, the weak one towards the board edge.
fn kxk_score(position: &Position, strong_side: Player) -> Value {
    let strong_king = position.king_square(strong_side);
    let weak_king = position.king_square(strong_side.other());

    let mut value = DRAW;
    for kind in [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ] {
        value += PIECE_VALUES[kind as usize]
            * position.piece_count(Piece::new(strong_side, kind)) as Value;
    }
    value += PUSH_TO_EDGE_BONUS[weak_king as usize]
        + PUSH_CLOSE[strong_king.distance(weak_king) as usize];

    let value = Value::min(value + KNOWN_WIN, EVAL_CEILING - 1);
    oriented(value, position, strong_side)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Catalogue;
    use crate::chess::position::Position;
    use crate::evaluation::{DRAW, KNOWN_WIN};

    fn setup(input: &str) -> Position {
        Position::try_from(input).expect("parsing legal position: {input}")
    }

    #[test]
    fn nothing_to_recognize() {
        let catalogue = Catalogue::new();
        assert_eq!(catalogue.probe(&Position::starting()), None);
        // Both kings bare: no strong side.
        assert_eq!(catalogue.probe(&setup("8/8/8/8/8/8/4k3/4K3 w - - 0 1")), None);
        // Both sides still have material.
        assert_eq!(
            catalogue.probe(&setup("4k3/7p/8/8/8/8/4P3/4K3 w - - 0 1")),
            None
        );
    }

    #[test]
    fn kpk_win() {
        let catalogue = Catalogue::new();
        let score = catalogue
            .probe(&setup("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"))
            .expect("KPK applies");
        assert!(score >= KNOWN_WIN, "got {score}");
    }

    #[test]
    fn kpk_draw() {
        let catalogue = Catalogue::new();
        // Rook pawn with the defending king in front: dead draw.
        let score = catalogue
            .probe(&setup("8/1k6/8/K7/P7/8/8/8 w - - 0 1"))
            .expect("KPK applies");
        assert_eq!(score, DRAW);
    }

    #[test]
    fn kpk_strong_black() {
        let catalogue = Catalogue::new();
        // Mirror of the winning White position: Black to move owns the pawn.
        let score = catalogue
            .probe(&setup("4k3/4p3/8/8/8/8/8/4K3 b - - 0 1"))
            .expect("KPK applies");
        assert!(score >= KNOWN_WIN, "got {score}");
    }

    #[test]
    fn knbk_prefers_right_corner() {
        let catalogue = Catalogue::new();
        // Dark-squared bishop: the a1 corner is the right one, the a8 corner
        // is not.
        let in_right_corner = catalogue
            .probe(&setup("4K3/8/8/8/8/2N5/3B4/k7 w - - 0 1"))
            .expect("KNBK applies");
        let in_wrong_corner = catalogue
            .probe(&setup("k3K3/8/8/8/8/2N5/3B4/8 w - - 0 1"))
            .expect("KNBK applies");
        assert!(in_right_corner > in_wrong_corner);
        assert!(in_right_corner >= KNOWN_WIN);
    }

    #[test]
    fn kxk_material_and_edge() {
        let catalogue = Catalogue::new();
        let score = catalogue
            .probe(&setup("7k/8/5K2/8/8/8/8/6Q1 w - - 0 1"))
            .expect("KXK applies");
        assert!(score >= KNOWN_WIN + 900, "got {score}");

        // The weak side to move sees the mirrored score.
        let score = catalogue
            .probe(&setup("7k/8/5K2/8/8/8/8/6Q1 b - - 0 1"))
            .expect("KXK applies");
        assert!(score <= -(KNOWN_WIN + 900), "got {score}");
    }
}
