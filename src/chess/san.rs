//! [Standard Algebraic Notation] (SAN) serialization and parsing for moves.
//! Both directions need the position the move is played in: SAN piece
//! disambiguation, captures and check suffixes all depend on the board.
//!
//! [Standard Algebraic Notation]: https://en.wikipedia.org/wiki/Algebraic_notation_(chess)

use crate::chess::core::{CastlingSide, File, Move, PieceKind, Rank, Square};
use crate::chess::movegen::{generate_moves, MoveList};
use crate::chess::position::Position;

fn kind_symbol(kind: PieceKind) -> char {
    match kind {
        PieceKind::Pawn => ' ',
        PieceKind::Knight => 'N',
        PieceKind::Bishop => 'B',
        PieceKind::Rook => 'R',
        PieceKind::Queen => 'Q',
        PieceKind::King => 'K',
    }
}

fn promotion_kind(symbol: char) -> Option<PieceKind> {
    match symbol.to_ascii_uppercase() {
        'N' => Some(PieceKind::Knight),
        'B' => Some(PieceKind::Bishop),
        'R' => Some(PieceKind::Rook),
        'Q' => Some(PieceKind::Queen),
        _ => None,
    }
}

impl Position {
    /// Serializes a legal move in SAN, including the '+'/'#' suffix (decided
    /// by applying the move to a scratch copy of the position).
    #[must_use]
    pub fn san(&self, m: Move) -> String {
        let mut result = self.san_without_check(m);
        let mut next = self.clone();
        let _ = next.do_move(m);
        if next.is_checkmate() {
            result.push('#');
        } else if next.is_in_check(next.side_to_move()) {
            result.push('+');
        }
        result
    }

    fn san_without_check(&self, m: Move) -> String {
        match m.castle() {
            Some(CastlingSide::Short) => return "O-O".to_string(),
            Some(CastlingSide::Long) => return "O-O-O".to_string(),
            None => {},
        }

        let moved = self
            .at(m.from())
            .expect("SAN move has a piece on the source square")
            .kind;

        let mut result = String::new();
        if moved != PieceKind::Pawn {
            result.push(kind_symbol(moved));

            // Disambiguate among all legal moves of the same piece kind to
            // the same destination: by file if that is enough, otherwise by
            // rank, otherwise by both.
            let mut moves = MoveList::new();
            generate_moves(self, &mut moves);
            let rivals: Vec<Move> = moves
                .into_iter()
                .filter(|other| {
                    other.castle().is_none()
                        && *other != m
                        && other.to() == m.to()
                        && self.at(other.from()).map(|piece| piece.kind) == Some(moved)
                })
                .collect();
            if !rivals.is_empty() {
                let file_unique = rivals.iter().all(|other| other.from().file() != m.from().file());
                let rank_unique = rivals.iter().all(|other| other.from().rank() != m.from().rank());
                if file_unique {
                    result.push_str(&m.from().file().to_string());
                } else if rank_unique {
                    result.push_str(&m.from().rank().to_string());
                } else {
                    result.push_str(&m.from().to_string());
                }
            }
        }

        if self.move_is_capture(m) {
            if moved == PieceKind::Pawn {
                result.push_str(&m.from().file().to_string());
            }
            result.push('x');
        }
        result.push_str(&m.to().to_string());
        if let Some(promotion) = m.promotion() {
            result.push('=');
            result.push(kind_symbol(promotion));
        }
        result
    }

    /// Parses a SAN move and returns it if it matches exactly one legal move
    /// in this position. Returns `None` for unparseable, illegal or
    /// ambiguous input.
    #[must_use]
    pub fn parse_san(&self, input: &str) -> Option<Move> {
        let mut moves = MoveList::new();
        generate_moves(self, &mut moves);

        let trimmed = input.trim_end_matches(['+', '#']);
        if trimmed == "O-O" || trimmed == "0-0" {
            return moves
                .into_iter()
                .find(|m| m.castle() == Some(CastlingSide::Short));
        }
        if trimmed == "O-O-O" || trimmed == "0-0-0" {
            return moves
                .into_iter()
                .find(|m| m.castle() == Some(CastlingSide::Long));
        }

        // Optional promotion suffix: "=Q" or bare "Q". A destination square
        // always ends with a rank digit, so a trailing letter can only be a
        // promotion.
        let mut body = trimmed;
        let mut promotion = None;
        if let Some(last) = body.chars().last() {
            if last.is_ascii_alphabetic() {
                promotion = Some(promotion_kind(last)?);
                body = &body[..body.len() - 1];
                body = body.strip_suffix('=').unwrap_or(body);
            }
        }

        if body.len() < 2 || !body.is_ascii() {
            return None;
        }
        let to = Square::try_from(&body[body.len() - 2..]).ok()?;

        let mut prefix = body[..body.len() - 2].chars().peekable();
        let mut kind = PieceKind::Pawn;
        if let Some(symbol) = prefix.peek() {
            if matches!(symbol, 'N' | 'B' | 'R' | 'Q' | 'K') {
                kind = match symbol {
                    'N' => PieceKind::Knight,
                    'B' => PieceKind::Bishop,
                    'R' => PieceKind::Rook,
                    'Q' => PieceKind::Queen,
                    _ => PieceKind::King,
                };
                let _ = prefix.next();
            }
        }
        let mut from_file: Option<File> = None;
        if let Some(symbol) = prefix.peek() {
            if ('a'..='h').contains(symbol) {
                from_file = File::try_from(*symbol).ok();
                let _ = prefix.next();
            }
        }
        let mut from_rank: Option<Rank> = None;
        if let Some(symbol) = prefix.peek() {
            if ('1'..='8').contains(symbol) {
                from_rank = Rank::try_from(*symbol).ok();
                let _ = prefix.next();
            }
        }
        if prefix.peek() == Some(&'x') {
            let _ = prefix.next();
        }
        if prefix.next().is_some() {
            return None;
        }

        let mut matching = moves.into_iter().filter(|m| {
            m.castle().is_none()
                && m.to() == to
                && self.at(m.from()).map(|piece| piece.kind) == Some(kind)
                && from_file.map_or(true, |file| m.from().file() == file)
                && from_rank.map_or(true, |rank| m.from().rank() == rank)
                && promotion.map_or(true, |p| m.promotion() == Some(p))
        });
        match (matching.next(), matching.next()) {
            (Some(m), None) => Some(m),
            // Unmatched or ambiguous.
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::chess::core::{CastlingSide, Move, PieceKind, Square};
    use crate::chess::position::Position;

    fn setup(input: &str) -> Position {
        Position::try_from(input).expect("parsing legal position: {input}")
    }

    #[test]
    fn plain_moves() {
        let position = Position::starting();
        assert_eq!(position.san(Move::new(Square::E2, Square::E4)), "e4");
        assert_eq!(position.san(Move::new(Square::G1, Square::F3)), "Nf3");
        assert_eq!(position.parse_san("e4"), Some(Move::new(Square::E2, Square::E4)));
        assert_eq!(position.parse_san("Nf3"), Some(Move::new(Square::G1, Square::F3)));
        assert_eq!(position.parse_san("Ke2"), None);
        assert_eq!(position.parse_san("garbage"), None);
    }

    #[test]
    fn file_disambiguation() {
        let position = setup("rnbqkbnr/pppppppp/8/8/8/5N2/PPPPPPPP/RNBQKB1R w KQkq - 0 1");
        assert_eq!(position.san(Move::new(Square::B1, Square::D2)), "Nbd2");
        assert_eq!(position.san(Move::new(Square::F3, Square::D2)), "Nfd2");
        assert_eq!(
            position.parse_san("Nbd2"),
            Some(Move::new(Square::B1, Square::D2))
        );
        // Ambiguous without the hint.
        assert_eq!(position.parse_san("Nd2"), None);
    }

    #[test]
    fn rank_disambiguation() {
        let position = setup("4k3/8/8/R7/8/8/8/R3K3 w - - 0 1");
        assert_eq!(position.san(Move::new(Square::A1, Square::A3)), "R1a3");
        assert_eq!(position.san(Move::new(Square::A5, Square::A3)), "R5a3");
        assert_eq!(
            position.parse_san("R5a3"),
            Some(Move::new(Square::A5, Square::A3))
        );
    }

    #[test]
    fn captures_and_en_passant() {
        let position = setup("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3");
        assert_eq!(position.san(Move::new(Square::E5, Square::F6)), "exf6");
        assert_eq!(
            position.parse_san("exf6"),
            Some(Move::new(Square::E5, Square::F6))
        );
    }

    #[test]
    fn promotions() {
        let position = setup("3n4/4P3/8/8/1k6/8/8/4K3 w - - 0 1");
        assert_eq!(
            position.san(Move::promoting(Square::E7, Square::D8, PieceKind::Queen)),
            "exd8=Q"
        );
        assert_eq!(
            position.parse_san("exd8=Q"),
            Some(Move::promoting(Square::E7, Square::D8, PieceKind::Queen))
        );
        assert_eq!(
            position.parse_san("e8N"),
            Some(Move::promoting(Square::E7, Square::E8, PieceKind::Knight))
        );
        // Promotion kind is required.
        assert_eq!(position.parse_san("e8"), None);
    }

    #[test]
    fn check_and_mate_suffixes() {
        let position = setup("4k3/8/8/8/8/8/4R3/4K3 w - - 0 1");
        assert_eq!(position.san(Move::new(Square::E2, Square::E7)), "Re7+");

        let position = setup("6k1/5ppp/8/8/8/8/8/4R1K1 w - - 0 1");
        assert_eq!(position.san(Move::new(Square::E1, Square::E8)), "Re8#");
        assert_eq!(
            position.parse_san("Re8#"),
            Some(Move::new(Square::E1, Square::E8))
        );
    }

    #[test]
    fn castling_notation() {
        let position = setup("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        assert_eq!(position.san(Move::castling(CastlingSide::Short)), "O-O");
        assert_eq!(position.san(Move::castling(CastlingSide::Long)), "O-O-O");
        assert_eq!(
            position.parse_san("O-O"),
            Some(Move::castling(CastlingSide::Short))
        );
        assert_eq!(
            position.parse_san("0-0-0"),
            Some(Move::castling(CastlingSide::Long))
        );
    }
}
