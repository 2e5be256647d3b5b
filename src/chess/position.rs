//! Provides fully-specified [Chess Position] implementation: stores
//! information about the board and tracks the state of castling, 50-move rule
//! draw, en passant and repetitions.
//!
//! The position is the only mutable state of the engine core. It is mutated
//! exclusively through [`Position::do_move`]/[`Position::undo_move`] (and
//! their null-move counterparts), which keep the square-centric board, the
//! piece-centric bitboards, the piece lists and the incremental Zobrist key
//! consistent with each other.
//!
//! [Chess Position]: https://www.chessprogramming.org/Chess_Position

use std::fmt;
use std::num::NonZeroU16;

use anyhow::{bail, Context};
use arrayvec::ArrayVec;
use itertools::Itertools;
use strum::IntoEnumIterator;

use crate::chess::attacks::{
    bishop_attacks, pawn_attacks, rook_attacks, KING_ATTACKS, KNIGHT_ATTACKS,
};
use crate::chess::bitboard::Bitboard;
use crate::chess::core::{
    CastleRights, CastlingSide, File, Move, MoveInfo, Piece, PieceKind, Player, Rank, Square,
    BOARD_SIZE, BOARD_WIDTH,
};
use crate::chess::movegen::{generate_moves, MoveList};
use crate::chess::zobrist::{HashKey, Key};
use crate::evaluation::{Value, PIECE_VALUES};

/// The longest game the position will track for repetition detection.
pub const MAX_PLIES: usize = 1024;

const MAX_PIECES_OF_KIND: usize = 10;

const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// State of the chess game: the board itself, half-move counters, castling
/// rights, en passant square and the history of position keys seen so far. It
/// has 1:1 relationship with [Forsyth-Edwards Notation] (FEN).
///
/// [`Position::try_from()`] provides a convenient interface for creating a
/// [`Position`]: it cleans up the input and accepts both FEN and a trimmed
/// version of it (EPD body) found in many databases.
///
/// [Forsyth-Edwards Notation]: https://www.chessprogramming.org/Forsyth-Edwards_Notation
#[derive(Clone)]
pub struct Position {
    board: [Option<Piece>; BOARD_SIZE as usize],
    by_color: [Bitboard; 2],
    by_kind: [Bitboard; 6],
    piece_squares: [[Square; MAX_PIECES_OF_KIND]; 12],
    piece_counts: [u8; 12],
    side_to_move: Player,
    castling: CastleRights,
    en_passant: Option<Square>,
    halfmove_clock: u8,
    ply: u16,
    hash: HashKey,
    history: ArrayVec<Key, MAX_PLIES>,
}

impl Position {
    fn empty_board() -> Self {
        Self {
            board: [None; BOARD_SIZE as usize],
            by_color: [Bitboard::empty(); 2],
            by_kind: [Bitboard::empty(); 6],
            piece_squares: [[Square::A1; MAX_PIECES_OF_KIND]; 12],
            piece_counts: [0; 12],
            side_to_move: Player::White,
            castling: CastleRights::empty(),
            en_passant: None,
            halfmove_clock: 0,
            ply: 1,
            hash: HashKey::new(),
            history: ArrayVec::new(),
        }
    }

    /// Creates the starting position of the standard chess variant.
    ///
    /// ```
    /// use rukh::chess::position::Position;
    ///
    /// let starting_position = Position::starting();
    /// assert_eq!(
    ///     &starting_position.to_string(),
    ///     "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
    /// );
    /// ```
    #[must_use]
    pub fn starting() -> Self {
        Self::from_fen(STARTING_FEN).expect("starting position FEN is valid")
    }

    /// Builds a position from an explicit piece placement. Castling rights
    /// are empty and counters start fresh; mostly useful for setting up
    /// endgame studies and tests.
    #[must_use]
    pub fn from_pieces(pieces: &[(Piece, Square)], side_to_move: Player) -> Self {
        let mut position = Self::empty_board();
        for (piece, square) in pieces {
            position.place(*piece, *square);
        }
        position.side_to_move = side_to_move;
        position.rebuild_hash();
        position.history.push(position.hash.key());
        position
    }

    /// Parses board from Forsyth-Edwards Notation.
    ///
    /// FEN ::=
    ///       Piece Placement
    ///   ' ' Side to move
    ///   ' ' Castling ability
    ///   ' ' En passant target square
    ///   ' ' Halfmove clock
    ///   ' ' Fullmove counter
    ///
    /// # Errors
    ///
    /// Returns an error when the input does not follow the FEN grammar or
    /// describes an impossible position (e.g. no kings or pawns on
    /// backranks).
    pub fn from_fen(fen: &str) -> anyhow::Result<Self> {
        let (placement, side_to_move, castling, en_passant, halfmove_clock, fullmove_counter) =
            match fen.split_ascii_whitespace().collect_tuple() {
                Some(parts) => parts,
                None => bail!(
                    "incorrect FEN: expected 6 parts, got {}",
                    fen.split_ascii_whitespace().count()
                ),
            };

        let mut position = Self::empty_board();
        let mut rank_id = BOARD_WIDTH;
        for rank_fen in placement.split('/') {
            if rank_id == 0 {
                bail!("incorrect FEN: expected 8 ranks, got {placement}");
            }
            rank_id -= 1;
            let rank = Rank::try_from(rank_id)?;
            let mut file: u8 = 0;
            for symbol in rank_fen.chars() {
                if let Some(skip) = symbol.to_digit(10) {
                    file += skip as u8;
                    continue;
                }
                if file >= BOARD_WIDTH {
                    bail!("incorrect FEN: rank {rank_fen} does not fit into 8 files");
                }
                let piece = Piece::try_from(symbol)?;
                let square = Square::new(file.try_into()?, rank);
                if position.piece_counts[piece.index()] as usize == MAX_PIECES_OF_KIND {
                    bail!("incorrect FEN: too many '{piece}' pieces");
                }
                position.place(piece, square);
                file += 1;
            }
            if file != BOARD_WIDTH {
                bail!(
                    "incorrect FEN: rank size should be exactly {BOARD_WIDTH}, \
                     got {rank_fen} of length {file}"
                );
            }
        }
        if rank_id != 0 {
            bail!("incorrect FEN: there should be 8 ranks, got {placement}");
        }

        position.side_to_move = side_to_move.try_into()?;
        position.castling = castling.try_into()?;
        if en_passant != "-" {
            position.en_passant = Some(en_passant.try_into()?);
        }
        position.halfmove_clock = halfmove_clock
            .parse::<u8>()
            .with_context(|| format!("incorrect FEN: halfmove clock can not be parsed {halfmove_clock}"))?;
        let fullmove = fullmove_counter
            .parse::<NonZeroU16>()
            .with_context(|| format!("incorrect FEN: fullmove counter can not be parsed {fullmove_counter}"))?;
        let ply = 2 * u32::from(fullmove.get()) - 1
            + u32::from(position.side_to_move == Player::Black);
        position.ply = ply.min(u32::from(u16::MAX)) as u16;

        position.normalize_castling();
        position.validate()?;
        position.rebuild_hash();
        position.history.push(position.hash.key());
        Ok(position)
    }

    // Castling rights are meaningless without the king and the rook on
    // their home squares; drop them instead of refusing the position.
    fn normalize_castling(&mut self) {
        for player in [Player::White, Player::Black] {
            let king_home = Square::new(File::E, player.backrank());
            if self.at(king_home) != Some(Piece::new(player, PieceKind::King)) {
                self.castling -= CastleRights::both(player);
                continue;
            }
            for side in [CastlingSide::Short, CastlingSide::Long] {
                if self.at(Self::rook_home(player, side))
                    != Some(Piece::new(player, PieceKind::Rook))
                {
                    self.castling -= CastleRights::single(player, side);
                }
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        for player in [Player::White, Player::Black] {
            let name = match player {
                Player::White => "white",
                Player::Black => "black",
            };
            let kings = self.piece_counts[Piece::new(player, PieceKind::King).index()];
            if kings != 1 {
                bail!("expected 1 {name} king, got {kings}");
            }
            let pawns = self.piece_counts[Piece::new(player, PieceKind::Pawn).index()];
            if pawns > 8 {
                bail!("expected <= 8 {name} pawns, got {pawns}");
            }
        }
        let backranks = Bitboard::rank_mask(Rank::One) | Bitboard::rank_mask(Rank::Eight);
        if (self.by_kind[PieceKind::Pawn as usize] & backranks).any() {
            bail!("pawns can not be placed on backranks");
        }
        if let Some(square) = self.en_passant {
            let expected = match self.side_to_move {
                Player::White => Rank::Six,
                Player::Black => Rank::Three,
            };
            if square.rank() != expected {
                bail!(
                    "expected en passant square to be on rank {}, got {}",
                    expected as u8 + 1,
                    square.rank()
                );
            }
        }
        if self.is_in_check(self.side_to_move.other()) {
            bail!("the {} king can be captured: it is not their turn", match self.side_to_move.other() {
                Player::White => "white",
                Player::Black => "black",
            });
        }
        Ok(())
    }

    // Puts a piece on a square without touching the hash; used by the
    // constructors which rebuild the hash from scratch afterwards.
    fn place(&mut self, piece: Piece, square: Square) {
        debug_assert!(self.board[square as usize].is_none());
        self.board[square as usize] = Some(piece);
        self.by_color[piece.owner as usize] |= Bitboard::from(square);
        self.by_kind[piece.kind as usize] |= Bitboard::from(square);
        let index = piece.index();
        self.piece_squares[index][self.piece_counts[index] as usize] = square;
        self.piece_counts[index] += 1;
    }

    fn rebuild_hash(&mut self) {
        let mut hash = HashKey::new();
        if self.side_to_move == Player::White {
            hash.flip_side();
        }
        for square in Square::iter() {
            if let Some(piece) = self.board[square as usize] {
                hash.toggle_piece(piece, square);
            }
        }
        hash.set_castling(self.castling);
        if let Some(square) = self.en_passant {
            if self.en_passant_capturable(square) {
                hash.set_en_passant(square.file());
            }
        }
        self.hash = hash;
    }

    // The en passant file participates in the hash only when a pawn of the
    // side to move can actually capture to the square. Required for Polyglot
    // key compatibility and makes repetition detection ignore dead en
    // passant squares.
    fn en_passant_capturable(&self, square: Square) -> bool {
        let us = self.side_to_move;
        (pawn_attacks(us.other(), square) & self.pieces_of(us, PieceKind::Pawn)).any()
    }

    /// The player whose turn it is to move.
    #[must_use]
    pub fn side_to_move(&self) -> Player {
        self.side_to_move
    }

    /// Castling rights of both players.
    #[must_use]
    pub fn castling_rights(&self) -> CastleRights {
        self.castling
    }

    /// The square behind a pawn that has just advanced two ranks, if any.
    #[must_use]
    pub fn en_passant_square(&self) -> Option<Square> {
        self.en_passant
    }

    /// Plies since the last capture or pawn move, for the fifty-move rule.
    #[must_use]
    pub fn halfmove_clock(&self) -> u8 {
        self.halfmove_clock
    }

    /// Total plies from the start of the modeled game.
    #[must_use]
    pub fn ply(&self) -> u16 {
        self.ply
    }

    /// The incrementally maintained Zobrist key of the position.
    #[must_use]
    pub fn hash(&self) -> Key {
        self.hash.key()
    }

    /// The Zobrist key of pawn placements alone.
    #[must_use]
    pub fn pawn_hash(&self) -> Key {
        self.hash.pawn_key()
    }

    /// The piece occupying the given square, if any.
    #[must_use]
    pub fn at(&self, square: Square) -> Option<Piece> {
        self.board[square as usize]
    }

    /// All occupied squares.
    #[must_use]
    pub(crate) fn occupied(&self) -> Bitboard {
        self.by_color[0] | self.by_color[1]
    }

    /// Squares occupied by the given player.
    #[must_use]
    pub(crate) fn pieces(&self, player: Player) -> Bitboard {
        self.by_color[player as usize]
    }

    /// Squares occupied by pieces of the given kind, both colors.
    #[must_use]
    pub(crate) fn pieces_kind(&self, kind: PieceKind) -> Bitboard {
        self.by_kind[kind as usize]
    }

    /// Squares occupied by the given player's pieces of the given kind.
    #[must_use]
    pub(crate) fn pieces_of(&self, player: Player, kind: PieceKind) -> Bitboard {
        self.by_color[player as usize] & self.by_kind[kind as usize]
    }

    /// Number of pieces of the exact given type on the board.
    #[must_use]
    pub fn piece_count(&self, piece: Piece) -> usize {
        self.piece_counts[piece.index()] as usize
    }

    /// The (unordered) squares of all pieces of the given type.
    #[must_use]
    pub fn piece_list(&self, piece: Piece) -> &[Square] {
        &self.piece_squares[piece.index()][..self.piece_counts[piece.index()] as usize]
    }

    /// The square of the given player's king.
    #[must_use]
    pub fn king_square(&self, player: Player) -> Square {
        let piece = Piece::new(player, PieceKind::King);
        debug_assert!(self.piece_counts[piece.index()] == 1);
        self.piece_squares[piece.index()][0]
    }

    /// Number of the player's knights, bishops, rooks and queens.
    #[must_use]
    pub(crate) fn non_pawn_material(&self, player: Player) -> usize {
        [
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
        ]
        .into_iter()
        .map(|kind| self.piece_count(Piece::new(player, kind)))
        .sum()
    }

    fn add_piece(&mut self, piece: Piece, square: Square) {
        self.place(piece, square);
        self.hash.toggle_piece(piece, square);
    }

    fn remove_piece(&mut self, square: Square) {
        let piece = self.board[square as usize]
            .take()
            .expect("removed square is occupied");
        self.by_color[piece.owner as usize] ^= Bitboard::from(square);
        self.by_kind[piece.kind as usize] ^= Bitboard::from(square);
        let index = piece.index();
        let count = self.piece_counts[index] as usize;
        let list = &mut self.piece_squares[index];
        for i in 0..count {
            if list[i] == square {
                list[i] = list[count - 1];
                break;
            }
        }
        self.piece_counts[index] -= 1;
        self.hash.toggle_piece(piece, square);
    }

    fn move_piece(&mut self, from: Square, to: Square) {
        debug_assert!(self.board[to as usize].is_none());
        let piece = self.board[from as usize]
            .take()
            .expect("moved square is occupied");
        self.board[to as usize] = Some(piece);
        let change = Bitboard::from(from) | Bitboard::from(to);
        self.by_color[piece.owner as usize] ^= change;
        self.by_kind[piece.kind as usize] ^= change;
        let index = piece.index();
        for square in &mut self.piece_squares[index][..self.piece_counts[index] as usize] {
            if *square == from {
                *square = to;
                break;
            }
        }
        self.hash.move_piece(piece, from, to);
    }

    fn flip_side(&mut self) {
        self.hash.flip_side();
        self.side_to_move = self.side_to_move.other();
    }

    fn rook_home(player: Player, side: CastlingSide) -> Square {
        let file = match side {
            CastlingSide::Short => File::H,
            CastlingSide::Long => File::A,
        };
        Square::new(file, player.backrank())
    }

    /// Applies a legal move and returns the record needed to take it back.
    ///
    /// The move must be legal in the current position (e.g. produced by
    /// [`generate_moves`]); this is not re-verified here.
    pub fn do_move(&mut self, m: Move) -> MoveInfo {
        let side = self.side_to_move;
        self.flip_side();
        self.ply += 1;

        let mut captured = None;
        let prev_castling = self.castling;
        let prev_en_passant = self.en_passant;
        let mut was_en_passant = false;
        let prev_halfmove = self.halfmove_clock;

        self.hash.clear_en_passant();

        if let Some(castle) = m.castle() {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
            let rank = side.backrank();
            match castle {
                CastlingSide::Short => {
                    self.move_piece(Square::new(File::E, rank), Square::new(File::G, rank));
                    self.move_piece(Square::new(File::H, rank), Square::new(File::F, rank));
                },
                CastlingSide::Long => {
                    self.move_piece(Square::new(File::E, rank), Square::new(File::C, rank));
                    self.move_piece(Square::new(File::A, rank), Square::new(File::D, rank));
                },
            }
            self.castling -= CastleRights::both(side);
            self.hash.set_castling(self.castling);
            self.en_passant = None;
        } else {
            let moved = self.board[m.from() as usize]
                .expect("source square of a legal move is occupied");
            let captured_piece = self.board[m.to() as usize];
            captured = captured_piece.map(|piece| piece.kind);

            if moved.kind == PieceKind::Pawn || captured_piece.is_some() {
                self.halfmove_clock = 0;
            } else {
                self.halfmove_clock = self.halfmove_clock.saturating_add(1);
            }

            if moved.kind == PieceKind::Pawn && Some(m.to()) == prev_en_passant {
                self.move_piece(m.from(), m.to());
                let victim = m
                    .to()
                    .shifted(-side.push_offset())
                    .expect("en passant victim is on the board");
                self.remove_piece(victim);
                was_en_passant = true;
            } else {
                if captured_piece.is_some() {
                    self.remove_piece(m.to());
                }
                if let Some(promotion) = m.promotion() {
                    self.remove_piece(m.from());
                    self.add_piece(Piece::new(side, promotion), m.to());
                } else {
                    self.move_piece(m.from(), m.to());
                }

                if moved.kind == PieceKind::King {
                    self.castling -= CastleRights::both(side);
                }
                if moved.kind == PieceKind::Rook {
                    for castle in [CastlingSide::Short, CastlingSide::Long] {
                        if m.from() == Self::rook_home(side, castle) {
                            self.castling -= CastleRights::single(side, castle);
                        }
                    }
                }
                if captured == Some(PieceKind::Rook) {
                    for castle in [CastlingSide::Short, CastlingSide::Long] {
                        if m.to() == Self::rook_home(side.other(), castle) {
                            self.castling -= CastleRights::single(side.other(), castle);
                        }
                    }
                }
                self.hash.set_castling(self.castling);
            }

            let start_rank = match side {
                Player::White => Rank::Two,
                Player::Black => Rank::Seven,
            };
            let double_push_rank = match side {
                Player::White => Rank::Four,
                Player::Black => Rank::Five,
            };
            if moved.kind == PieceKind::Pawn
                && m.from().rank() == start_rank
                && m.to().rank() == double_push_rank
            {
                let square = m
                    .to()
                    .shifted(-side.push_offset())
                    .expect("the square behind a double push is on the board");
                self.en_passant = Some(square);
                if self.en_passant_capturable(square) {
                    self.hash.set_en_passant(square.file());
                }
            } else {
                self.en_passant = None;
            }
        }

        debug_assert!(self.history.len() < MAX_PLIES);
        self.history.push(self.hash.key());

        MoveInfo::new(
            captured,
            prev_castling,
            prev_en_passant,
            was_en_passant,
            prev_halfmove,
        )
    }

    /// Reverses [`Position::do_move`] exactly: afterwards the position,
    /// including its Zobrist key, is equal to its state before the move.
    pub fn undo_move(&mut self, m: Move, info: MoveInfo) {
        self.flip_side();
        let side = self.side_to_move;
        self.ply -= 1;

        if let Some(castle) = m.castle() {
            let rank = side.backrank();
            match castle {
                CastlingSide::Short => {
                    self.move_piece(Square::new(File::G, rank), Square::new(File::E, rank));
                    self.move_piece(Square::new(File::F, rank), Square::new(File::H, rank));
                },
                CastlingSide::Long => {
                    self.move_piece(Square::new(File::C, rank), Square::new(File::E, rank));
                    self.move_piece(Square::new(File::D, rank), Square::new(File::A, rank));
                },
            }
        } else {
            if info.was_en_passant() {
                let victim = m
                    .to()
                    .shifted(-side.push_offset())
                    .expect("en passant victim is on the board");
                self.add_piece(Piece::new(side.other(), PieceKind::Pawn), victim);
            }
            if m.promotion().is_some() {
                self.add_piece(Piece::new(side, PieceKind::Pawn), m.from());
                self.remove_piece(m.to());
            } else {
                self.move_piece(m.to(), m.from());
            }
            if let Some(kind) = info.captured() {
                self.add_piece(Piece::new(side.other(), kind), m.to());
            }
        }

        self.castling = info.castling();
        self.hash.set_castling(self.castling);

        // The board is already restored, so the capturability test below sees
        // the correct pawn placement.
        self.en_passant = info.en_passant_square();
        self.hash.clear_en_passant();
        if let Some(square) = self.en_passant {
            if self.en_passant_capturable(square) {
                self.hash.set_en_passant(square.file());
            }
        }

        self.halfmove_clock = info.halfmove_clock();
        let _ = self.history.pop();
    }

    /// Passes the turn to the opponent without moving; used by null-move
    /// pruning.
    pub fn do_null_move(&mut self) -> MoveInfo {
        self.flip_side();
        self.ply += 1;
        let prev_halfmove = self.halfmove_clock;
        self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        let prev_en_passant = self.en_passant;
        self.en_passant = None;
        self.hash.clear_en_passant();
        MoveInfo::new(None, self.castling, prev_en_passant, false, prev_halfmove)
    }

    /// Reverses [`Position::do_null_move`].
    pub fn undo_null_move(&mut self, info: MoveInfo) {
        self.flip_side();
        self.ply -= 1;
        self.halfmove_clock = info.halfmove_clock();
        self.en_passant = info.en_passant_square();
        self.hash.clear_en_passant();
        if let Some(square) = self.en_passant {
            if self.en_passant_capturable(square) {
                self.hash.set_en_passant(square.file());
            }
        }
    }

    /// True iff `square` is attacked by any piece of `attacker` with pieces
    /// standing on `occupancy`; squares in `removed` are treated as vacated
    /// (used to look "through" captured pieces).
    pub(crate) fn attacked_with(
        &self,
        square: Square,
        attacker: Player,
        occupancy: Bitboard,
        removed: Bitboard,
    ) -> bool {
        if (pawn_attacks(attacker.other(), square)
            & (self.pieces_of(attacker, PieceKind::Pawn) - removed))
            .any()
        {
            return true;
        }
        if (KNIGHT_ATTACKS[square as usize]
            & (self.pieces_of(attacker, PieceKind::Knight) - removed))
            .any()
        {
            return true;
        }
        if (KING_ATTACKS[square as usize] & self.pieces_of(attacker, PieceKind::King)).any() {
            return true;
        }
        let diagonal = (self.pieces_of(attacker, PieceKind::Bishop)
            | self.pieces_of(attacker, PieceKind::Queen))
            - removed;
        if diagonal.any() && (bishop_attacks(square, occupancy) & diagonal).any() {
            return true;
        }
        let straight = (self.pieces_of(attacker, PieceKind::Rook)
            | self.pieces_of(attacker, PieceKind::Queen))
            - removed;
        if straight.any() && (rook_attacks(square, occupancy) & straight).any() {
            return true;
        }
        false
    }

    /// True iff `square` is attacked by any piece of `attacker` on the
    /// current board.
    pub(crate) fn attacked(&self, square: Square, attacker: Player) -> bool {
        self.attacked_with(square, attacker, self.occupied(), Bitboard::empty())
    }

    /// True iff `side`'s king is attacked by any enemy piece.
    #[must_use]
    pub fn is_in_check(&self, side: Player) -> bool {
        self.attacked(self.king_square(side), side.other())
    }

    /// True iff the side to move has no legal moves and is in check.
    #[must_use]
    pub fn is_checkmate(&self) -> bool {
        let mut moves = MoveList::new();
        generate_moves(self, &mut moves);
        moves.is_empty() && self.is_in_check(self.side_to_move)
    }

    /// True iff the side to move has no legal moves and is not in check.
    #[must_use]
    pub fn is_stalemate(&self) -> bool {
        let mut moves = MoveList::new();
        generate_moves(self, &mut moves);
        moves.is_empty() && !self.is_in_check(self.side_to_move)
    }

    /// Fifty-move rule, threefold repetition or insufficient material.
    #[must_use]
    pub fn is_draw(&self) -> bool {
        self.rule50() || self.threefold_repetition() || !self.enough_material()
    }

    /// True iff 50 full moves passed without a capture or a pawn move.
    #[must_use]
    pub fn rule50(&self) -> bool {
        self.halfmove_clock >= 100
    }

    /// True iff the current position occurred at least twice before in the
    /// tracked history.
    #[must_use]
    pub fn threefold_repetition(&self) -> bool {
        let current = self.hash.key();
        let mut count = 1;
        for key in self.history.iter().rev().skip(1) {
            if *key == current {
                count += 1;
                if count == 3 {
                    return true;
                }
            }
        }
        false
    }

    /// True iff the current position occurred at least once before.
    #[must_use]
    pub fn is_repeated(&self) -> bool {
        let current = self.hash.key();
        self.history.iter().rev().skip(1).any(|key| *key == current)
    }

    /// False only for the material combinations where no side can possibly
    /// deliver a mate: bare kings, or a lone knight or bishop against a bare
    /// king.
    #[must_use]
    pub fn enough_material(&self) -> bool {
        let heavy = self.pieces_kind(PieceKind::Pawn)
            | self.pieces_kind(PieceKind::Rook)
            | self.pieces_kind(PieceKind::Queen);
        if heavy.any() {
            return true;
        }
        let minors =
            (self.pieces_kind(PieceKind::Knight) | self.pieces_kind(PieceKind::Bishop)).count();
        minors >= 2
    }

    /// True when the move does not capture anything and is not a promotion.
    #[must_use]
    pub fn move_is_quiet(&self, m: Move) -> bool {
        if m.castle().is_some() {
            return true;
        }
        if m.promotion().is_some() {
            return false;
        }
        !self.move_is_capture(m)
    }

    /// True when the move captures a piece, including en passant.
    #[must_use]
    pub fn move_is_capture(&self, m: Move) -> bool {
        if m.castle().is_some() {
            return false;
        }
        if self.board[m.to() as usize].is_some() {
            return true;
        }
        Some(m.to()) == self.en_passant
            && self.board[m.from() as usize].map(|piece| piece.kind) == Some(PieceKind::Pawn)
    }

    /// All pieces of `color` attacking the given square on the current
    /// board.
    pub(crate) fn square_attackers(&self, square: Square, color: Player) -> Bitboard {
        let mut attackers = Bitboard::empty();
        attackers |=
            pawn_attacks(color.other(), square) & self.pieces_of(color, PieceKind::Pawn);
        attackers |= KNIGHT_ATTACKS[square as usize] & self.pieces_of(color, PieceKind::Knight);
        attackers |= bishop_attacks(square, self.occupied())
            & (self.pieces_of(color, PieceKind::Bishop)
                | self.pieces_of(color, PieceKind::Queen));
        attackers |= rook_attacks(square, self.occupied())
            & (self.pieces_of(color, PieceKind::Rook) | self.pieces_of(color, PieceKind::Queen));
        attackers |= KING_ATTACKS[square as usize] & self.pieces_of(color, PieceKind::King);
        attackers
    }

    /// [Static exchange evaluation]: the material outcome of the forced
    /// capture sequence on the move's destination square, assuming both
    /// players always capture with their least valuable attacker and either
    /// player may stop the sequence. X-ray attackers are revealed as pieces
    /// in front of them are traded off.
    ///
    /// [Static exchange evaluation]: https://www.chessprogramming.org/Static_Exchange_Evaluation
    #[must_use]
    pub fn see(&self, m: Move) -> Value {
        debug_assert!(m.castle().is_none());
        let to = m.to();
        let mut side = self.side_to_move;
        let mut current_kind = self.board[m.from() as usize]
            .expect("SEE move has a piece on the source square")
            .kind;

        let mut exchanged: ArrayVec<Option<PieceKind>, 32> = ArrayVec::new();
        exchanged.push(self.board[to as usize].map(|piece| piece.kind));

        let from_bb = Bitboard::from(m.from());
        let mut occupied = self.occupied() - from_bb - Bitboard::from(to);
        let mut attackers = [
            self.square_attackers(to, Player::White),
            self.square_attackers(to, Player::Black),
        ];
        attackers[side as usize] &= !from_bb;

        'exchange: loop {
            // Capturing may have opened a line for a slider behind the
            // capturer: refresh the slider attackers against the thinned
            // occupancy.
            for color in [Player::White, Player::Black] {
                let diagonal = self.pieces_of(color, PieceKind::Bishop)
                    | self.pieces_of(color, PieceKind::Queen);
                let straight = self.pieces_of(color, PieceKind::Rook)
                    | self.pieces_of(color, PieceKind::Queen);
                attackers[color as usize] |= (bishop_attacks(to, occupied) & diagonal
                    | rook_attacks(to, occupied) & straight)
                    & occupied;
            }

            side = side.other();
            if (attackers[side as usize] & occupied).is_empty() {
                break;
            }

            for kind in PieceKind::iter() {
                let candidates =
                    attackers[side as usize] & self.pieces_of(side, kind) & occupied;
                if candidates.any() {
                    let square = candidates.lsb();
                    attackers[side as usize] &= !Bitboard::from(square);
                    occupied &= !Bitboard::from(square);
                    exchanged.push(Some(current_kind));
                    current_kind = kind;
                    continue 'exchange;
                }
            }
            break;
        }

        let value_of = |kind: Option<PieceKind>| kind.map_or(0, |kind| PIECE_VALUES[kind as usize]);
        let mut value: Value = 0;
        for kind in exchanged.iter().skip(1).rev() {
            value = Value::max(0, value_of(*kind) - value);
        }
        // The first capture is forced: the caller asks for this specific
        // move's outcome.
        value_of(exchanged[0]) - value
    }

    /// Serializes the move in [UCI format]. Castling moves are written as the
    /// king's move (e.g. "e1g1").
    ///
    /// [UCI format]: http://wbec-ridderkerk.nl/html/UCIProtocol.html
    #[must_use]
    pub fn uci(&self, m: Move) -> String {
        match m.castle() {
            Some(CastlingSide::Short) => {
                return match self.side_to_move {
                    Player::White => "e1g1".to_string(),
                    Player::Black => "e8g8".to_string(),
                }
            },
            Some(CastlingSide::Long) => {
                return match self.side_to_move {
                    Player::White => "e1c1".to_string(),
                    Player::Black => "e8c8".to_string(),
                }
            },
            None => {},
        }
        let mut result = format!("{}{}", m.from(), m.to());
        if let Some(promotion) = m.promotion() {
            result.push(match promotion {
                PieceKind::Knight => 'n',
                PieceKind::Bishop => 'b',
                PieceKind::Rook => 'r',
                PieceKind::Queen => 'q',
                _ => unreachable!("promotions are minor or major pieces"),
            });
        }
        result
    }

    /// Parses a move in UCI format and returns it if it is legal in this
    /// position; castling is recognized from the king's two-square move.
    /// Returns `None` for unparseable or illegal moves.
    #[must_use]
    pub fn parse_uci(&self, input: &str) -> Option<Move> {
        if !(4..=5).contains(&input.len()) || !input.is_ascii() {
            return None;
        }
        let input = input.to_ascii_lowercase();
        let mut moves = MoveList::new();
        generate_moves(self, &mut moves);
        moves.into_iter().find(|m| self.uci(*m) == input)
    }

    /// Runs [perft] (performance test): counts leaf nodes of legal move
    /// sequences of the given depth. The authoritative correctness oracle
    /// for move generation and do/undo.
    ///
    /// [perft]: https://www.chessprogramming.org/Perft
    #[must_use]
    pub fn perft(&mut self, depth: u8) -> u64 {
        if depth == 0 {
            return 1;
        }
        let mut moves = MoveList::new();
        generate_moves(self, &mut moves);
        if depth == 1 {
            return moves.len() as u64;
        }
        let mut nodes = 0;
        for m in moves {
            let info = self.do_move(m);
            nodes += self.perft(depth - 1);
            self.undo_move(m, info);
        }
        nodes
    }

    /// Prints the position in Forsyth-Edwards Notation.
    #[must_use]
    pub fn fen(&self) -> String {
        let mut placement = String::new();
        for rank_id in (0..BOARD_WIDTH).rev() {
            let rank = Rank::try_from(rank_id).expect("rank id is within the board");
            let mut empty_run = 0;
            for file in File::iter() {
                match self.board[Square::new(file, rank) as usize] {
                    None => empty_run += 1,
                    Some(piece) => {
                        if empty_run > 0 {
                            placement.push(char::from(b'0' + empty_run));
                            empty_run = 0;
                        }
                        placement.push(piece.algebraic_symbol());
                    },
                }
            }
            if empty_run > 0 {
                placement.push(char::from(b'0' + empty_run));
            }
            if rank_id > 0 {
                placement.push('/');
            }
        }
        let en_passant = match self.en_passant {
            Some(square) => square.to_string(),
            None => "-".to_string(),
        };
        format!(
            "{placement} {} {} {en_passant} {} {}",
            self.side_to_move,
            self.castling,
            self.halfmove_clock,
            (self.ply - 1) / 2 + 1
        )
    }
}

impl TryFrom<&str> for Position {
    type Error = anyhow::Error;

    /// Cleans up the input and parses it as either FEN or EPD body (FEN
    /// without the halfmove clock and fullmove counter).
    fn try_from(input: &str) -> anyhow::Result<Self> {
        let mut input = input;
        for prefix in ["fen ", "epd "] {
            if let Some(stripped) = input.strip_prefix(prefix) {
                input = stripped;
                break;
            }
        }
        let input = input.trim();
        match input.split_ascii_whitespace().count() {
            6 => Self::from_fen(input),
            4 => Self::from_fen(&(input.to_string() + " 0 1")),
            parts => bail!(
                "incorrect board representation: expected either FEN (6 parts) or EPD body \
                 (4 parts), got: {parts}"
            ),
        }
    }
}

impl PartialEq for Position {
    /// Positions are equal when they agree on the board, the side to move,
    /// castling rights and the en passant square. Counters and history are
    /// deliberately not part of the comparison.
    fn eq(&self, other: &Self) -> bool {
        // The key comparison rejects almost all unequal positions cheaply.
        if self.hash.key() != other.hash.key() {
            return false;
        }
        self.side_to_move == other.side_to_move
            && self.castling == other.castling
            && self.en_passant == other.en_passant
            && self.board == other.board
    }
}

impl Eq for Position {}

impl fmt::Display for Position {
    /// Prints board in Forsyth-Edwards Notation.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.fen())
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for rank_id in (0..BOARD_WIDTH).rev() {
            let rank = Rank::try_from(rank_id).expect("rank id is within the board");
            write!(f, "{}  ", rank_id + 1)?;
            for file in File::iter() {
                match self.board[Square::new(file, rank) as usize] {
                    Some(piece) => write!(f, "{} ", piece.algebraic_symbol())?,
                    None => write!(f, ". ")?,
                }
            }
            writeln!(f)?;
        }
        writeln!(f)?;
        writeln!(f, "   a b c d e f g h")?;
        writeln!(f)?;
        writeln!(f, "Fen: \"{}\"", self.fen())?;
        writeln!(f, "Hash: {:016x}", self.hash.key())?;
        match self.side_to_move {
            Player::White => writeln!(f, "White to move"),
            Player::Black => writeln!(f, "Black to move"),
        }
    }
}
