//! Board primitives commonly used within [`crate::chess`].

use std::{fmt, mem};

use anyhow::bail;

#[allow(missing_docs)]
pub const BOARD_WIDTH: u8 = 8;
#[allow(missing_docs)]
pub const BOARD_SIZE: u8 = BOARD_WIDTH * BOARD_WIDTH;

/// Represents a column (vertical row) of the chessboard. In chess notation, it
/// is normally represented with a lowercase letter.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, strum::EnumIter)]
#[allow(missing_docs)]
pub enum File {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", (b'a' + *self as u8) as char)
    }
}

impl TryFrom<char> for File {
    type Error = anyhow::Error;

    fn try_from(file: char) -> anyhow::Result<Self> {
        match file {
            'a'..='h' => Ok(unsafe { mem::transmute::<u8, Self>(file as u8 - b'a') }),
            _ => bail!("unknown file: expected within 'a'..='h', got '{file}'"),
        }
    }
}

impl TryFrom<u8> for File {
    type Error = anyhow::Error;

    fn try_from(column: u8) -> anyhow::Result<Self> {
        match column {
            0..=7 => Ok(unsafe { mem::transmute::<u8, Self>(column) }),
            _ => bail!("unknown file: expected within 0..BOARD_WIDTH, got {column}"),
        }
    }
}

/// Represents a horizontal row of the chessboard. In chess notation, it is
/// represented with a number. The implementation assumes zero-based values
/// (i.e. rank 1 would be 0).
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, strum::EnumIter)]
#[allow(missing_docs)]
pub enum Rank {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<char> for Rank {
    type Error = anyhow::Error;

    fn try_from(rank: char) -> anyhow::Result<Self> {
        match rank {
            '1'..='8' => Ok(unsafe { mem::transmute::<u8, Self>(rank as u8 - b'1') }),
            _ => bail!("unknown rank: expected within '1'..='8', got '{rank}'"),
        }
    }
}

impl TryFrom<u8> for Rank {
    type Error = anyhow::Error;

    fn try_from(row: u8) -> anyhow::Result<Self> {
        match row {
            0..=7 => Ok(unsafe { mem::transmute::<u8, Self>(row) }),
            _ => bail!("unknown rank: expected within 0..BOARD_WIDTH, got {row}"),
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", *self as u8 + 1)
    }
}

/// Board squares: from left to right, from bottom to the top:
///
/// ```
/// use rukh::chess::core::Square;
///
/// assert_eq!(Square::A1 as u8, 0);
/// assert_eq!(Square::E1 as u8, 4);
/// assert_eq!(Square::H1 as u8, 7);
/// assert_eq!(Square::A4 as u8, 8 * 3);
/// assert_eq!(Square::H8 as u8, 63);
/// ```
///
/// Square is a compact representation using only one byte.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, strum::EnumIter)]
#[rustfmt::skip]
#[allow(missing_docs)]
pub enum Square {
    A1, B1, C1, D1, E1, F1, G1, H1,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A8, B8, C8, D8, E8, F8, G8, H8,
}

impl Square {
    /// Connects file (column) and rank (row) to form a full square.
    #[must_use]
    pub fn new(file: File, rank: Rank) -> Self {
        unsafe { mem::transmute(file as u8 + (rank as u8) * BOARD_WIDTH) }
    }

    /// Returns file (column) on which the square is located.
    #[must_use]
    pub fn file(self) -> File {
        unsafe { mem::transmute(self as u8 % BOARD_WIDTH) }
    }

    /// Returns rank (row) on which the square is located.
    #[must_use]
    pub fn rank(self) -> Rank {
        unsafe { mem::transmute(self as u8 / BOARD_WIDTH) }
    }

    /// [Chebyshev distance] between two squares.
    ///
    /// [Chebyshev distance]: https://en.wikipedia.org/wiki/Chebyshev_distance
    #[must_use]
    pub(crate) fn distance(self, other: Self) -> u8 {
        let files = (self.file() as i8 - other.file() as i8).unsigned_abs();
        let ranks = (self.rank() as i8 - other.rank() as i8).unsigned_abs();
        files.max(ranks)
    }

    /// Moves the square by the given index offset, e.g. +8 is one rank up.
    /// Returns `None` when the result leaves the board vertically. The caller
    /// is responsible for horizontal wrapping (the offsets used internally
    /// are vertical).
    #[must_use]
    pub(crate) fn shifted(self, offset: i8) -> Option<Self> {
        let candidate = self as i8 + offset;
        if (0..BOARD_SIZE as i8).contains(&candidate) {
            Some(unsafe { mem::transmute(candidate as u8) })
        } else {
            None
        }
    }

    /// Mirrors the square vertically (rank 1 <-> rank 8).
    #[must_use]
    pub(crate) fn flipped_vertically(self) -> Self {
        unsafe { mem::transmute(self as u8 ^ 56) }
    }

    /// Mirrors the square horizontally (file a <-> file h).
    #[must_use]
    pub(crate) fn flipped_horizontally(self) -> Self {
        unsafe { mem::transmute(self as u8 ^ 7) }
    }
}

impl TryFrom<u8> for Square {
    type Error = anyhow::Error;

    /// Creates a square given its position on the board.
    ///
    /// # Errors
    ///
    /// If given square index is outside 0..[`BOARD_SIZE`] range.
    fn try_from(square_index: u8) -> anyhow::Result<Self> {
        const MAX_INDEX: u8 = BOARD_SIZE - 1;
        match square_index {
            0..=MAX_INDEX => Ok(unsafe { mem::transmute::<u8, Self>(square_index) }),
            _ => bail!("unknown square index: needs to be in 0..BOARD_SIZE, got {square_index}"),
        }
    }
}

impl TryFrom<&str> for Square {
    type Error = anyhow::Error;

    fn try_from(square: &str) -> anyhow::Result<Self> {
        let mut chars = square.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(file), Some(rank), None) => Ok(Self::new(file.try_into()?, rank.try_into()?)),
            _ => bail!("unknown square: should be two-char, got '{square}'"),
        }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.file(), self.rank())
    }
}

/// A standard game of chess is played between two players: White (having the
/// advantage of the first turn) and Black.
#[repr(u8)]
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Player {
    White,
    Black,
}

impl Player {
    /// The opponent of this player.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// The rank this player's pieces start on.
    #[must_use]
    pub(crate) const fn backrank(self) -> Rank {
        match self {
            Self::White => Rank::One,
            Self::Black => Rank::Eight,
        }
    }

    /// The index offset of a single pawn push.
    #[must_use]
    pub(crate) const fn push_offset(self) -> i8 {
        match self {
            Self::White => BOARD_WIDTH as i8,
            Self::Black => -(BOARD_WIDTH as i8),
        }
    }
}

impl TryFrom<&str> for Player {
    type Error = anyhow::Error;

    fn try_from(player: &str) -> anyhow::Result<Self> {
        match player {
            "w" => Ok(Self::White),
            "b" => Ok(Self::Black),
            _ => bail!("unknown player: expected 'w' or 'b', got '{player}'"),
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match &self {
                Self::White => 'w',
                Self::Black => 'b',
            }
        )
    }
}

/// Standard [chess pieces].
///
/// [chess pieces]: https://en.wikipedia.org/wiki/Chess_piece
#[repr(u8)]
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, strum::EnumIter)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub(crate) fn from_index(index: u8) -> Self {
        debug_assert!(index < 6);
        unsafe { mem::transmute(index) }
    }
}

/// Represents a specific piece owned by a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Piece {
    #[allow(missing_docs)]
    pub owner: Player,
    #[allow(missing_docs)]
    pub kind: PieceKind,
}

impl Piece {
    #[must_use]
    pub(crate) const fn new(owner: Player, kind: PieceKind) -> Self {
        Self { owner, kind }
    }

    /// Index in 0..12 used for piece-keyed tables (piece lists, Zobrist).
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        self.owner as usize * 6 + self.kind as usize
    }

    /// Algebraic notation symbol used in FEN. Uppercase for white, lowercase
    /// for black.
    pub(crate) fn algebraic_symbol(self) -> char {
        let result = match self.kind {
            PieceKind::King => 'k',
            PieceKind::Queen => 'q',
            PieceKind::Rook => 'r',
            PieceKind::Bishop => 'b',
            PieceKind::Knight => 'n',
            PieceKind::Pawn => 'p',
        };
        match self.owner {
            Player::White => result.to_ascii_uppercase(),
            Player::Black => result,
        }
    }
}

impl TryFrom<char> for Piece {
    type Error = anyhow::Error;

    fn try_from(symbol: char) -> anyhow::Result<Self> {
        let owner = if symbol.is_ascii_uppercase() {
            Player::White
        } else {
            Player::Black
        };
        let kind = match symbol.to_ascii_lowercase() {
            'k' => PieceKind::King,
            'q' => PieceKind::Queen,
            'r' => PieceKind::Rook,
            'b' => PieceKind::Bishop,
            'n' => PieceKind::Knight,
            'p' => PieceKind::Pawn,
            _ => bail!("unknown piece symbol: expected within \"KQRBNPkqrbnp\", got '{symbol}'"),
        };
        Ok(Self { owner, kind })
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.algebraic_symbol())
    }
}

/// The king can castle to one of the rooks: either a kingside rook ("short
/// castle" or O-O) or queenside rook ("long castle" or O-O-O).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum CastlingSide {
    Short,
    Long,
}

bitflags::bitflags! {
    /// Tracks the ability to [castle] for each side. When the king moves, the
    /// player loses the ability to castle to both sides; when a rook moves or
    /// is captured on its home square, the corresponding side is lost.
    ///
    /// [castle]: https://www.chessprogramming.org/Castling
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CastleRights: u8 {
        #[allow(missing_docs)]
        const WHITE_SHORT = 0b0001;
        #[allow(missing_docs)]
        const WHITE_LONG = 0b0010;
        #[allow(missing_docs)]
        const BLACK_SHORT = 0b0100;
        #[allow(missing_docs)]
        const BLACK_LONG = 0b1000;
    }
}

impl CastleRights {
    /// Both castling rights of one player.
    #[must_use]
    pub fn both(player: Player) -> Self {
        match player {
            Player::White => Self::WHITE_SHORT | Self::WHITE_LONG,
            Player::Black => Self::BLACK_SHORT | Self::BLACK_LONG,
        }
    }

    /// A single castling right of one player.
    #[must_use]
    pub fn single(player: Player, side: CastlingSide) -> Self {
        match (player, side) {
            (Player::White, CastlingSide::Short) => Self::WHITE_SHORT,
            (Player::White, CastlingSide::Long) => Self::WHITE_LONG,
            (Player::Black, CastlingSide::Short) => Self::BLACK_SHORT,
            (Player::Black, CastlingSide::Long) => Self::BLACK_LONG,
        }
    }
}

impl TryFrom<&str> for CastleRights {
    type Error = anyhow::Error;

    /// Parses [`CastleRights`] from the FEN format ("-" or a subset of
    /// "KQkq" in that order).
    fn try_from(fen: &str) -> anyhow::Result<Self> {
        if fen == "-" {
            return Ok(Self::empty());
        }
        if fen.is_empty() || fen.len() > 4 {
            bail!("unknown castling rights: expected '-' or <=4 symbols, got '{fen}'");
        }
        let mut rights = Self::empty();
        for symbol in fen.chars() {
            rights |= match symbol {
                'K' => Self::WHITE_SHORT,
                'Q' => Self::WHITE_LONG,
                'k' => Self::BLACK_SHORT,
                'q' => Self::BLACK_LONG,
                _ => bail!("unknown castling rights symbol: '{symbol}'"),
            };
        }
        Ok(rights)
    }
}

impl fmt::Display for CastleRights {
    /// Prints castling rights of both sides in FEN format.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        for (flag, symbol) in [
            (Self::WHITE_SHORT, 'K'),
            (Self::WHITE_LONG, 'Q'),
            (Self::BLACK_SHORT, 'k'),
            (Self::BLACK_LONG, 'q'),
        ] {
            if self.contains(flag) {
                write!(f, "{symbol}")?;
            }
        }
        Ok(())
    }
}

/// A chess move packed into a single integer, cheap to copy and store in move
/// lists. Layout:
///
/// - bits 0..6: source square,
/// - bits 6..12: destination square,
/// - bits 12..15: promotion piece kind + 1 (0 when not a promotion),
/// - bits 15..17: castling kind (0 = none, 1 = short, 2 = long).
///
/// Castling moves do not encode squares: the side to move determines them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Move(u32);

impl Move {
    /// A plain move of a piece between two squares.
    #[must_use]
    pub fn new(from: Square, to: Square) -> Self {
        Self((to as u32) << 6 | from as u32)
    }

    /// A pawn move to the last rank. `promotion` must not be a pawn or king.
    #[must_use]
    pub fn promoting(from: Square, to: Square, promotion: PieceKind) -> Self {
        debug_assert!(promotion != PieceKind::Pawn && promotion != PieceKind::King);
        Self((promotion as u32 + 1) << 12 | (to as u32) << 6 | from as u32)
    }

    /// A castling move of the side to move.
    #[must_use]
    pub fn castling(side: CastlingSide) -> Self {
        Self(match side {
            CastlingSide::Short => 1 << 15,
            CastlingSide::Long => 2 << 15,
        })
    }

    /// Source square. Meaningless for castling moves.
    #[must_use]
    pub fn from(self) -> Square {
        unsafe { mem::transmute((self.0 & 0x3F) as u8) }
    }

    /// Destination square. Meaningless for castling moves.
    #[must_use]
    pub fn to(self) -> Square {
        unsafe { mem::transmute((self.0 >> 6 & 0x3F) as u8) }
    }

    /// The piece a pawn promotes into, if this is a promotion.
    #[must_use]
    pub fn promotion(self) -> Option<PieceKind> {
        match self.0 >> 12 & 0x7 {
            0 => None,
            kind => Some(PieceKind::from_index(kind as u8 - 1)),
        }
    }

    /// The castling kind, if this is a castling move.
    #[must_use]
    pub fn castle(self) -> Option<CastlingSide> {
        match self.0 >> 15 & 0x3 {
            0 => None,
            1 => Some(CastlingSide::Short),
            _ => Some(CastlingSide::Long),
        }
    }
}

/// Undo record produced by `Position::do_move`, consumed by
/// `Position::undo_move`. Self-contained: unwinding a move never has to
/// recompute castling rights or en passant state from the board. Layout:
///
/// - bits 0..3: captured piece kind + 1 (0 when nothing was captured),
/// - bits 3..7: castling rights before the move,
/// - bits 7..13: en passant square before the move,
/// - bit 13: en passant square presence,
/// - bit 14: the move itself was an en passant capture,
/// - bits 15..23: half-move clock before the move.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MoveInfo(u32);

impl MoveInfo {
    #[must_use]
    pub(crate) fn new(
        captured: Option<PieceKind>,
        castling: CastleRights,
        en_passant_square: Option<Square>,
        was_en_passant: bool,
        halfmove_clock: u8,
    ) -> Self {
        let mut packed = captured.map_or(0, |kind| kind as u32 + 1);
        packed |= u32::from(castling.bits()) << 3;
        if let Some(square) = en_passant_square {
            packed |= (square as u32) << 7 | 1 << 13;
        }
        packed |= u32::from(was_en_passant) << 14;
        packed |= u32::from(halfmove_clock) << 15;
        Self(packed)
    }

    /// The kind of the captured piece, if the move was a capture.
    #[must_use]
    pub fn captured(self) -> Option<PieceKind> {
        match self.0 & 0x7 {
            0 => None,
            kind => Some(PieceKind::from_index(kind as u8 - 1)),
        }
    }

    pub(crate) fn castling(self) -> CastleRights {
        CastleRights::from_bits_truncate((self.0 >> 3 & 0xF) as u8)
    }

    pub(crate) fn en_passant_square(self) -> Option<Square> {
        if self.0 & 1 << 13 == 0 {
            None
        } else {
            Some(unsafe { mem::transmute((self.0 >> 7 & 0x3F) as u8) })
        }
    }

    /// True when the move itself captured a pawn en passant.
    #[must_use]
    pub fn was_en_passant(self) -> bool {
        self.0 & 1 << 14 != 0
    }

    pub(crate) fn halfmove_clock(self) -> u8 {
        (self.0 >> 15 & 0xFF) as u8
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{
        CastleRights, CastlingSide, File, Move, MoveInfo, Piece, PieceKind, Player, Rank, Square,
    };

    #[test]
    fn square_arithmetic() {
        assert_eq!(Square::new(File::E, Rank::Four), Square::E4);
        assert_eq!(Square::E4.file(), File::E);
        assert_eq!(Square::E4.rank(), Rank::Four);
        assert_eq!(Square::try_from("h8").unwrap(), Square::H8);
        assert_eq!(Square::A1.to_string(), "a1");
        assert!(Square::try_from("i9").is_err());
        assert!(Square::try_from("e44").is_err());
        assert_eq!(Square::E2.shifted(8), Some(Square::E3));
        assert_eq!(Square::E7.shifted(-8), Some(Square::E6));
        assert_eq!(Square::A1.shifted(-8), None);
        assert_eq!(Square::C1.flipped_vertically(), Square::C8);
        assert_eq!(Square::C1.flipped_horizontally(), Square::F1);
        assert_eq!(Square::A1.distance(Square::H8), 7);
        assert_eq!(Square::E4.distance(Square::F6), 2);
    }

    #[test]
    fn castle_rights_fen() {
        assert_eq!(CastleRights::try_from("-").unwrap(), CastleRights::empty());
        assert_eq!(CastleRights::try_from("KQkq").unwrap(), CastleRights::all());
        assert_eq!(
            CastleRights::try_from("Kq").unwrap(),
            CastleRights::WHITE_SHORT | CastleRights::BLACK_LONG
        );
        assert_eq!(CastleRights::all().to_string(), "KQkq");
        assert_eq!(CastleRights::empty().to_string(), "-");
        assert!(CastleRights::try_from("KQkqK").is_err());
        assert!(CastleRights::try_from("x").is_err());
    }

    #[test]
    fn move_packing() {
        let m = Move::new(Square::E2, Square::E4);
        assert_eq!(m.from(), Square::E2);
        assert_eq!(m.to(), Square::E4);
        assert_eq!(m.promotion(), None);
        assert_eq!(m.castle(), None);

        let promotion = Move::promoting(Square::B7, Square::C8, PieceKind::Queen);
        assert_eq!(promotion.from(), Square::B7);
        assert_eq!(promotion.to(), Square::C8);
        assert_eq!(promotion.promotion(), Some(PieceKind::Queen));

        let short = Move::castling(CastlingSide::Short);
        assert_eq!(short.castle(), Some(CastlingSide::Short));
        let long = Move::castling(CastlingSide::Long);
        assert_eq!(long.castle(), Some(CastlingSide::Long));
        assert_ne!(short, long);
    }

    #[test]
    fn move_info_packing() {
        let info = MoveInfo::new(
            Some(PieceKind::Rook),
            CastleRights::all(),
            Some(Square::D6),
            false,
            42,
        );
        assert_eq!(info.captured(), Some(PieceKind::Rook));
        assert_eq!(info.castling(), CastleRights::all());
        assert_eq!(info.en_passant_square(), Some(Square::D6));
        assert!(!info.was_en_passant());
        assert_eq!(info.halfmove_clock(), 42);

        let info = MoveInfo::new(None, CastleRights::empty(), None, true, 0);
        assert_eq!(info.captured(), None);
        assert_eq!(info.en_passant_square(), None);
        assert!(info.was_en_passant());
        assert_eq!(info.halfmove_clock(), 0);
    }

    #[test]
    fn piece_symbols() {
        assert_eq!(
            Piece::try_from('N').unwrap(),
            Piece::new(Player::White, PieceKind::Knight)
        );
        assert_eq!(
            Piece::try_from('q').unwrap(),
            Piece::new(Player::Black, PieceKind::Queen)
        );
        assert_eq!(Piece::new(Player::White, PieceKind::Pawn).to_string(), "P");
        assert_eq!(Piece::new(Player::Black, PieceKind::King).to_string(), "k");
        assert!(Piece::try_from('x').is_err());
    }

    #[test]
    fn piece_indices() {
        assert_eq!(Piece::new(Player::White, PieceKind::Pawn).index(), 0);
        assert_eq!(Piece::new(Player::White, PieceKind::King).index(), 5);
        assert_eq!(Piece::new(Player::Black, PieceKind::Pawn).index(), 6);
        assert_eq!(Piece::new(Player::Black, PieceKind::King).index(), 11);
    }
}
