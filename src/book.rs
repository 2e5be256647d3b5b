//! [Polyglot] opening book support: an in-memory map from position key to
//! weighted candidate moves, read from the standard 16-byte binary record
//! format.
//!
//! The book is probed with this engine's own Zobrist key: the key
//! composition (including the rule that the en passant file only counts when
//! a capture is actually possible) matches the book format's requirements
//! bit for bit.
//!
//! [Polyglot]: https://www.chessprogramming.org/PolyGlot

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::chess::core::{CastlingSide, File, Move, Piece, PieceKind, Player, Rank, Square};
use crate::chess::position::Position;
use crate::chess::zobrist::Key;

const RECORD_SIZE: usize = 16;

/// An opening book: every known position maps to a list of moves with
/// weights proportional to how good the book considers them.
pub struct PolyglotBook {
    entries: HashMap<Key, Vec<(u16, u16)>>,
    rng: StdRng,
}

impl PolyglotBook {
    /// Reads a book from disk, seeding the sampling generator from the wall
    /// clock.
    ///
    /// # Errors
    ///
    /// Returns an error when the file can not be read or is not a sequence
    /// of 16-byte records.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let bytes = fs::read(path.as_ref()).with_context(|| {
            format!("can not read opening book at {}", path.as_ref().display())
        })?;
        Self::from_bytes(&bytes, default_seed())
    }

    /// Parses a book from raw bytes with an explicit seed for the sampling
    /// generator. Deterministic tests should use this constructor.
    ///
    /// # Errors
    ///
    /// Returns an error when the input is not a sequence of 16-byte
    /// records.
    pub fn from_bytes(bytes: &[u8], seed: u64) -> anyhow::Result<Self> {
        if bytes.len() % RECORD_SIZE != 0 {
            bail!(
                "corrupt Polyglot book: {} bytes is not a multiple of {RECORD_SIZE}",
                bytes.len()
            );
        }
        let mut entries: HashMap<Key, Vec<(u16, u16)>> = HashMap::new();
        for record in bytes.chunks_exact(RECORD_SIZE) {
            // Big-endian: 8-byte key, 2-byte move, 2-byte weight and 4
            // "learn" bytes which are ignored.
            let key = u64::from_be_bytes(record[0..8].try_into().expect("record has 8 key bytes"));
            let raw_move =
                u16::from_be_bytes(record[8..10].try_into().expect("record has 2 move bytes"));
            let weight =
                u16::from_be_bytes(record[10..12].try_into().expect("record has 2 weight bytes"));
            entries.entry(key).or_default().push((raw_move, weight));
        }
        Ok(Self {
            entries,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// True if the book knows the position with the given key.
    #[must_use]
    pub fn contains(&self, key: Key) -> bool {
        self.entries.contains_key(&key)
    }

    /// Number of known positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the book knows no positions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The move with the largest weight for the given key.
    #[must_use]
    pub fn best_move(&self, key: Key, position: &Position) -> Option<Move> {
        let moves = self.entries.get(&key)?;
        let (raw, _) = moves.iter().max_by_key(|(_, weight)| *weight)?;
        Some(decode_move(*raw, position))
    }

    /// A random move for the given key, sampled proportionally to the
    /// weights.
    #[must_use]
    pub fn random_move(&mut self, key: Key, position: &Position) -> Option<Move> {
        let moves = self.entries.get(&key)?;
        let total: u64 = moves.iter().map(|(_, weight)| u64::from(*weight)).sum();
        if total == 0 {
            return moves.first().map(|(raw, _)| decode_move(*raw, position));
        }
        let sample = self.rng.gen_range(0..total);
        let mut cumulative = 0u64;
        for (raw, weight) in moves {
            cumulative += u64::from(*weight);
            if sample < cumulative {
                return Some(decode_move(*raw, position));
            }
        }
        unreachable!("the sample is below the total weight")
    }
}

fn default_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos() as u64)
}

// The Polyglot move word packs five 3-bit fields; castling is encoded as
// the king capturing its own rook (some books use the king's two-square
// move instead) and is rewritten into this engine's castling move.
fn decode_move(raw: u16, position: &Position) -> Move {
    let square_of = |file_bits: u16, rank_bits: u16| {
        let file = File::try_from(file_bits as u8).expect("3-bit value is a valid file");
        let rank = Rank::try_from(rank_bits as u8).expect("3-bit value is a valid rank");
        Square::new(file, rank)
    };
    let to = square_of(raw & 0x7, raw >> 3 & 0x7);
    let from = square_of(raw >> 6 & 0x7, raw >> 9 & 0x7);
    let promotion_code = raw >> 12 & 0x7;

    for (player, home, short_targets, long_targets) in [
        (
            Player::White,
            Square::E1,
            [Square::H1, Square::G1],
            [Square::A1, Square::C1],
        ),
        (
            Player::Black,
            Square::E8,
            [Square::H8, Square::G8],
            [Square::A8, Square::C8],
        ),
    ] {
        if from == home && position.at(from) == Some(Piece::new(player, PieceKind::King)) {
            if short_targets.contains(&to) {
                return Move::castling(CastlingSide::Short);
            }
            if long_targets.contains(&to) {
                return Move::castling(CastlingSide::Long);
            }
        }
    }

    match promotion_code {
        0 => Move::new(from, to),
        code => Move::promoting(from, to, PieceKind::from_index(code as u8)),
    }
}
