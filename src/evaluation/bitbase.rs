//! [KPK bitbase]: the exact game-theoretic result of every king-and-pawn
//! versus king position, computed once by retrograde analysis and packed
//! into one bit per position.
//!
//! Positions are canonicalized before probing: the pawn side is White and
//! the pawn stands on files a-d (the caller mirrors the board as needed), so
//! only 2 * 24 * 64 * 64 configurations have to be classified.
//!
//! [KPK bitbase]: https://www.chessprogramming.org/KPK

use std::sync::OnceLock;

use crate::chess::attacks::{pawn_attacks, KING_ATTACKS};
use crate::chess::core::{File, Player, Rank, Square};

const MAX_INDEX: usize = 2 * 24 * 64 * 64;

const INVALID: u8 = 0;
const UNKNOWN: u8 = 1;
const DRAW: u8 = 2;
const WIN: u8 = 4;

// A position index packs:
//
// - bits  0..6:  white king square,
// - bits  6..12: black king square,
// - bit   12:    side to move,
// - bits 13..15: pawn file (a..d),
// - bits 15..18: rank 7 - pawn rank (pawn is never on ranks 1 and 8).
fn index(us: Player, black_king: Square, white_king: Square, pawn: Square) -> usize {
    white_king as usize
        | (black_king as usize) << 6
        | (us as usize) << 12
        | (pawn.file() as usize) << 13
        | (Rank::Seven as usize - pawn.rank() as usize) << 15
}

fn square(bits: usize) -> Square {
    Square::try_from((bits & 0x3F) as u8).expect("6-bit value is a valid square")
}

fn decode(idx: usize) -> (Player, Square, Square, Square) {
    let white_king = square(idx);
    let black_king = square(idx >> 6);
    let us = if idx >> 12 & 1 == 0 {
        Player::White
    } else {
        Player::Black
    };
    let file = File::try_from((idx >> 13 & 0x3) as u8).expect("2-bit value is a valid file");
    let rank = Rank::try_from((Rank::Seven as usize - (idx >> 15)) as u8)
        .expect("pawn rank offset is within 2..=7");
    (us, white_king, black_king, Square::new(file, rank))
}

// Classification of positions that are terminal for the retrograde pass:
// illegal configurations, immediate promotion wins and immediate draws
// (stalemate or a free capture of the pawn). Everything else starts UNKNOWN.
fn initial_result(us: Player, white_king: Square, black_king: Square, pawn: Square) -> u8 {
    if white_king.distance(black_king) <= 1
        || white_king == pawn
        || black_king == pawn
        || (us == Player::White && pawn_attacks(Player::White, pawn).is_set(black_king))
    {
        return INVALID;
    }

    if us == Player::White && pawn.rank() == Rank::Seven {
        let promotion = pawn
            .shifted(8)
            .expect("the square in front of a 7th-rank pawn is on the board");
        // The pawn promotes and the promoted queen cannot be caught.
        if white_king != promotion
            && (black_king.distance(promotion) > 1 || KING_ATTACKS[white_king as usize].is_set(promotion))
        {
            return WIN;
        }
    }

    if us == Player::Black {
        let escapes = KING_ATTACKS[black_king as usize]
            & !(KING_ATTACKS[white_king as usize] | pawn_attacks(Player::White, pawn));
        // Stalemate, or the black king grabs an undefended pawn.
        if escapes.is_empty() {
            return DRAW;
        }
        if KING_ATTACKS[black_king as usize].is_set(pawn)
            && !KING_ATTACKS[white_king as usize].is_set(pawn)
        {
            return DRAW;
        }
    }

    UNKNOWN
}

// White to move: the position is WIN if any move reaches a WIN, DRAW if all
// moves reach DRAWs. Black to move: symmetric with DRAW as the good outcome.
// Moves into INVALID configurations contribute nothing (INVALID is 0).
fn classify(results: &[u8], idx: usize) -> u8 {
    let (us, white_king, black_king, pawn) = decode(idx);
    let them = us.other();
    let (good, bad) = match us {
        Player::White => (WIN, DRAW),
        Player::Black => (DRAW, WIN),
    };

    let mover = match us {
        Player::White => white_king,
        Player::Black => black_king,
    };
    let mut reachable = INVALID;
    for to in KING_ATTACKS[mover as usize].iter() {
        reachable |= match us {
            Player::White => results[index(them, black_king, to, pawn)],
            Player::Black => results[index(them, to, white_king, pawn)],
        };
    }

    if us == Player::White {
        if pawn.rank() < Rank::Seven {
            let push = pawn.shifted(8).expect("single push stays on the board");
            reachable |= results[index(them, black_king, white_king, push)];
            if pawn.rank() == Rank::Two && push != white_king && push != black_king {
                let double = push.shifted(8).expect("double push stays on the board");
                reachable |= results[index(them, black_king, white_king, double)];
            }
        }
    }

    if reachable & good != 0 {
        good
    } else if reachable & UNKNOWN != 0 {
        UNKNOWN
    } else {
        bad
    }
}

fn compute() -> Vec<u32> {
    let mut results = vec![UNKNOWN; MAX_INDEX];
    for (idx, result) in results.iter_mut().enumerate() {
        let (us, white_king, black_king, pawn) = decode(idx);
        *result = initial_result(us, white_king, black_king, pawn);
    }

    // Iterate until no unknown position can be classified anymore (takes
    // around 15 cycles).
    let mut repeat = true;
    while repeat {
        repeat = false;
        for idx in 0..MAX_INDEX {
            if results[idx] == UNKNOWN {
                let result = classify(&results, idx);
                if result != UNKNOWN {
                    results[idx] = result;
                    repeat = true;
                }
            }
        }
    }

    let mut packed = vec![0u32; MAX_INDEX / 32];
    for (idx, result) in results.iter().enumerate() {
        if *result == WIN {
            packed[idx / 32] |= 1 << (idx % 32);
        }
    }
    packed
}

static KPK_BITBASE: OnceLock<Vec<u32>> = OnceLock::new();

/// Probes the bitbase: true iff the canonicalized position (White owns the
/// pawn, the pawn is on files a-d) is a win for White. `us` is the side to
/// move.
pub(crate) fn probe(white_king: Square, pawn: Square, black_king: Square, us: Player) -> bool {
    debug_assert!(pawn.file() <= File::D);
    debug_assert!(pawn.rank() >= Rank::Two && pawn.rank() <= Rank::Seven);
    let bitbase = KPK_BITBASE.get_or_init(compute);
    let idx = index(us, black_king, white_king, pawn);
    bitbase[idx / 32] & (1 << (idx % 32)) != 0
}
