//! Iterative-deepening [principal variation search]: negamax alpha-beta
//! where the first move of every node is searched with the full window and
//! the rest with a zero window, falling back to a re-search when the zero
//! window fails high. Nominal depth exhausts into a capture-only
//! [quiescence search] with a stand-pat cutoff, and a [null move] prunes
//! subtrees where doing nothing already refutes the opponent.
//!
//! [principal variation search]: https://www.chessprogramming.org/Principal_Variation_Search
//! [quiescence search]: https://www.chessprogramming.org/Quiescence_Search
//! [null move]: https://www.chessprogramming.org/Null_Move_Pruning

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::chess::movegen::{generate_moves, generate_quiescence, MoveList};
use crate::chess::position::Position;
use crate::evaluation::endgame::Catalogue;
use crate::evaluation::{Scorer, Value, DRAW, INFINITE};
use crate::search::limits::Limits;
use crate::search::picker::MovePicker;
use crate::search::state::SearchState;
use crate::search::{Depth, MAX_DEPTH};

/// Being mated in `ply` half-moves from the root: the further away, the less
/// bad. Mate scores ramp towards zero with distance so shorter mates win
/// comparisons.
const fn lost_in(ply: usize) -> Value {
    -INFINITE + ply as Value
}

/// Mating the opponent in `ply` half-moves from the root.
const fn win_in(ply: usize) -> Value {
    INFINITE - ply as Value
}

// Wall-clock and node limits are only consulted every couple thousand nodes:
// reading the clock at every node is measurably slow.
const LIMIT_CHECK_INTERVAL: i32 = 4096;

/// A single search run over one position. Owns a scratch copy of the
/// position (restored through the do/undo discipline at every node), the
/// heuristic tables and the limit bookkeeping.
///
/// The search itself is single-threaded; the only outside interaction is
/// the `stop` flag, which any other thread may set to cancel the search
/// promptly. A cancelled search still reports the best move of the last
/// completed iteration.
pub struct Search<S: Scorer> {
    position: Position,
    scorer: S,
    limits: Limits,
    stop: Arc<AtomicBool>,
    state: SearchState,
    endgames: Catalogue,
    nodes: u64,
    started: Instant,
    deadline: u64,
    depth_limit: Depth,
    current_depth: Depth,
    limit_countdown: i32,
    pv: MoveList,
}

impl<S: Scorer> Search<S> {
    /// Prepares a search of `position` within `limits`. The search starts
    /// when [`Search::run`] is called.
    #[must_use]
    pub fn new(position: Position, scorer: S, limits: Limits, stop: Arc<AtomicBool>) -> Self {
        let (depth_limit, deadline) = limits.budget(position.side_to_move());
        Self {
            position,
            scorer,
            limits,
            stop,
            state: SearchState::new(),
            endgames: Catalogue::new(),
            nodes: 0,
            started: Instant::now(),
            deadline,
            depth_limit,
            current_depth: 0,
            limit_countdown: LIMIT_CHECK_INTERVAL,
            pv: MoveList::new(),
        }
    }

    /// Runs iterative deepening, reporting an `info` line after every
    /// completed iteration and a final `bestmove` line to `out`.
    ///
    /// Deepening stops when a mate is proven, the depth or node limit is
    /// reached, half of the time budget is spent (the next iteration would
    /// not finish anyway) or the stop flag is raised.
    pub fn run<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        self.started = Instant::now();
        self.current_depth = 0;

        while !self.stop.load(Ordering::Relaxed) {
            self.current_depth += 1;
            self.nodes = 0;
            let mut iteration_pv = MoveList::new();
            let result = self.search(
                self.current_depth,
                -INFINITE,
                INFINITE,
                &mut iteration_pv,
                true,
            );
            let elapsed = self.started.elapsed().as_millis() as u64;

            if !self.stop.load(Ordering::Relaxed) {
                self.pv = iteration_pv;
                self.report(out, result, elapsed)?;
            }

            if result < lost_in(MAX_DEPTH as usize) || result > win_in(MAX_DEPTH as usize) {
                break;
            }
            if self.current_depth >= self.depth_limit {
                break;
            }
            if elapsed >= self.deadline / 2 {
                break;
            }
        }

        let best = match self.pv.last() {
            Some(m) => *m,
            // Cancelled before even the first iteration finished: any legal
            // move beats resigning.
            None => {
                let mut moves = MoveList::new();
                generate_moves(&self.position, &mut moves);
                match moves.first() {
                    Some(m) => *m,
                    None => {
                        writeln!(out, "bestmove 0000")?;
                        return Ok(());
                    },
                }
            },
        };
        writeln!(out, "bestmove {}", self.position.uci(best))?;
        Ok(())
    }

    fn report<W: Write>(&self, out: &mut W, result: Value, elapsed: u64) -> anyhow::Result<()> {
        let score = if result < lost_in(MAX_DEPTH as usize) {
            format!("mate -{}", result + INFINITE)
        } else if result > win_in(MAX_DEPTH as usize) {
            format!("mate {}", INFINITE - result)
        } else {
            format!("cp {result}")
        };
        write!(
            out,
            "info depth {} score {score} nodes {} nps {} time {elapsed} pv",
            self.current_depth,
            self.nodes,
            self.nodes * 1000 / (elapsed + 1),
        )?;
        // The principal variation is stored leaf-first; replay it from the
        // root for printing (castling serialization depends on the mover).
        let mut preview = self.position.clone();
        for m in self.pv.iter().rev() {
            write!(out, " {}", preview.uci(*m))?;
            let _ = preview.do_move(*m);
        }
        writeln!(out)?;
        Ok(())
    }

    fn search(
        &mut self,
        depth: Depth,
        mut alpha: Value,
        beta: Value,
        pv: &mut MoveList,
        allow_null: bool,
    ) -> Value {
        debug_assert!(alpha < beta);
        pv.clear();

        if self.stop.load(Ordering::Relaxed) || self.check_limits() {
            self.stop.store(true, Ordering::Relaxed);
            return 0;
        }
        if self.position.threefold_repetition() || self.position.rule50() {
            return DRAW;
        }

        let mut moves = MoveList::new();
        generate_moves(&self.position, &mut moves);
        let in_check = self.position.is_in_check(self.position.side_to_move());

        if self.state.ply == 0 && !self.limits.searchmoves.is_empty() {
            let restricted: MoveList = moves
                .iter()
                .copied()
                .filter(|m| self.limits.searchmoves.contains(m))
                .collect();
            if !restricted.is_empty() {
                moves = restricted;
            }
        }

        if moves.is_empty() {
            return if in_check {
                lost_in((self.current_depth - depth) as usize)
            } else {
                DRAW
            };
        }

        if depth == 0 {
            return self.quiescence(MAX_DEPTH - 1, alpha, beta);
        }

        // Null move: if passing the turn still fails high, an actual move
        // will fail even higher. Unsound in zugzwang, hence the non-pawn
        // material requirement, and never twice in a row.
        if allow_null
            && !in_check
            && self.position.non_pawn_material(self.position.side_to_move()) > 0
            && depth > 4
        {
            self.state.ply += 1;
            let info = self.position.do_null_move();
            let mut ignored = MoveList::new();
            let result = -self.search(depth - 4, -beta, -alpha, &mut ignored, false);
            self.position.undo_null_move(info);
            self.state.ply -= 1;

            if result >= beta {
                return beta;
            }
        }

        let mut best = -INFINITE;
        let mut picker = MovePicker::new(&self.position, &moves, &self.state, true);
        let mut child_pv = MoveList::new();
        let mut full_window = true;

        while let Some(m) = picker.next() {
            let info = self.position.do_move(m);
            self.state.ply += 1;
            let result = if full_window {
                -self.search(depth - 1, -beta, -alpha, &mut child_pv, true)
            } else {
                let probe = -self.search(depth - 1, -alpha - 1, -alpha, &mut child_pv, true);
                if alpha < probe && probe < beta {
                    -self.search(depth - 1, -beta, -alpha, &mut child_pv, true)
                } else {
                    probe
                }
            };
            self.state.ply -= 1;
            self.position.undo_move(m, info);

            if result >= beta {
                if self.position.move_is_quiet(m) {
                    self.state.update_killers(self.state.ply, m);
                    if m.castle().is_none() {
                        self.state.update_history(
                            self.position.side_to_move(),
                            m.from(),
                            m.to(),
                            depth,
                        );
                    }
                }
                pv.clear();
                pv.extend(child_pv.iter().copied());
                pv.push(m);
                self.state.update_pv(self.position.hash(), m);
                return beta;
            }
            if result > best {
                best = result;
                pv.clear();
                pv.extend(child_pv.iter().copied());
                pv.push(m);
            }
            if result > alpha {
                alpha = result;
                full_window = false;
            }
        }

        if let Some(m) = pv.last() {
            self.state.update_pv(self.position.hash(), *m);
        }
        best
    }

    fn quiescence(&mut self, depth: Depth, mut alpha: Value, beta: Value) -> Value {
        if self.stop.load(Ordering::Relaxed) || self.check_limits() {
            self.stop.store(true, Ordering::Relaxed);
            return 0;
        }
        if self.position.threefold_repetition() || self.position.rule50() {
            return DRAW;
        }

        let in_check = self.position.is_in_check(self.position.side_to_move());

        // Mates and stalemates must be detected on the full move set before
        // narrowing down to captures.
        let mut moves = MoveList::new();
        generate_moves(&self.position, &mut moves);
        if moves.is_empty() {
            return if in_check {
                lost_in(MAX_DEPTH as usize)
            } else {
                DRAW
            };
        }
        moves.clear();
        generate_quiescence(&self.position, &mut moves);

        let standpat = self
            .endgames
            .probe(&self.position)
            .unwrap_or_else(|| self.scorer.score(&self.position));
        self.nodes += 1;

        if depth == 0 {
            return standpat;
        }
        if standpat >= beta {
            return beta;
        }
        if standpat > alpha {
            alpha = standpat;
        }

        let mut picker = MovePicker::new(&self.position, &moves, &self.state, false);
        let mut full_window = true;
        while let Some(m) = picker.next() {
            let info = self.position.do_move(m);
            let result = if full_window {
                -self.quiescence(depth - 1, -beta, -alpha)
            } else {
                let probe = -self.quiescence(depth - 1, -alpha - 1, -alpha);
                if alpha < probe && probe < beta {
                    -self.quiescence(depth - 1, -beta, -alpha)
                } else {
                    probe
                }
            };
            self.position.undo_move(m, info);

            if result >= beta {
                return beta;
            }
            if result > alpha {
                alpha = result;
                full_window = false;
            }
        }

        alpha
    }

    fn check_limits(&mut self) -> bool {
        self.limit_countdown -= 1;
        if self.limit_countdown > 0 {
            return false;
        }
        self.limit_countdown = LIMIT_CHECK_INTERVAL;

        if self.limits.nodes > 0 && self.nodes >= self.limits.nodes {
            self.stop.store(true, Ordering::Relaxed);
            return true;
        }
        let elapsed = self.started.elapsed().as_millis() as u64;
        if elapsed >= self.deadline {
            self.stop.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::Search;
    use crate::chess::position::Position;
    use crate::evaluation::material::MaterialScorer;
    use crate::search::Limits;

    fn run_search(fen: &str, limits: Limits) -> String {
        let position = Position::try_from(fen).expect("parsing legal position: {fen}");
        let mut search = Search::new(
            position,
            MaterialScorer,
            limits,
            Arc::new(AtomicBool::new(false)),
        );
        let mut out = Vec::new();
        search.run(&mut out).expect("writing to a buffer succeeds");
        String::from_utf8(out).expect("search output is ASCII")
    }

    fn bestmove(output: &str) -> String {
        output
            .lines()
            .find_map(|line| line.strip_prefix("bestmove "))
            .expect("search reports a bestmove")
            .to_string()
    }

    #[test]
    fn mate_in_one() {
        let limits = Limits {
            depth: 2,
            ..Limits::default()
        };
        let output = run_search("k7/8/1K6/8/8/8/8/7R w - - 0 1", limits);
        assert_eq!(bestmove(&output), "h1h8");
        assert!(output.contains("score mate 1"), "output: {output}");
    }

    #[test]
    fn hanging_queen_is_taken() {
        let limits = Limits {
            depth: 3,
            ..Limits::default()
        };
        let output = run_search("4k3/8/8/3q4/4P3/8/8/4K3 w - - 0 1", limits);
        assert_eq!(bestmove(&output), "e4d5");
    }

    #[test]
    fn searchmoves_restricts_the_root(){
        let position = Position::starting();
        let restriction = position.parse_uci("a2a3").expect("legal move");
        let limits = Limits {
            depth: 2,
            searchmoves: vec![restriction],
            ..Limits::default()
        };
        let output = run_search(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            limits,
        );
        assert_eq!(bestmove(&output), "a2a3");
    }

    #[test]
    fn mated_position_has_no_bestmove() {
        // Fool's mate has been delivered: the side to move is checkmated.
        let limits = Limits {
            depth: 2,
            ..Limits::default()
        };
        let output = run_search(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
            limits,
        );
        assert_eq!(bestmove(&output), "0000");
    }
}
