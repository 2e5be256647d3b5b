//! The engine puts all pieces together: it owns the current position and
//! the opening book, implements the [Universal Chess Interface] main loop
//! and hands positions over to the [`crate::search`].
//!
//! [`Engine::uci_loop`] continuously reads commands from the input stream
//! and executes them until "quit" arrives. The implementation does not aim
//! to be exhaustive: the goal is to work with UCI-compatible GUIs and
//! tournament runners, which are responsible for sending well-formed
//! commands. Unsupported or corrupt input is skipped with an `info string`
//! notice.
//!
//! [Universal Chess Interface]: https://www.chessprogramming.org/UCI

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::book::PolyglotBook;
use crate::chess::movegen::{generate_moves, MoveList};
use crate::chess::position::Position;
use crate::engine::uci::{Command, GoParams};
use crate::evaluation::material::MaterialScorer;
use crate::search::{Limits, Search};

mod uci;

/// The engine driver: reads UCI commands from `input`, writes responses to
/// `out`. Searches run on a worker thread so that `stop` stays responsive;
/// the worker reports `info`/`bestmove` lines directly to stdout.
pub struct Engine<'a, R: BufRead, W: Write> {
    /// Next search will start from this position.
    position: Position,
    book: Option<PolyglotBook>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    debug: bool,
    /// UCI commands will be read from this stream.
    input: &'a mut R,
    /// Responses to UCI commands will be written to this stream.
    out: &'a mut W,
}

impl<'a, R: BufRead, W: Write> Engine<'a, R, W> {
    /// Creates a new instance of the engine with the starting position as
    /// the search root.
    #[must_use]
    pub fn new(input: &'a mut R, out: &'a mut W) -> Self {
        Self {
            position: Position::starting(),
            book: None,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            debug: false,
            input,
            out,
        }
    }

    /// Continuously reads the input stream and executes UCI commands until
    /// "quit" is sent or the stream ends.
    pub fn uci_loop(&mut self) -> anyhow::Result<()> {
        loop {
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {},
                Err(e) => return Err(e.into()),
            }
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Command::Uci => self.handshake()?,
                Command::Debug { on } => self.debug = on,
                Command::IsReady => self.sync()?,
                Command::SetOption { name, value } => self.set_option(&name, value.as_deref())?,
                Command::SetPosition { fen, moves } => self.set_position(fen, &moves)?,
                Command::NewGame => self.new_game(),
                Command::Go(params) => self.go(&params)?,
                Command::Stop => self.finish_search(),
                Command::Quit => {
                    self.finish_search();
                    break;
                },
                Command::PrintBoard => write!(self.out, "{:?}", self.position)?,
                Command::Hash => writeln!(self.out, "{:016x}", self.position.hash())?,
                Command::Perft { depth } => self.run_perft(depth)?,
                Command::Unknown(command) => {
                    writeln!(self.out, "info string Unsupported command: {}", command.trim())?;
                },
            }
            self.out.flush()?;
        }
        self.finish_search();
        Ok(())
    }

    /// Responds to the `uci` handshake command by identifying the engine.
    fn handshake(&mut self) -> anyhow::Result<()> {
        writeln!(
            self.out,
            "id name {} {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )?;
        writeln!(self.out, "id author {}", env!("CARGO_PKG_AUTHORS"))?;
        writeln!(self.out, "option name Polyglot Book type string default <empty>")?;
        writeln!(self.out, "uciok")?;
        Ok(())
    }

    /// Syncs with the UCI server by responding with `readyok`.
    fn sync(&mut self) -> anyhow::Result<()> {
        writeln!(self.out, "readyok")?;
        Ok(())
    }

    fn new_game(&mut self) {
        self.finish_search();
        self.position = Position::starting();
    }

    fn set_option(&mut self, name: &str, value: Option<&str>) -> anyhow::Result<()> {
        match name {
            "Polyglot Book" => match value {
                None | Some("") | Some("<empty>") => self.book = None,
                Some(path) => match PolyglotBook::from_file(path) {
                    Ok(book) => {
                        if self.debug {
                            writeln!(
                                self.out,
                                "info string Loaded book with {} positions",
                                book.len()
                            )?;
                        }
                        self.book = Some(book);
                    },
                    Err(e) => writeln!(self.out, "info string {e:#}")?,
                },
            },
            _ => writeln!(self.out, "info string Unsupported option: {name}")?,
        }
        Ok(())
    }

    /// Changes the position of the board to the one specified in the
    /// command and applies the listed moves.
    fn set_position(&mut self, fen: Option<String>, moves: &[String]) -> anyhow::Result<()> {
        match fen {
            Some(fen) => match Position::from_fen(&fen) {
                Ok(position) => self.position = position,
                Err(e) => {
                    writeln!(self.out, "info string {e:#}")?;
                    return Ok(());
                },
            },
            None => self.position = Position::starting(),
        }
        for next_move in moves {
            match self.position.parse_uci(next_move) {
                Some(m) => {
                    let _ = self.position.do_move(m);
                },
                None => {
                    writeln!(self.out, "info string Illegal move: {next_move}")?;
                    break;
                },
            }
        }
        Ok(())
    }

    fn go(&mut self, params: &GoParams) -> anyhow::Result<()> {
        self.finish_search();

        // A known book position answers instantly without searching.
        let key = self.position.hash();
        if let Some(book) = &mut self.book {
            if book.contains(key) {
                if let Some(m) = book.random_move(key, &self.position) {
                    writeln!(self.out, "bestmove {}", self.position.uci(m))?;
                    return Ok(());
                }
            }
        }

        let limits = Limits {
            infinite: params.infinite,
            depth: params.depth.unwrap_or(0),
            movetime: params.movetime.unwrap_or(0),
            timeleft: [params.wtime.unwrap_or(0), params.btime.unwrap_or(0)],
            increment: [params.winc.unwrap_or(0), params.binc.unwrap_or(0)],
            movestogo: params.movestogo.unwrap_or(0),
            nodes: params.nodes.unwrap_or(0),
            searchmoves: params
                .searchmoves
                .iter()
                .filter_map(|m| self.position.parse_uci(m))
                .collect(),
        };

        let position = self.position.clone();
        // Cleared before the worker starts: clearing it inside the worker
        // would race with an immediately following `stop`.
        self.stop.store(false, Ordering::Relaxed);
        let stop = Arc::clone(&self.stop);
        self.worker = Some(thread::spawn(move || {
            let mut search = Search::new(position, MaterialScorer, limits, stop);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            // A write failure means the GUI is gone: nothing left to report
            // to.
            let _ = search.run(&mut out);
        }));
        Ok(())
    }

    /// Stops the running search (if any) and waits for its `bestmove`.
    fn finish_search(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.stop.store(true, Ordering::Relaxed);
            let _ = worker.join();
        }
    }

    fn run_perft(&mut self, depth: u8) -> anyhow::Result<()> {
        let started = Instant::now();
        let mut total = 0u64;
        if depth > 0 {
            let mut moves = MoveList::new();
            generate_moves(&self.position, &mut moves);
            for m in moves {
                let info = self.position.do_move(m);
                let nodes = self.position.perft(depth - 1);
                self.position.undo_move(m, info);
                writeln!(self.out, "{}: {nodes}", self.position.uci(m))?;
                total += nodes;
            }
        }
        let elapsed = started.elapsed().as_millis().max(1);
        writeln!(self.out)?;
        writeln!(self.out, "Nodes: {total}")?;
        writeln!(self.out, "Time: {elapsed}ms")?;
        writeln!(self.out, "Speed: {} nps", total as u128 * 1000 / elapsed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::Engine;

    fn run_session(script: &str) -> String {
        let mut input = Cursor::new(script.to_string());
        let mut out = Vec::new();
        Engine::new(&mut input, &mut out)
            .uci_loop()
            .expect("session runs to completion");
        String::from_utf8(out).expect("engine output is ASCII")
    }

    #[test]
    fn handshake() {
        let output = run_session("uci\nisready\nquit\n");
        assert!(output.contains("id name rukh"), "output: {output}");
        assert!(output.contains("uciok"), "output: {output}");
        assert!(output.contains("readyok"), "output: {output}");
    }

    #[test]
    fn position_and_hash() {
        let output = run_session("position startpos moves e2e4\nhash\nquit\n");
        // One 16-hex-digit key line.
        assert!(
            output.lines().any(|line| line.len() == 16
                && line.chars().all(|c| c.is_ascii_hexdigit())),
            "output: {output}"
        );
    }

    #[test]
    fn print_board() {
        let output = run_session("d\nquit\n");
        assert!(
            output.contains("Fen: \"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1\""),
            "output: {output}"
        );
    }

    #[test]
    fn shallow_perft() {
        let output = run_session("perft 2\nquit\n");
        assert!(output.contains("Nodes: 400"), "output: {output}");
        assert!(output.contains("e2e4: 20"), "output: {output}");
    }

    #[test]
    fn illegal_moves_are_reported() {
        let output = run_session("position startpos moves e2e5\nquit\n");
        assert!(
            output.contains("info string Illegal move: e2e5"),
            "output: {output}"
        );
    }
}
