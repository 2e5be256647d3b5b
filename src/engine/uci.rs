//! Parsing of [Universal Chess Interface] commands into a typed [`Command`].
//! The parser is deliberately lenient: the tournament manager is expected to
//! send well-formed input, and anything unrecognized is reported back as
//! [`Command::Unknown`] instead of being treated as a hard error.
//!
//! [Universal Chess Interface]: https://www.chessprogramming.org/UCI

#[derive(Debug, PartialEq)]
pub(super) enum Command {
    Uci,
    Debug {
        on: bool,
    },
    IsReady,
    SetOption {
        name: String,
        value: Option<String>,
    },
    SetPosition {
        fen: Option<String>,
        moves: Vec<String>,
    },
    NewGame,
    Go(GoParams),
    Stop,
    Quit,
    /// Extension: pretty-prints the current board. Useful for debugging.
    PrintBoard,
    /// Extension: prints the current position's Zobrist key.
    Hash,
    /// Extension: runs perft of the given depth from the current position.
    Perft {
        depth: u8,
    },
    Unknown(String),
}

#[derive(Debug, PartialEq, Default)]
pub(super) struct GoParams {
    pub(super) infinite: bool,
    pub(super) depth: Option<u8>,
    pub(super) movetime: Option<u64>,
    pub(super) nodes: Option<u64>,
    pub(super) wtime: Option<u64>,
    pub(super) btime: Option<u64>,
    pub(super) winc: Option<u64>,
    pub(super) binc: Option<u64>,
    pub(super) movestogo: Option<u32>,
    pub(super) searchmoves: Vec<String>,
}

fn parse_go(parts: &[&str]) -> Command {
    let mut params = GoParams::default();
    let mut i = 1;
    while i < parts.len() {
        match parts[i] {
            "infinite" => {
                params.infinite = true;
                i += 1;
            },
            "searchmoves" => {
                // Everything after "searchmoves" is a move list.
                params.searchmoves = parts[i + 1..].iter().map(|s| (*s).to_string()).collect();
                break;
            },
            keyword if i + 1 < parts.len() => {
                let value = parts[i + 1];
                match keyword {
                    "depth" => params.depth = value.parse().ok(),
                    "movetime" => params.movetime = value.parse().ok(),
                    "nodes" => params.nodes = value.parse().ok(),
                    "wtime" => params.wtime = value.parse().ok(),
                    "btime" => params.btime = value.parse().ok(),
                    "winc" => params.winc = value.parse().ok(),
                    "binc" => params.binc = value.parse().ok(),
                    "movestogo" => params.movestogo = value.parse().ok(),
                    _ => {},
                }
                i += 2;
            },
            _ => {
                i += 1;
            },
        }
    }
    Command::Go(params)
}

fn parse_setoption(parts: &[&str]) -> Command {
    if parts.len() < 3 || parts[1] != "name" {
        return Command::Unknown(parts.join(" "));
    }
    let value_index = parts.iter().position(|&part| part == "value");
    let name = parts[2..value_index.unwrap_or(parts.len())].join(" ");
    if name.is_empty() {
        return Command::Unknown(parts.join(" "));
    }
    let value = value_index.map(|index| parts[index + 1..].join(" "));
    Command::SetOption { name, value }
}

fn parse_setposition(parts: &[&str]) -> Command {
    let fen_index = parts.iter().position(|&part| part == "fen");
    let moves_index = parts.iter().position(|&part| part == "moves");
    let fen =
        fen_index.map(|index| parts[index + 1..moves_index.unwrap_or(parts.len())].join(" "));
    let moves = match moves_index {
        Some(index) => parts[index + 1..].iter().map(|s| (*s).to_string()).collect(),
        None => vec![],
    };
    Command::SetPosition { fen, moves }
}

impl Command {
    pub(super) fn parse(input: &str) -> Self {
        let parts: Vec<&str> = input.split_whitespace().collect();

        if parts.is_empty() {
            return Self::Unknown(input.to_string());
        }

        match parts[0] {
            "uci" => Self::Uci,
            "debug" if parts.len() > 1 => Self::Debug {
                on: parts[1] == "on",
            },
            "isready" => Self::IsReady,
            "setoption" => parse_setoption(&parts),
            "position" => parse_setposition(&parts),
            "ucinewgame" => Self::NewGame,
            "go" => parse_go(&parts),
            "stop" => Self::Stop,
            "quit" => Self::Quit,
            "d" => Self::PrintBoard,
            "hash" => Self::Hash,
            "perft" if parts.len() > 1 => match parts[1].parse() {
                Ok(depth) => Self::Perft { depth },
                Err(_) => Self::Unknown(input.to_string()),
            },
            _ => Self::Unknown(input.to_string()),
        }
    }
}
