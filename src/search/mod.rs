//! The [search]: iterative deepening with principal-variation alpha-beta,
//! null-move pruning and a capture-only quiescence at the leaves.
//!
//! [search]: https://www.chessprogramming.org/Search

mod limits;
mod picker;
mod pvs;
mod state;

pub use limits::Limits;
pub use pvs::Search;

/// Search depth in plies.
pub type Depth = u8;

/// The deepest the search will ever go, quiescence included.
pub const MAX_DEPTH: Depth = 64;
