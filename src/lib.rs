//! Rukh: a [UCI] chess engine built around bitboard move generation,
//! incrementally hashed positions and an iterative-deepening principal
//! variation search.
//!
//! [UCI]: https://www.chessprogramming.org/UCI

#![warn(missing_docs, variant_size_differences)]
// Rustc lints.
#![warn(
    absolute_paths_not_starting_with_crate,
    keyword_idents,
    macro_use_extern_crate,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]
// Rustdoc lints.
#![warn(
    rustdoc::private_doc_tests,
    rustdoc::missing_crate_level_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::invalid_codeblock_attributes,
    rustdoc::invalid_html_tags,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::bare_urls
)]
// Clippy lints.
#![warn(
    clippy::correctness,
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::pedantic
)]
// Performance is extremely important.
#![deny(clippy::perf)]

pub mod book;
pub mod chess;
pub mod evaluation;
pub mod search;

mod engine;
pub use engine::Engine;

/// Prints the engine name and version on startup.
pub fn print_engine_info() {
    println!(
        "{} chess engine {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
}
