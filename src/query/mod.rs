//! The Boolean/phrase/proximity query engine (spec. 4.6).

pub mod eval;
pub mod grammar;

pub use eval::{evaluate, FsPostings, Postings};
pub use grammar::{parse, Node};

use crate::Result;

/// Parses and evaluates a query string in one call.
pub fn run<P: Postings>(query: &str, postings: &P) -> Result<Vec<u32>> {
    let node = parse(query)?;
    evaluate(&node, postings)
}
