//! Zero handling for compositional analyses.

pub mod pseudocount;

pub use pseudocount::{add_pseudocount, multiplicative_replacement, CompositionTable};
