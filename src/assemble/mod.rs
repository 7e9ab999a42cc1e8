//! Cross-slice assembly of dataloaf statistics into per-term tables.

mod assembler;
mod labels;

pub use assembler::{assemble, AssembledRow, AssemblyRequest, TermAssembly};
pub use labels::{display_labels, most_specific};
