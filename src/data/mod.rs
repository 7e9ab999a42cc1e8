//! Input data structures: feature tables, sample metadata and model formulas.

mod count_matrix;
mod formula;
mod metadata;

pub use count_matrix::CountMatrix;
pub use formula::{Formula, Term};
pub use metadata::{Metadata, Variable, VariableType};
