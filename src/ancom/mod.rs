//! ANCOM result handling.
//!
//! ANCOM itself is computed elsewhere; this module reads its results and
//! provides the transforms used to draw them against group differences.

mod functions;
mod results;

pub use functions::{DifferenceFunction, TransformFunction};
pub use results::{AncomResults, REJECT_COLUMN};
