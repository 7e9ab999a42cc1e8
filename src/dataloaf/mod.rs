//! Multi-slice result packages.
//!
//! A dataloaf is a directory with one `<statistic>_slice.csv` per statistic
//! and a `datapackage.json` describing the package.

mod facts;
mod package;
mod slice;

pub use facts::{Field, NutritionFacts, Resource, Schema, SIDECAR};
pub use package::DataLoaf;
pub use slice::{Slice, SLICE_SUFFIX};
