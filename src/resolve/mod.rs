//! Formula term and reference level resolution against sample metadata.

mod reference;
mod resolver;

pub use reference::{ReferenceLevel, PAIR_SEPARATOR};
pub use resolver::{
    check_samples_present, resolve_model, ResolvedKind, ResolvedModel, ResolvedTerm, INTERCEPT,
};
