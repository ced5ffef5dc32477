//! Geometry and indexing layer.
//!
//! Nothing here does I/O. The entity collections in [`crate::model`] are the
//! inputs; grid cells, tree entries and match results are the outputs.

pub mod cut;
pub mod geometry;
pub mod projection;
pub mod spatial;
pub mod validation;
