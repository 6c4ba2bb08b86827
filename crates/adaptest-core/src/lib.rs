//! adaptest-core — IRT math, adaptive selection, and validity analysis.
//!
//! This crate defines the fundamental data model, the psychometric engines
//! (ability estimation and adaptive item selection), and the statistical
//! validity analysis that the rest of the adaptest system builds on.

pub mod assessment;
pub mod error;
pub mod irt;
pub mod model;
pub mod pool;
pub mod selector;
pub mod statistics;
pub mod store;
pub mod thresholds;
pub mod validity;
