//! Column derivation.
//!
//! This module handles element-wise column computation:
//! - Expr: arithmetic expression DSL over named columns
//! - Derive: appending derived columns (yield, distance, efficiency)
//! - Missing: fill/drop handling for null cells
//! - Classify: threshold-based labeling of numeric columns

pub mod classify;
pub mod derive;
pub mod expr;
pub mod missing;

pub use classify::{classify, ClassRule};
pub use derive::{degrees_to_km, derive, euclidean_distance, KM_PER_DEGREE};
pub use expr::Expr;
pub use missing::{drop_null, fill_null, FillWith};
