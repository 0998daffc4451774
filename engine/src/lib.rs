//! # Surveytab - tabular survey-data pipeline
//!
//! Surveytab loads delimited survey extracts (farm areas, production,
//! coordinates) into an explicit in-memory table and pushes them through
//! a small, strictly sequential pipeline:
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Loader    │────▶│  Transform  │────▶│ Rank/Export │
//! │ (any enc.)  │     │ (auto-enc)  │     │ filter/group│     │  (CSV out)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! Every stage is a pure function from a [`Table`] to a new [`Table`];
//! nothing is mutated in place and no stage retries another's errors.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use surveytab::{derive, group_by, load_path, sort, AggSpec, Aggregate, Expr, SortOrder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = load_path("farm_survey_large.csv")?;
//!     let with_yield = derive(
//!         &report.table,
//!         "Yield_mt_per_ha",
//!         &Expr::col("Production_mt").div(Expr::col("Farm_Area_ha")),
//!     )?;
//!     let per_crop = group_by(
//!         &with_yield,
//!         &["Crop"],
//!         &[AggSpec::named("Production_mt", Aggregate::Sum, "Total_Production_mt")],
//!     )?;
//!     let ranked = sort(&per_crop, "Total_Production_mt", SortOrder::Descending)?;
//!     println!("{ranked}");
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`table`] - Value/Schema/Table core
//! - [`loader`] - CSV loading with auto-detection and type inference
//! - [`transform`] - Derived columns, missing values, classification
//! - [`select`] - Row filtering and group-aggregate
//! - [`rank`] - Stable sorting and truncation
//! - [`export`] - CSV export
//! - [`join`] - Inner join on a key column
//! - [`recipe`] - Replayable pipeline definitions and the recipe registry

// Core modules
pub mod error;
pub mod table;

// Loading
pub mod loader;

// Transformation
pub mod transform;

// Selection
pub mod select;

// Ranking and export
pub mod export;
pub mod rank;

// Joining
pub mod join;

// Recipes
pub mod recipe;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    DomainError, DomainResult, FormatError, FormatResult, NotFoundError, PipelineError,
    PipelineResult, RegistryError, RegistryResult,
};

// =============================================================================
// Re-exports - Table core
// =============================================================================

pub use table::{ColumnDef, ColumnType, Schema, Table, Value};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use loader::{
    detect_delimiter, detect_encoding, load_bytes, load_path, load_path_with_delimiter, load_str,
    load_str_with_schema, LoadReport,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    classify, degrees_to_km, derive, drop_null, euclidean_distance, fill_null, ClassRule, Expr,
    FillWith, KM_PER_DEGREE,
};

// =============================================================================
// Re-exports - Selection
// =============================================================================

pub use select::{filter, group_by, AggSpec, Aggregate, CompareOp, Predicate};

// =============================================================================
// Re-exports - Ranking and export
// =============================================================================

pub use export::{export_path, export_string, export_writer};
pub use rank::{head, sort, top_n, SortOrder};

// =============================================================================
// Re-exports - Joining
// =============================================================================

pub use join::inner_join;

// =============================================================================
// Re-exports - Recipes
// =============================================================================

pub use recipe::{Recipe, RecipeRegistry, Step, StoredRecipe};
