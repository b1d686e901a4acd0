//! amesboost: schema-driven feature encoding and boosted-tree regression
//! for the Ames housing dataset.
//!
//! The crate is built around one correctness-critical idea: the feature
//! matrix handed to the model at predict time must have exactly the same
//! column set and ordering as the one it was fitted on. Everything between
//! raw input and the learner goes through a single deterministic path:
//!
//! ```text
//! RawTable --coerce--> TypedTable --encode--> FeatureMatrix --> Forest
//! ```
//!
//! # Key Types
//!
//! - [`SchemaRegistry`] - declarative column types, ordinal encodings,
//!   problematic columns, presentation groups
//! - [`TypedTable`] / [`coerce`] - schema-directed type coercion
//! - [`FeatureEncoder`] - canonical ordering + ordinal encoding
//! - [`AmesRegressor`] / [`RegressorConfig`] - the model wrapper
//! - [`io::save_model`] / [`io::load_model`] - artifact persistence
//!
//! # Training
//!
//! Use `RegressorConfig::builder()` to configure, then `AmesRegressor::fit`.
//! See the [`model`] module for details.

pub mod data;
pub mod encode;
pub mod io;
pub mod model;
pub mod repr;
pub mod schema;
pub mod server;
pub mod training;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Schema sources
pub use schema::{ColumnType, FieldInput, SchemaError, SchemaRegistry};

// Tables and coercion
pub use data::{coerce, coerce_strict, RawTable, TypedColumn, TypedTable};

// Encoding
pub use encode::{FeatureEncoder, FeatureMatrix};

// Model wrapper (most users want these)
pub use model::{AmesRegressor, ModelError, PredictionSeries, RegressorConfig};

// Learner internals, exposed for inspection and tests
pub use repr::{Forest, Tree};
