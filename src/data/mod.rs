//! Tables and the Type Coercion Engine.
//!
//! Raw input - whether a 2900-row TSV or a single web form - becomes a
//! [`RawTable`] of optional strings, then a [`TypedTable`] via [`coerce`].
//! Coercion is schema-directed and deliberately forgiving: unparsable
//! numbers and out-of-vocabulary labels degrade to missing markers instead
//! of failing the request.

mod coerce;
mod table;

pub mod ames;

pub use coerce::{coerce, coerce_strict};
pub use table::{RawTable, TypedColumn, TypedTable};
