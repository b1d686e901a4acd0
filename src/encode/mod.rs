//! Feature Encoder: typed table → numeric feature matrix.
//!
//! The encode path is the correctness-critical seam of the system. It runs
//! identically at fit and at predict time, in a fixed order:
//!
//! 1. canonicalize column order (lexicographic);
//! 2. ordinal-encode categorical columns (missing/unseen → `0.0`);
//! 3. drop problematic columns (absent ones are ignored);
//! 4. pass numeric columns through as `f32` (NaN preserved for the
//!    learner's default-direction routing).
//!
//! The transform is pure and deterministic: encoding the same typed table
//! twice yields identical output.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::data::{TypedColumn, TypedTable};
use crate::schema::SchemaRegistry;

// =============================================================================
// FeatureMatrix
// =============================================================================

/// A rectangular `f32` matrix with its canonical column names and the source
/// row identifiers.
///
/// Layout is sample-major: `[n_rows, n_columns]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    index: Vec<u64>,
    values: Array2<f32>,
}

impl FeatureMatrix {
    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of feature columns.
    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    /// Column names, in canonical (lexicographic) order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row identifiers, in input order.
    pub fn index(&self) -> &[u64] {
        &self.index
    }

    /// The feature values, `[n_rows, n_columns]`.
    pub fn values(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    /// Select a subset of rows by position, preserving their identifiers.
    pub fn select_rows(&self, positions: &[usize]) -> FeatureMatrix {
        let values = ndarray::Array2::from_shape_fn(
            (positions.len(), self.n_columns()),
            |(i, j)| self.values[(positions[i], j)],
        );
        FeatureMatrix {
            columns: self.columns.clone(),
            index: positions.iter().map(|&p| self.index[p]).collect(),
            values,
        }
    }
}

// =============================================================================
// FeatureEncoder
// =============================================================================

/// Encodes typed tables into feature matrices.
///
/// Owns the ordinal code tables and the problematic-column set; both are
/// captured from a [`SchemaRegistry`] at construction and serialized with the
/// model so a loaded artifact encodes exactly as it did at fit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    ordinal: BTreeMap<String, BTreeMap<String, f32>>,
    problematic: BTreeSet<String>,
    /// Declared category sets for categorical columns without an ordinal
    /// table entry; fixes their fallback codes across fit and predict.
    category_sets: BTreeMap<String, Vec<String>>,
}

impl FeatureEncoder {
    /// Capture encoding tables from a registry.
    pub fn from_registry(registry: &SchemaRegistry) -> Self {
        let category_sets = registry
            .column_types()
            .iter()
            .filter_map(|(name, ty)| match ty {
                crate::schema::ColumnType::Categorical { categories } => {
                    Some((name.clone(), categories.clone()))
                }
                crate::schema::ColumnType::Numeric => None,
            })
            .collect();
        Self {
            ordinal: registry.ordinal_encodings().clone(),
            problematic: registry.problematic_columns().clone(),
            category_sets,
        }
    }

    /// Build an encoder from explicit tables (test seam).
    pub fn new(
        ordinal: BTreeMap<String, BTreeMap<String, f32>>,
        problematic: BTreeSet<String>,
    ) -> Self {
        Self {
            ordinal,
            problematic,
            category_sets: BTreeMap::new(),
        }
    }

    /// Attach declared category sets for columns outside the ordinal table.
    pub fn with_category_sets(mut self, category_sets: BTreeMap<String, Vec<String>>) -> Self {
        self.category_sets = category_sets;
        self
    }

    /// Encode a typed table into a feature matrix.
    ///
    /// Categorical columns with an ordinal table entry encode by direct code
    /// lookup; any label absent from the table - including the missing
    /// marker - maps to `0.0`. Unseen categories carry no information, the
    /// same as no value at all.
    ///
    /// Categorical columns without an ordinal entry encode as their 1-based
    /// position in the column's declared category set; missing and unknown
    /// labels stay `0.0`.
    pub fn encode(&self, table: &TypedTable) -> FeatureMatrix {
        // TypedTable iterates columns lexicographically, which is the
        // canonical order. Problematic columns are filtered here so they can
        // never reach the model, whatever the caller passed in.
        let kept: Vec<(&str, &TypedColumn)> = table
            .iter()
            .filter(|(name, _)| !self.problematic.contains(*name))
            .collect();

        let n_rows = table.n_rows();
        let mut values = Array2::<f32>::zeros((n_rows, kept.len()));
        let mut columns = Vec::with_capacity(kept.len());

        for (j, (name, column)) in kept.iter().enumerate() {
            let encoded = self.encode_column(name, column);
            for (i, v) in encoded.into_iter().enumerate() {
                values[(i, j)] = v;
            }
            columns.push(name.to_string());
        }

        FeatureMatrix {
            columns,
            index: table.index().to_vec(),
            values,
        }
    }

    /// Encode one column to `f32` values.
    fn encode_column(&self, name: &str, column: &TypedColumn) -> Vec<f32> {
        match column {
            TypedColumn::Numeric(values) => values.clone(),
            TypedColumn::Categorical(labels) => match self.ordinal.get(name) {
                Some(codes) => labels
                    .iter()
                    .map(|label| {
                        label
                            .as_ref()
                            .and_then(|l| codes.get(l).copied())
                            .unwrap_or(0.0)
                    })
                    .collect(),
                // No ordinal table: code by 1-based position in the declared
                // category set. The set is fixed by the registry, so codes
                // are identical at fit and predict time. Missing stays 0.0.
                None => {
                    let categories = self.category_sets.get(name);
                    labels
                        .iter()
                        .map(|label| match (label, categories) {
                            (Some(l), Some(cats)) => cats
                                .iter()
                                .position(|c| c == l)
                                .map(|p| (p + 1) as f32)
                                .unwrap_or(0.0),
                            _ => 0.0,
                        })
                        .collect()
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TypedColumn;

    fn street_encoder() -> FeatureEncoder {
        FeatureEncoder::new(
            BTreeMap::from([(
                "Street".to_string(),
                BTreeMap::from([("Grvl".to_string(), 0.0f32), ("Pave".to_string(), 1.0f32)]),
            )]),
            BTreeSet::new(),
        )
    }

    fn typed_row(lot_area: f32, street: Option<&str>) -> TypedTable {
        let mut table = TypedTable::with_index(vec![0]);
        table.insert_column("Lot Area".into(), TypedColumn::Numeric(vec![lot_area]));
        table.insert_column(
            "Street".into(),
            TypedColumn::Categorical(vec![street.map(String::from)]),
        );
        table
    }

    #[test]
    fn encodes_ordinal_lookup_and_sorted_columns() {
        let matrix = street_encoder().encode(&typed_row(8450.0, Some("Pave")));
        assert_eq!(matrix.columns(), &["Lot Area".to_string(), "Street".to_string()]);
        assert_eq!(matrix.values()[(0, 0)], 8450.0);
        assert_eq!(matrix.values()[(0, 1)], 1.0);
    }

    #[test]
    fn unseen_and_missing_categories_encode_to_zero() {
        let matrix = street_encoder().encode(&typed_row(1.0, None));
        assert_eq!(matrix.values()[(0, 1)], 0.0);
    }

    #[test]
    fn numeric_nan_is_preserved() {
        let matrix = street_encoder().encode(&typed_row(f32::NAN, Some("Grvl")));
        assert!(matrix.values()[(0, 0)].is_nan());
        assert_eq!(matrix.values()[(0, 1)], 0.0);
    }

    #[test]
    fn problematic_columns_are_dropped() {
        let encoder = FeatureEncoder::new(
            BTreeMap::new(),
            BTreeSet::from(["Street".to_string(), "Not Present".to_string()]),
        );
        let matrix = encoder.encode(&typed_row(5.0, Some("Pave")));
        // Declared-but-absent problematic columns are not an error.
        assert_eq!(matrix.columns(), &["Lot Area".to_string()]);
    }

    #[test]
    fn unmapped_categoricals_code_by_declared_set_position() {
        let encoder = FeatureEncoder::new(BTreeMap::new(), BTreeSet::new()).with_category_sets(
            BTreeMap::from([(
                "Street".to_string(),
                vec!["Grvl".to_string(), "Pave".to_string()],
            )]),
        );
        let matrix = encoder.encode(&typed_row(1.0, Some("Pave")));
        assert_eq!(matrix.values()[(0, 1)], 2.0);
        let matrix = encoder.encode(&typed_row(1.0, Some("Grvl")));
        assert_eq!(matrix.values()[(0, 1)], 1.0);
        let matrix = encoder.encode(&typed_row(1.0, None));
        assert_eq!(matrix.values()[(0, 1)], 0.0);
    }

    #[test]
    fn encoding_is_deterministic() {
        let encoder = street_encoder();
        let table = typed_row(8450.0, Some("Pave"));
        assert_eq!(encoder.encode(&table), encoder.encode(&table));
    }

    #[test]
    fn index_is_carried_through() {
        let mut table = TypedTable::with_index(vec![42, 7]);
        table.insert_column("Lot Area".into(), TypedColumn::Numeric(vec![1.0, 2.0]));
        let matrix = street_encoder().encode(&table);
        assert_eq!(matrix.index(), &[42, 7]);
    }

    #[test]
    fn select_rows_preserves_identifiers() {
        let mut table = TypedTable::with_index(vec![10, 20, 30]);
        table.insert_column(
            "Lot Area".into(),
            TypedColumn::Numeric(vec![1.0, 2.0, 3.0]),
        );
        let matrix = street_encoder().encode(&table);
        let subset = matrix.select_rows(&[2, 0]);
        assert_eq!(subset.index(), &[30, 10]);
        assert_eq!(subset.values()[(0, 0)], 3.0);
        assert_eq!(subset.values()[(1, 0)], 1.0);
    }
}
