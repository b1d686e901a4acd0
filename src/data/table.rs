//! Raw and typed table containers.
//!
//! Both containers keep columns in a `BTreeMap`, so iteration order is always
//! lexicographic. That ordering is the canonical column order the encoder
//! relies on; it falls out of the storage choice rather than being re-sorted
//! at every step.

use std::collections::BTreeMap;

/// A table of raw, uncoerced values.
///
/// One row is one record: column name → optional string. `None` marks a
/// value that was empty at the source (blank CSV cell, empty form field).
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    index: Vec<u64>,
    columns: BTreeMap<String, Vec<Option<String>>>,
}

impl RawTable {
    /// Create an empty table with the given row identifiers.
    pub fn with_index(index: Vec<u64>) -> Self {
        Self {
            index,
            columns: BTreeMap::new(),
        }
    }

    /// Build a one-row table from a flat record, as submitted by the serving
    /// boundary. Empty strings denote missing values.
    pub fn from_record<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut table = Self::with_index(vec![0]);
        for (name, value) in fields {
            let value: String = value.into();
            let cell = if value.is_empty() { None } else { Some(value) };
            table.insert_column(name.into(), vec![cell]);
        }
        table
    }

    /// Insert a column.
    ///
    /// Debug-asserts that the column length matches the row count.
    pub fn insert_column(&mut self, name: String, values: Vec<Option<String>>) {
        debug_assert_eq!(
            values.len(),
            self.index.len(),
            "column {name:?} length must match row count"
        );
        self.columns.insert(name, values);
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Row identifiers.
    pub fn index(&self) -> &[u64] {
        &self.index
    }

    /// Iterate columns in lexicographic name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Option<String>])> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.columns.get(name).map(Vec::as_slice)
    }
}

/// A column after type coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedColumn {
    /// 32-bit float values; missing = `f32::NAN`.
    Numeric(Vec<f32>),

    /// Category labels from a fixed set; `None` = missing or
    /// out-of-vocabulary at coercion time.
    Categorical(Vec<Option<String>>),
}

impl TypedColumn {
    /// Number of values in the column.
    pub fn len(&self) -> usize {
        match self {
            TypedColumn::Numeric(v) => v.len(),
            TypedColumn::Categorical(v) => v.len(),
        }
    }

    /// True if the column holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if this is a numeric column.
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypedColumn::Numeric(_))
    }
}

/// A table whose columns carry their declared types.
///
/// This is the only input the encoder and model accept; constructing one
/// outside [`coerce`](super::coerce) is reserved for tests.
#[derive(Debug, Clone, Default)]
pub struct TypedTable {
    index: Vec<u64>,
    columns: BTreeMap<String, TypedColumn>,
}

impl TypedTable {
    /// Create an empty table with the given row identifiers.
    pub fn with_index(index: Vec<u64>) -> Self {
        Self {
            index,
            columns: BTreeMap::new(),
        }
    }

    /// Insert a column.
    ///
    /// Debug-asserts that the column length matches the row count.
    pub fn insert_column(&mut self, name: String, column: TypedColumn) {
        debug_assert_eq!(
            column.len(),
            self.index.len(),
            "column {name:?} length must match row count"
        );
        self.columns.insert(name, column);
    }

    /// Remove a column, returning it if present. Used to split off the
    /// training target.
    pub fn remove_column(&mut self, name: &str) -> Option<TypedColumn> {
        self.columns.remove(name)
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Row identifiers, in input order.
    pub fn index(&self) -> &[u64] {
        &self.index
    }

    /// Iterate columns in lexicographic name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedColumn)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Column names in lexicographic order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&TypedColumn> {
        self.columns.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_record_marks_empty_fields_missing() {
        let table = RawTable::from_record([("Lot Area", "8450"), ("Street", "")]);
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.column("Lot Area").unwrap()[0].as_deref(), Some("8450"));
        assert_eq!(table.column("Street").unwrap()[0], None);
    }

    #[test]
    fn columns_iterate_in_lexicographic_order() {
        let mut table = TypedTable::with_index(vec![1, 2]);
        table.insert_column("Street".into(), TypedColumn::Categorical(vec![None, None]));
        table.insert_column("Lot Area".into(), TypedColumn::Numeric(vec![1.0, 2.0]));
        let names: Vec<_> = table.column_names().collect();
        assert_eq!(names, vec!["Lot Area", "Street"]);
    }

    #[test]
    fn remove_column_returns_the_column() {
        let mut table = TypedTable::with_index(vec![0]);
        table.insert_column("SalePrice".into(), TypedColumn::Numeric(vec![215000.0]));
        let target = table.remove_column("SalePrice").unwrap();
        assert_eq!(target, TypedColumn::Numeric(vec![215000.0]));
        assert_eq!(table.n_columns(), 0);
    }
}
