//! Schema Registry: declarative column descriptions for the Ames dataset.
//!
//! Four YAML documents drive the whole pipeline:
//!
//! - `column_types.yaml` - column name → numeric / categorical-with-categories
//! - `column_encodings.yaml` - column name → {label → ordinal code}
//! - `problematic_columns.yaml` - columns excluded from modeling
//! - `gui_groups.yaml` - presentation grouping of input fields
//!
//! The registry is a constructed value passed into the encoder and model at
//! build time; nothing here is process-global. Malformed or inconsistent
//! sources fail at load time with [`SchemaError`], never lazily during a
//! request.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File names of the schema sources inside the config directory.
pub const COLUMN_TYPES_FILE: &str = "column_types.yaml";
pub const COLUMN_ENCODINGS_FILE: &str = "column_encodings.yaml";
pub const PROBLEMATIC_COLUMNS_FILE: &str = "problematic_columns.yaml";
pub const GUI_GROUPS_FILE: &str = "gui_groups.yaml";

/// The one named presentation exception: month-of-sale is numeric in storage
/// but rendered as a fixed choice list of zero-padded month labels.
pub const MONTH_SOLD_COLUMN: &str = "Mo Sold";

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while loading or validating schema sources.
///
/// All of these are fatal at startup; the registry never degrades.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed schema source {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("column {column:?} uses unsupported type keyword {keyword:?}")]
    UnknownTypeKeyword { column: String, keyword: String },

    #[error("column {column:?} is declared categorical but lists no categories")]
    EmptyCategories { column: String },

    #[error("column {column:?} declares duplicate category {label:?}")]
    DuplicateCategory { column: String, label: String },

    #[error("{context} references unknown column {column:?}")]
    UnknownColumn {
        context: &'static str,
        column: String,
    },
}

// =============================================================================
// Column types
// =============================================================================

/// Declared storage type of a column.
///
/// Columns are stored as `f32` or as labels from a fixed category set; the
/// type decides how raw input is coerced and how missing values are marked.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    /// Continuous numeric column. Missing values: `f32::NAN`.
    Numeric,

    /// Categorical column with an ordered, fixed set of labels.
    ///
    /// Values outside the set are treated as missing at coercion time,
    /// never rejected.
    Categorical { categories: Vec<String> },
}

impl ColumnType {
    /// Returns true if this is a categorical column.
    pub fn is_categorical(&self) -> bool {
        matches!(self, ColumnType::Categorical { .. })
    }

    /// Returns true if this is a numeric column.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Numeric)
    }
}

/// On-disk shape of a column type entry: either the keyword `numerical` or a
/// mapping with a `categories` list (an optional `ordered` flag is accepted
/// for compatibility with the source documents).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColumnTypeSpec {
    Keyword(String),
    Categorical {
        categories: Vec<String>,
        #[serde(default)]
        #[allow(dead_code)]
        ordered: bool,
    },
}

// =============================================================================
// Presentation
// =============================================================================

/// How a column is rendered by the serving frontend.
///
/// Numeric columns serialize as the scalar `0` - a deliberately non-iterable
/// placeholder the form renderer can distinguish from a choice list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldInput {
    /// Free-form numeric input. Always serialized as `0`.
    Numeric(u8),
    /// Fixed choice list (the column's category labels).
    Choices(Vec<String>),
}

impl FieldInput {
    /// The numeric placeholder.
    pub fn numeric() -> Self {
        FieldInput::Numeric(0)
    }
}

// =============================================================================
// SchemaRegistry
// =============================================================================

/// Validated, immutable view over the four schema sources.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    column_types: BTreeMap<String, ColumnType>,
    ordinal_encodings: BTreeMap<String, BTreeMap<String, f32>>,
    problematic_columns: BTreeSet<String>,
    gui_groups: BTreeMap<String, Vec<String>>,
}

impl SchemaRegistry {
    /// Load and validate all schema sources from a config directory.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if any source is missing, fails to parse, or
    /// is internally inconsistent (empty category lists, encodings or groups
    /// referencing undeclared columns).
    pub fn load(config_dir: &Path) -> Result<Self, SchemaError> {
        let raw_types: BTreeMap<String, ColumnTypeSpec> =
            read_yaml(&config_dir.join(COLUMN_TYPES_FILE))?;
        let ordinal_encodings: BTreeMap<String, BTreeMap<String, f32>> =
            read_yaml(&config_dir.join(COLUMN_ENCODINGS_FILE))?;
        let problematic: Vec<String> = read_yaml(&config_dir.join(PROBLEMATIC_COLUMNS_FILE))?;
        let gui_groups: BTreeMap<String, Vec<String>> =
            read_yaml(&config_dir.join(GUI_GROUPS_FILE))?;

        let mut column_types = BTreeMap::new();
        for (column, spec) in raw_types {
            let ty = match spec {
                ColumnTypeSpec::Keyword(kw) if kw == "numerical" => ColumnType::Numeric,
                ColumnTypeSpec::Keyword(keyword) => {
                    return Err(SchemaError::UnknownTypeKeyword { column, keyword });
                }
                ColumnTypeSpec::Categorical { categories, .. } => {
                    ColumnType::Categorical { categories }
                }
            };
            column_types.insert(column, ty);
        }

        Self::from_parts(
            column_types,
            ordinal_encodings,
            problematic.into_iter().collect(),
            gui_groups,
        )
    }

    /// Build a registry from already-parsed parts, running full validation.
    ///
    /// This is the seam used by tests to substitute small schemas without
    /// touching the filesystem.
    pub fn from_parts(
        column_types: BTreeMap<String, ColumnType>,
        ordinal_encodings: BTreeMap<String, BTreeMap<String, f32>>,
        problematic_columns: BTreeSet<String>,
        gui_groups: BTreeMap<String, Vec<String>>,
    ) -> Result<Self, SchemaError> {
        for (column, ty) in &column_types {
            if let ColumnType::Categorical { categories } = ty {
                if categories.is_empty() {
                    return Err(SchemaError::EmptyCategories {
                        column: column.clone(),
                    });
                }
                let mut seen = BTreeSet::new();
                for label in categories {
                    if !seen.insert(label) {
                        return Err(SchemaError::DuplicateCategory {
                            column: column.clone(),
                            label: label.clone(),
                        });
                    }
                }
            }
        }

        for column in ordinal_encodings.keys() {
            if !column_types.contains_key(column) {
                return Err(SchemaError::UnknownColumn {
                    context: "ordinal encoding table",
                    column: column.clone(),
                });
            }
        }

        for columns in gui_groups.values() {
            for column in columns {
                if !column_types.contains_key(column) {
                    return Err(SchemaError::UnknownColumn {
                        context: "presentation group",
                        column: column.clone(),
                    });
                }
            }
        }

        // Problematic columns are not cross-checked: they may name identifier
        // columns (Order, PID) that never receive a declared type.

        Ok(Self {
            column_types,
            ordinal_encodings,
            problematic_columns,
            gui_groups,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Declared type per column.
    pub fn column_types(&self) -> &BTreeMap<String, ColumnType> {
        &self.column_types
    }

    /// Ordinal code tables, keyed by column.
    pub fn ordinal_encodings(&self) -> &BTreeMap<String, BTreeMap<String, f32>> {
        &self.ordinal_encodings
    }

    /// Columns unconditionally excluded from the feature matrix.
    pub fn problematic_columns(&self) -> &BTreeSet<String> {
        &self.problematic_columns
    }

    /// Declared type for one column, if any.
    pub fn column_type(&self, column: &str) -> Option<&ColumnType> {
        self.column_types.get(column)
    }

    /// Presentation groups for the serving frontend.
    ///
    /// Problematic columns are excluded, numeric columns become the
    /// [`FieldInput::Numeric`] placeholder, and [`MONTH_SOLD_COLUMN`] is
    /// rendered as a fixed month choice list even though its storage type is
    /// numeric - a named exception, not an inference.
    pub fn presentation_groups(&self) -> BTreeMap<String, BTreeMap<String, FieldInput>> {
        let mut groups = BTreeMap::new();
        for (group, columns) in &self.gui_groups {
            let mut fields = BTreeMap::new();
            for column in columns {
                if self.problematic_columns.contains(column) {
                    continue;
                }
                let input = if column == MONTH_SOLD_COLUMN {
                    FieldInput::Choices((1..=12).map(|m| format!("{m:02}")).collect())
                } else {
                    match &self.column_types[column] {
                        ColumnType::Numeric => FieldInput::numeric(),
                        ColumnType::Categorical { categories } => {
                            FieldInput::Choices(categories.clone())
                        }
                    }
                };
                fields.insert(column.clone(), input);
            }
            groups.insert(group.clone(), fields);
        }
        groups
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SchemaError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| SchemaError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
