//! Type Coercion Engine.
//!
//! Applies the registry's declared types to a raw table. The transform is
//! pure: it never mutates the schema or any global state, and the same input
//! always yields the same output.
//!
//! Value-level anomalies are policy, not errors: user-submitted records are
//! commonly partial, so availability wins over rejecting single fields.

use std::collections::BTreeMap;

use tracing::warn;

use crate::schema::{ColumnType, SchemaError};

use super::table::{RawTable, TypedColumn, TypedTable};

/// Coerce a raw table to the declared column types.
///
/// - Numeric columns: parsed to `f32`; empty or unparsable tokens become
///   `NAN`, never an error.
/// - Categorical columns: values outside the fixed category set become
///   missing (`None`), never an error.
/// - Columns absent from the schema pass through unchanged as raw labels,
///   with a warning. Production paths never hit this case; it exists for
///   diagnostic and test inputs.
pub fn coerce(raw: &RawTable, types: &BTreeMap<String, ColumnType>) -> TypedTable {
    match coerce_inner(raw, types, false) {
        Ok(table) => table,
        // Unreachable: lenient mode never errors.
        Err(_) => unreachable!("lenient coercion cannot fail"),
    }
}

/// Coerce a raw table, failing on columns the schema cannot type.
///
/// For callers that demand a fully typed result (the bulk training loader).
///
/// # Errors
///
/// Returns [`SchemaError::UnknownColumn`] for any column without a declared
/// type. Value-level anomalies still degrade to missing markers.
pub fn coerce_strict(
    raw: &RawTable,
    types: &BTreeMap<String, ColumnType>,
) -> Result<TypedTable, SchemaError> {
    coerce_inner(raw, types, true)
}

fn coerce_inner(
    raw: &RawTable,
    types: &BTreeMap<String, ColumnType>,
    strict: bool,
) -> Result<TypedTable, SchemaError> {
    let mut typed = TypedTable::with_index(raw.index().to_vec());

    for (name, values) in raw.iter() {
        let column = match types.get(name) {
            Some(ColumnType::Numeric) => TypedColumn::Numeric(
                values
                    .iter()
                    .map(|v| match v {
                        Some(token) => token.trim().parse::<f32>().unwrap_or(f32::NAN),
                        None => f32::NAN,
                    })
                    .collect(),
            ),
            Some(ColumnType::Categorical { categories }) => TypedColumn::Categorical(
                values
                    .iter()
                    .map(|v| {
                        v.as_ref()
                            .filter(|label| categories.iter().any(|c| c == *label))
                            .cloned()
                    })
                    .collect(),
            ),
            None => {
                if strict {
                    return Err(SchemaError::UnknownColumn {
                        context: "coercion input",
                        column: name.to_string(),
                    });
                }
                warn!(column = name, "column has no declared type; passing through untyped");
                TypedColumn::Categorical(values.to_vec())
            }
        };
        typed.insert_column(name.to_string(), column);
    }

    Ok(typed)
}
