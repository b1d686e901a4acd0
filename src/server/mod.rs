//! Serving Boundary: HTTP endpoints over a loaded model.
//!
//! One raw record comes in as an urlencoded form, becomes a one-row
//! [`RawTable`] over the schema's feature columns (absent or empty fields
//! are missing), and flows through coercion and the model wrapper. The
//! model lives behind an `Arc` in shared state: reloading means swapping a
//! fully constructed model reference, never mutating a live one.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::data::ames::TARGET_COLUMN;
use crate::data::{coerce, RawTable};
use crate::model::{AmesRegressor, ModelError};
use crate::schema::{ColumnType, FieldInput, SchemaRegistry};

/// Shared state for the prediction service.
#[derive(Clone)]
pub struct AppState {
    model: Arc<AmesRegressor>,
    column_types: Arc<BTreeMap<String, ColumnType>>,
    groups: Arc<BTreeMap<String, BTreeMap<String, FieldInput>>>,
}

impl AppState {
    /// Build state from a loaded model and the schema registry.
    pub fn new(model: Arc<AmesRegressor>, registry: &SchemaRegistry) -> Self {
        Self {
            model,
            column_types: Arc::new(registry.column_types().clone()),
            groups: Arc::new(registry.presentation_groups()),
        }
    }
}

/// Build the prediction router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/schema", get(schema))
        .route("/predict", post(predict))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    /// The prediction, rendered as text.
    pred: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Request-level error wrapper.
struct ApiError(ModelError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ModelError::NotFitted => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Presentation groups for the input form, as JSON.
async fn schema(State(state): State<AppState>) -> Json<BTreeMap<String, BTreeMap<String, FieldInput>>> {
    Json(state.groups.as_ref().clone())
}

/// Predict a sale price for one submitted record.
///
/// The record is rebuilt over the full feature column set so the encoded
/// matrix always matches the fitted one: absent and empty fields are
/// missing values, unknown fields are dropped with a warning.
async fn predict(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Json<PredictResponse>, ApiError> {
    for name in fields.keys() {
        if !state.column_types.contains_key(name) {
            warn!(field = name.as_str(), "ignoring unknown form field");
        }
    }

    let mut table = RawTable::with_index(vec![0]);
    for name in state.column_types.keys() {
        if name == TARGET_COLUMN {
            continue;
        }
        let cell = fields
            .get(name)
            .filter(|value| !value.is_empty())
            .cloned();
        table.insert_column(name.clone(), vec![cell]);
    }

    let typed = coerce(&table, &state.column_types);
    let predictions = state.model.predict(&typed).map_err(ApiError)?;
    let value = predictions.values().first().copied().unwrap_or(f32::NAN);

    Ok(Json(PredictResponse {
        pred: value.to_string(),
    }))
}
