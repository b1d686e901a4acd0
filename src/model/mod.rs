//! Regression Model Wrapper.
//!
//! [`AmesRegressor`] owns the boosted-tree learner and applies the
//! [`FeatureEncoder`](crate::encode::FeatureEncoder) internally, so callers
//! never hand raw columns to the learner. Fit and predict share one encode
//! path; that is what guarantees train/serve parity.
//!
//! State machine: `Unfit → Fit`. Re-fitting replaces the previous state;
//! there is no transition back. `predict` takes `&self` - a fitted model is
//! immutable and safe to share across concurrent requests.

use bon::Builder;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;
use tracing::info;

use crate::data::TypedTable;
use crate::encode::FeatureEncoder;
use crate::repr::Forest;
use crate::training::{self, GainParams, TrainParams};

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by the model wrapper.
#[derive(Debug, Error)]
pub enum ModelError {
    /// `predict` was invoked before `fit`. Never silently defaulted.
    #[error("model is not fitted; train it before predicting")]
    NotFitted,

    /// Target length does not match the feature table.
    #[error("target length {got} does not match {expected} feature rows")]
    TargetLength { expected: usize, got: usize },

    /// The encoded column set at predict time differs from fit time.
    #[error(
        "feature columns do not match the fitted model ({} fitted, {} provided)",
        expected.len(),
        got.len()
    )]
    FeatureMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },
}

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("learning_rate must be positive, got {0}")]
    InvalidLearningRate(f32),

    #[error("n_trees must be at least 1")]
    InvalidNTrees,

    #[error("num_leaves must be at least 2")]
    InvalidNumLeaves,

    #[error("max_depth must be at least 1")]
    InvalidMaxDepth,

    #[error("{field} must be in (0, 1], got {value}")]
    InvalidSamplingRatio { field: &'static str, value: f32 },

    #[error("{field} must be non-negative, got {value}")]
    InvalidRegularization { field: &'static str, value: f32 },

    #[error("validation_fraction must be in [0, 1), got {0}")]
    InvalidValidationFraction(f32),
}

// =============================================================================
// RegressorConfig
// =============================================================================

/// Hyperparameters for the boosted-tree regressor.
///
/// Defaults mirror the production Ames model: many shallow trees with a low
/// learning rate, 25% of rows held out for early stopping.
///
/// # Example
///
/// ```
/// use amesboost::RegressorConfig;
///
/// let config = RegressorConfig::builder()
///     .n_trees(500)
///     .learning_rate(0.05)
///     .seed(7)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Builder)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
pub struct RegressorConfig {
    /// Number of boosting rounds. Default: 20000 (early stopping decides the
    /// effective count).
    #[builder(default = 20000)]
    pub n_trees: u32,

    /// Learning rate (shrinkage). Default: 0.01.
    #[builder(default = 0.01)]
    pub learning_rate: f32,

    /// Maximum leaves per tree. Default: 20.
    #[builder(default = 20)]
    pub num_leaves: u32,

    /// Maximum tree depth. Default: 3.
    #[builder(default = 3)]
    pub max_depth: u32,

    /// L1 regularization. Default: 1e-3.
    #[builder(default = 1e-3)]
    pub reg_alpha: f32,

    /// L2 regularization. Default: 1e-2.
    #[builder(default = 1e-2)]
    pub reg_lambda: f32,

    /// Row subsampling fraction. Default: 0.8.
    #[builder(default = 0.8)]
    pub subsample: f32,

    /// Resample rows every this many rounds; 0 disables. Default: 1.
    #[builder(default = 1)]
    pub subsample_freq: u32,

    /// Stop after this many rounds without validation improvement; 0
    /// disables early stopping. Default: 2000.
    #[builder(default = 2000)]
    pub early_stopping_rounds: u32,

    /// Fraction of rows held out for validation. Default: 0.25.
    #[builder(default = 0.25)]
    pub validation_fraction: f32,

    /// Random seed for the train/validation split and subsampling.
    /// Default: 42.
    #[builder(default = 42)]
    pub seed: u64,
}

impl<S: regressor_config_builder::IsComplete> RegressorConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any parameter is out of range.
    pub fn build(self) -> Result<RegressorConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for RegressorConfig {
    fn default() -> Self {
        RegressorConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!("default config is valid"))
    }
}

impl RegressorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.learning_rate <= 0.0 {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        if self.n_trees == 0 {
            return Err(ConfigError::InvalidNTrees);
        }
        if self.num_leaves < 2 {
            return Err(ConfigError::InvalidNumLeaves);
        }
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidMaxDepth);
        }
        if self.subsample <= 0.0 || self.subsample > 1.0 {
            return Err(ConfigError::InvalidSamplingRatio {
                field: "subsample",
                value: self.subsample,
            });
        }
        if self.reg_alpha < 0.0 {
            return Err(ConfigError::InvalidRegularization {
                field: "reg_alpha",
                value: self.reg_alpha,
            });
        }
        if self.reg_lambda < 0.0 {
            return Err(ConfigError::InvalidRegularization {
                field: "reg_lambda",
                value: self.reg_lambda,
            });
        }
        if self.validation_fraction < 0.0 || self.validation_fraction >= 1.0 {
            return Err(ConfigError::InvalidValidationFraction(
                self.validation_fraction,
            ));
        }
        Ok(())
    }

    fn to_train_params(&self) -> TrainParams {
        TrainParams {
            n_trees: self.n_trees,
            learning_rate: self.learning_rate,
            num_leaves: self.num_leaves,
            max_depth: self.max_depth,
            gain: GainParams {
                reg_lambda: self.reg_lambda,
                reg_alpha: self.reg_alpha,
                ..GainParams::default()
            },
            subsample: self.subsample,
            subsample_freq: self.subsample_freq,
            early_stopping_rounds: (self.early_stopping_rounds > 0)
                .then_some(self.early_stopping_rounds),
            seed: self.seed,
        }
    }
}

// =============================================================================
// Predictions
// =============================================================================

/// Predictions aligned with the caller's row identifiers, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSeries {
    index: Vec<u64>,
    values: Vec<f32>,
}

impl PredictionSeries {
    /// Number of predictions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no predictions.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Row identifiers, matching the input table's index.
    pub fn index(&self) -> &[u64] {
        &self.index
    }

    /// Predicted values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Iterate `(row_id, prediction)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u64, f32)> + '_ {
        self.index.iter().copied().zip(self.values.iter().copied())
    }
}

// =============================================================================
// AmesRegressor
// =============================================================================

/// State of a fitted model.
///
/// Public for the persistence layer; construct through
/// [`AmesRegressor::fit`] in normal use.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FittedState {
    /// The trained ensemble.
    pub forest: Forest,
    /// The exact encoded column set the forest was fitted on.
    pub feature_columns: Vec<String>,
    /// Best boosting round per validation RMSE.
    pub best_iteration: usize,
}

/// Boosted-tree regressor for the Ames sale price.
#[derive(Debug, Clone)]
pub struct AmesRegressor {
    config: RegressorConfig,
    encoder: FeatureEncoder,
    state: Option<FittedState>,
}

impl AmesRegressor {
    /// Create an unfitted model.
    pub fn new(encoder: FeatureEncoder, config: RegressorConfig) -> Self {
        Self {
            config,
            encoder,
            state: None,
        }
    }

    /// Reassemble a model from persisted parts.
    pub fn from_parts(
        config: RegressorConfig,
        encoder: FeatureEncoder,
        state: Option<FittedState>,
    ) -> Self {
        Self {
            config,
            encoder,
            state,
        }
    }

    /// The model configuration.
    pub fn config(&self) -> &RegressorConfig {
        &self.config
    }

    /// The encoder used on every fit and predict path.
    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Fitted state, if the model has been trained.
    pub fn fitted(&self) -> Option<&FittedState> {
        self.state.as_ref()
    }

    /// True once `fit` has completed.
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Fit the model.
    ///
    /// Encodes the table, holds out `validation_fraction` of the rows with
    /// the configured seed, and trains with early stopping monitored on the
    /// held-out partition. Re-fitting replaces any previous state.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::TargetLength`] if `targets` does not match the
    /// table's row count.
    pub fn fit(&mut self, table: &TypedTable, targets: &[f32]) -> Result<(), ModelError> {
        if targets.len() != table.n_rows() {
            return Err(ModelError::TargetLength {
                expected: table.n_rows(),
                got: targets.len(),
            });
        }

        let matrix = self.encoder.encode(table);
        let n_rows = matrix.n_rows();

        // Seeded shuffle, fixed fraction held out.
        let mut positions: Vec<usize> = (0..n_rows).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        positions.shuffle(&mut rng);
        let n_valid = (n_rows as f32 * self.config.validation_fraction) as usize;
        let (valid_pos, train_pos) = positions.split_at(n_valid);

        let train_matrix = matrix.select_rows(train_pos);
        let valid_matrix = matrix.select_rows(valid_pos);
        let train_targets: Vec<f32> = train_pos.iter().map(|&p| targets[p]).collect();
        let valid_targets: Vec<f32> = valid_pos.iter().map(|&p| targets[p]).collect();

        info!(
            rows = n_rows,
            features = matrix.n_columns(),
            held_out = n_valid,
            "fitting regressor"
        );

        let outcome = training::train(
            train_matrix.values(),
            &train_targets,
            valid_matrix.values(),
            &valid_targets,
            &self.config.to_train_params(),
        );

        if let Some(score) = outcome.best_score {
            info!(
                best_iteration = outcome.best_iteration,
                rmse = score,
                "training finished"
            );
        }

        self.state = Some(FittedState {
            forest: outcome.forest,
            feature_columns: matrix.columns().to_vec(),
            best_iteration: outcome.best_iteration,
        });
        Ok(())
    }

    /// Predict one value per input row, in input order.
    ///
    /// Routes through the identical encode path as `fit` - never a divergent
    /// one - and verifies the encoded column set matches the fitted one.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotFitted`] before `fit`;
    /// [`ModelError::FeatureMismatch`] if the encoded columns differ from
    /// fit time.
    pub fn predict(&self, table: &TypedTable) -> Result<PredictionSeries, ModelError> {
        let state = self.state.as_ref().ok_or(ModelError::NotFitted)?;

        let matrix = self.encoder.encode(table);
        if matrix.columns() != state.feature_columns.as_slice() {
            return Err(ModelError::FeatureMismatch {
                expected: state.feature_columns.clone(),
                got: matrix.columns().to_vec(),
            });
        }

        let values = state.forest.predict(matrix.values());
        Ok(PredictionSeries {
            index: matrix.index().to_vec(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TypedColumn;
    use std::collections::{BTreeMap, BTreeSet};

    fn small_config() -> RegressorConfig {
        RegressorConfig::builder()
            .n_trees(30)
            .learning_rate(0.2)
            .early_stopping_rounds(0)
            .validation_fraction(0.0)
            .subsample_freq(0)
            .build()
            .unwrap()
    }

    fn linear_table(n: usize) -> (TypedTable, Vec<f32>) {
        let mut table = TypedTable::with_index((0..n as u64).collect());
        table.insert_column(
            "Lot Area".into(),
            TypedColumn::Numeric((0..n).map(|i| i as f32).collect()),
        );
        let targets = (0..n).map(|i| 2.0 * i as f32 + 1.0).collect();
        (table, targets)
    }

    fn model() -> AmesRegressor {
        AmesRegressor::new(
            FeatureEncoder::new(BTreeMap::new(), BTreeSet::new()),
            small_config(),
        )
    }

    #[test]
    fn predict_before_fit_is_an_error() {
        let (table, _) = linear_table(10);
        let err = model().predict(&table).unwrap_err();
        assert!(matches!(err, ModelError::NotFitted));
    }

    #[test]
    fn fit_then_predict_preserves_index() {
        let (table, targets) = linear_table(50);
        let mut model = model();
        model.fit(&table, &targets).unwrap();

        let preds = model.predict(&table).unwrap();
        assert_eq!(preds.len(), 50);
        assert_eq!(preds.index(), table.index());
        assert!(preds.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn target_length_mismatch_is_rejected() {
        let (table, _) = linear_table(10);
        let err = model().fit(&table, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::TargetLength {
                expected: 10,
                got: 2
            }
        ));
    }

    #[test]
    fn refitting_replaces_prior_state() {
        let (table, targets) = linear_table(40);
        let mut model = model();
        model.fit(&table, &targets).unwrap();
        let first = model.predict(&table).unwrap();

        // Different targets, same model object.
        let flipped: Vec<f32> = targets.iter().map(|t| -t).collect();
        model.fit(&table, &flipped).unwrap();
        let second = model.predict(&table).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn feature_mismatch_is_detected() {
        let (table, targets) = linear_table(20);
        let mut model = model();
        model.fit(&table, &targets).unwrap();

        let mut other = TypedTable::with_index(vec![0]);
        other.insert_column("Lot Area".into(), TypedColumn::Numeric(vec![1.0]));
        other.insert_column("Extra".into(), TypedColumn::Numeric(vec![2.0]));
        let err = model.predict(&other).unwrap_err();
        assert!(matches!(err, ModelError::FeatureMismatch { .. }));
    }

    #[test]
    fn default_config_mirrors_production_model() {
        let config = RegressorConfig::default();
        assert_eq!(config.n_trees, 20000);
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.num_leaves, 20);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.early_stopping_rounds, 2000);
        assert_eq!(config.validation_fraction, 0.25);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = RegressorConfig::builder()
            .learning_rate(0.0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidLearningRate(0.0));

        let err = RegressorConfig::builder()
            .subsample(1.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSamplingRatio { .. }));
    }
}
