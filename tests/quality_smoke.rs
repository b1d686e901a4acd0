//! Quality smoke tests: the regressor must learn real signal, not just run.

use std::collections::{BTreeMap, BTreeSet};

use amesboost::training::rmse;
use amesboost::{
    AmesRegressor, ColumnType, FeatureEncoder, RegressorConfig, SchemaRegistry, TypedColumn,
    TypedTable,
};

/// Synthetic housing-like problem: price driven by area, age, and a quality
/// grade, with a small deterministic wobble standing in for noise.
fn housing_problem(n: usize) -> (TypedTable, Vec<f32>) {
    let mut table = TypedTable::with_index((1..=n as u64).collect());
    table.insert_column(
        "Gr Liv Area".into(),
        TypedColumn::Numeric((0..n).map(|i| 800.0 + (i * 37 % 2200) as f32).collect()),
    );
    table.insert_column(
        "Year Built".into(),
        TypedColumn::Numeric((0..n).map(|i| (1940 + i * 13 % 80) as f32).collect()),
    );
    table.insert_column(
        "Kitchen Qual".into(),
        TypedColumn::Categorical(
            (0..n)
                .map(|i| Some(["Fa", "TA", "Gd", "Ex"][i * 7 % 4].to_string()))
                .collect(),
        ),
    );

    let grade = |i: usize| [1.0f32, 2.0, 3.0, 4.0][i * 7 % 4];
    let targets = (0..n)
        .map(|i| {
            let area = 800.0 + (i * 37 % 2200) as f32;
            let age = 2010.0 - (1940 + i * 13 % 80) as f32;
            80.0 * area - 300.0 * age + 15_000.0 * grade(i) + ((i * 31) % 997) as f32
        })
        .collect();
    (table, targets)
}

fn registry() -> SchemaRegistry {
    SchemaRegistry::from_parts(
        BTreeMap::from([
            ("Gr Liv Area".to_string(), ColumnType::Numeric),
            ("Year Built".to_string(), ColumnType::Numeric),
            (
                "Kitchen Qual".to_string(),
                ColumnType::Categorical {
                    categories: vec!["Ex".into(), "Gd".into(), "TA".into(), "Fa".into()],
                },
            ),
        ]),
        BTreeMap::from([(
            "Kitchen Qual".to_string(),
            BTreeMap::from([
                ("Ex".to_string(), 4.0f32),
                ("Gd".to_string(), 3.0),
                ("TA".to_string(), 2.0),
                ("Fa".to_string(), 1.0),
            ]),
        )]),
        BTreeSet::new(),
        BTreeMap::new(),
    )
    .unwrap()
}

#[test]
fn regressor_beats_the_mean_baseline() {
    let (table, targets) = housing_problem(400);
    let config = RegressorConfig::builder()
        .n_trees(300)
        .learning_rate(0.1)
        .early_stopping_rounds(50)
        .build()
        .unwrap();
    let mut model = AmesRegressor::new(FeatureEncoder::from_registry(&registry()), config);
    model.fit(&table, &targets).unwrap();

    let preds = model.predict(&table).unwrap();
    let mean = targets.iter().sum::<f32>() / targets.len() as f32;
    let baseline = rmse(&vec![mean; targets.len()], &targets);
    let fitted = rmse(preds.values(), &targets);

    assert!(
        fitted < baseline * 0.2,
        "fitted RMSE {fitted} should be well under the mean baseline {baseline}"
    );
}

#[test]
fn early_stopping_caps_the_forest_size() {
    let (table, targets) = housing_problem(300);
    let config = RegressorConfig::builder()
        .n_trees(5000)
        .learning_rate(0.3)
        .early_stopping_rounds(20)
        .build()
        .unwrap();
    let mut model = AmesRegressor::new(FeatureEncoder::from_registry(&registry()), config);
    model.fit(&table, &targets).unwrap();

    let state = model.fitted().unwrap();
    assert!(state.forest.n_trees() < 5000);
    assert_eq!(state.forest.n_trees(), state.best_iteration + 1);
}

#[test]
fn ordinal_grade_orders_predictions() {
    let (table, targets) = housing_problem(400);
    let config = RegressorConfig::builder()
        .n_trees(300)
        .learning_rate(0.1)
        .early_stopping_rounds(50)
        .build()
        .unwrap();
    let mut model = AmesRegressor::new(FeatureEncoder::from_registry(&registry()), config);
    model.fit(&table, &targets).unwrap();

    // Same house, better kitchen: the prediction must not decrease.
    let house = |qual: &str| {
        let mut t = TypedTable::with_index(vec![0]);
        t.insert_column("Gr Liv Area".into(), TypedColumn::Numeric(vec![1500.0]));
        t.insert_column("Year Built".into(), TypedColumn::Numeric(vec![1980.0]));
        t.insert_column(
            "Kitchen Qual".into(),
            TypedColumn::Categorical(vec![Some(qual.to_string())]),
        );
        t
    };

    let fair = model.predict(&house("Fa")).unwrap().values()[0];
    let excellent = model.predict(&house("Ex")).unwrap().values()[0];
    assert!(excellent >= fair);
}
