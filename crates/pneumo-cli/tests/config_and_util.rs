//! Integration tests for pipeline config loading and the library-level
//! command helpers.

use std::io::Write;

use ndarray::{Array1, Array2};
use pneumo_classifiers::config::ModelConfig;
use pneumo_classifiers::evaluator::{ComparisonReport, Metric, MetricComparison, TrialResult};
use pneumo_classifiers::io::CsvTableConfig;
use pneumo_classifiers::metrics::AverageKind;
use pneumo_classifiers::models::factory::build_model;
use pneumo_cli::commands::compare::render_comparison;
use pneumo_cli::commands::predict::{run_predict, write_predictions, Prediction};
use pneumo_cli::config::{load_pipeline_config, PipelineConfig};

// ---------------------------------------------------------------------------
// PipelineConfig defaults & serialization
// ---------------------------------------------------------------------------

#[test]
fn pipeline_config_default_values() {
    let cfg = PipelineConfig::default();
    assert_eq!(cfg.test_fraction, 0.3);
    assert_eq!(cfg.split_seed, 42);
    assert_eq!(cfg.data.target, "target");
    assert_eq!(cfg.active.n_rounds, 5);
    assert_eq!(cfg.active.resampling.k_clusters, 4);
    assert_eq!(cfg.active.model.model_type.n_estimators(), 100);
    assert_eq!(cfg.evaluator.num_trials, 10);
}

#[test]
fn pipeline_config_round_trips_through_json() {
    let cfg = PipelineConfig::default();
    let json = serde_json::to_string_pretty(&cfg).unwrap();
    assert!(json.contains("test_fraction"));
    assert!(json.contains("RandomForest"));
    let back: PipelineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn partial_config_file_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"data": {{"target": "risk"}}, "active": {{"n_rounds": 3}}, "evaluator": {{"parallel": true}}}}"#
    )
    .unwrap();

    let cfg = load_pipeline_config(file.path()).unwrap();
    assert_eq!(cfg.data.target, "risk");
    assert_eq!(cfg.active.n_rounds, 3);
    assert_eq!(cfg.active.resampling.sampling_fraction, 0.25);
    assert!(cfg.evaluator.parallel);
    assert_eq!(cfg.evaluator.num_trials, 10);
}

#[test]
fn malformed_config_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    let err = load_pipeline_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config"));
}

// ---------------------------------------------------------------------------
// Prediction input columns
// ---------------------------------------------------------------------------

/// Forest where column `a` alone separates the classes; `b` is constant.
fn save_forest(dir: &std::path::Path) -> std::path::PathBuf {
    let x = Array2::from_shape_vec(
        (8, 2),
        vec![
            0.0, 5.0, 0.1, 5.0, 0.2, 5.0, 0.3, 5.0, //
            0.7, 5.0, 0.8, 5.0, 0.9, 5.0, 1.0, 5.0,
        ],
    )
    .unwrap();
    let y = Array1::from_vec(vec![0, 0, 0, 0, 1, 1, 1, 1]);
    let mut model = build_model(&ModelConfig::random_forest(10), 1);
    model.fit(&x, &y).unwrap();

    let path = dir.join("model.json");
    model.save(&path, &["a".to_string(), "b".to_string()]).unwrap();
    path
}

#[test]
fn predict_matches_columns_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let model = save_forest(dir.path());

    let in_order = dir.path().join("in_order.csv");
    std::fs::write(&in_order, "a,b\n0.95,5\n0.05,5\n").unwrap();
    let swapped = dir.path().join("swapped.csv");
    std::fs::write(&swapped, "b,a\n5,0.95\n5,0.05\n").unwrap();

    let table = CsvTableConfig::default();
    let expected = run_predict(&model, &in_order, &table).unwrap();
    let labels: Vec<i32> = expected.iter().map(|p| p.label).collect();
    assert_eq!(labels, vec![1, 0]);
    assert_eq!(run_predict(&model, &swapped, &table).unwrap(), expected);
}

#[test]
fn predict_rejects_missing_feature_column() {
    let dir = tempfile::tempdir().unwrap();
    let model = save_forest(dir.path());

    let rows = dir.path().join("rows.csv");
    std::fs::write(&rows, "b,c\n5,1\n").unwrap();
    let err = run_predict(&model, &rows, &CsvTableConfig::default()).unwrap_err();
    assert!(err.to_string().contains("Missing feature columns"));
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

#[test]
fn predictions_csv_layout() {
    let predictions = vec![
        Prediction {
            row: 1,
            label: 0,
            proba: [0.75, 0.25],
        },
        Prediction {
            row: 2,
            label: 1,
            proba: [0.5, 0.5],
        },
    ];
    let mut buf = Vec::new();
    write_predictions(&mut buf, &predictions).unwrap();
    assert_eq!(
        String::from_utf8(buf).unwrap(),
        "row,prediction,p0,p1\n1,0,0.75,0.25\n2,1,0.5,0.5\n"
    );
}

#[test]
fn comparison_table_lists_every_metric() {
    let trial = |t: usize| TrialResult {
        trial: t,
        accuracy: 0.8,
        precision: 0.7,
        recall: 0.6,
        f1_score: 0.65,
    };
    let report = ComparisonReport {
        trainer_a: "active_smote".to_string(),
        trainer_b: "smote_baseline".to_string(),
        average_a: AverageKind::Weighted,
        average_b: AverageKind::Weighted,
        trials_a: vec![trial(1), trial(2)],
        trials_b: vec![trial(1), trial(2)],
        comparisons: Metric::ALL
            .iter()
            .map(|&metric| MetricComparison {
                metric,
                t_value: 0.0,
                p_value: 1.0,
            })
            .collect(),
        failed_trials: Vec::new(),
    };

    let table = render_comparison(&report);
    assert_eq!(table.lines().count(), 5);
    for metric in Metric::ALL {
        assert!(table.contains(metric.name()));
    }
}
