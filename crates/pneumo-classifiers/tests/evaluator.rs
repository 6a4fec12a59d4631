mod common;

use pneumo_classifiers::config::{ActiveSmoteConfig, BaselineConfig, EvaluatorConfig, ModelConfig};
use pneumo_classifiers::evaluator::{ComparativeEvaluator, Metric, Side};
use pneumo_classifiers::trainer::{ActiveSmoteTrainer, SmoteBaselineTrainer, Trainer};
use pneumo_classifiers::TrainingError;
use tempfile::tempdir;

fn active() -> ActiveSmoteTrainer {
    let config = ActiveSmoteConfig {
        model: ModelConfig::random_forest(10),
        n_rounds: 2,
        ..ActiveSmoteConfig::default()
    };
    ActiveSmoteTrainer::new(common::scenario_split(), config).unwrap()
}

fn baseline() -> SmoteBaselineTrainer {
    let config = BaselineConfig {
        model: ModelConfig::random_forest(10),
        ..BaselineConfig::default()
    };
    SmoteBaselineTrainer::new(common::scenario_split(), config).unwrap()
}

fn evaluator(parallel: bool) -> ComparativeEvaluator {
    ComparativeEvaluator::new(EvaluatorConfig {
        parallel,
        ..EvaluatorConfig::default()
    })
}

#[test]
fn test_single_trial_fails_before_training() {
    let mut a = active();
    let mut b = baseline();
    let err = evaluator(false).run_trials(&mut a, &mut b, 1).unwrap_err();

    assert!(matches!(err, TrainingError::InsufficientTrials { available: 1 }));
    assert!(a.history().is_empty());
    assert!(b.history().is_empty());
}

#[test]
fn test_identical_trainers_give_zero_t() {
    let a = active();
    let b = a.clone();
    let report = evaluator(false).run(&a, &b, 3).unwrap();

    assert_eq!(report.comparisons.len(), Metric::ALL.len());
    for c in &report.comparisons {
        assert_eq!(c.t_value, 0.0, "{}", c.metric);
        assert_eq!(c.p_value, 1.0, "{}", c.metric);
    }
}

#[test]
fn test_series_are_aligned_and_reproducible() {
    common::init_logging();
    let a = active();
    let b = baseline();
    let first = evaluator(false).run(&a, &b, 3).unwrap();
    let second = evaluator(true).run(&a, &b, 3).unwrap();

    assert_eq!(first.trials_a.len(), 3);
    assert_eq!(first.trials_b.len(), 3);
    for metric in Metric::ALL {
        assert_eq!(first.series(Side::A, metric).len(), first.series(Side::B, metric).len());
    }
    let trial_ids: Vec<usize> = second.trials_a.iter().map(|t| t.trial).collect();
    assert_eq!(trial_ids, vec![1, 2, 3]);
    assert_eq!(first, second);
}

#[test]
fn test_sequential_and_cloned_runs_agree() {
    let mut a = active();
    let mut b = baseline();
    let in_place = evaluator(false).run_trials(&mut a, &mut b, 2).unwrap();
    let cloned = evaluator(false).run(&active(), &baseline(), 2).unwrap();
    assert_eq!(in_place, cloned);
}

#[test]
fn test_report_files() {
    let report = evaluator(false).run(&active(), &baseline(), 2).unwrap();
    let dir = tempdir().unwrap();
    report.save(dir.path()).unwrap();

    let model_a = std::fs::read_to_string(dir.path().join("model_a.csv")).unwrap();
    assert!(model_a.starts_with("Test,accuracy,precision,recall,f1-score,Average\n"));
    assert_eq!(model_a.lines().count(), 3);

    let comparison = std::fs::read_to_string(dir.path().join("comparison.csv")).unwrap();
    let metrics: Vec<&str> = comparison
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').next())
        .collect();
    assert_eq!(metrics, vec!["accuracy", "precision", "recall", "f1-score"]);
    assert!(dir.path().join("model_b.csv").exists());
}
