//! Classification report: per-class precision, recall, F1 and support plus
//! accuracy, macro and weighted averages.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainingError};

/// How per-class metrics are combined into one number.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AverageKind {
    /// Unweighted mean over classes.
    Macro,
    /// Mean over classes weighted by support.
    #[default]
    Weighted,
}

impl AverageKind {
    pub fn label(&self) -> &'static str {
        match self {
            AverageKind::Macro => "macro avg",
            AverageKind::Weighted => "weighted avg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub per_class: BTreeMap<i32, ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Build a classification report for binary or multi-class labels.
///
/// Labels are the union of those in `y_true` and `y_pred`. Undefined
/// precision/recall (zero denominator) is reported as 0.
pub fn classification_report(y_true: &Array1<i32>, y_pred: &Array1<i32>) -> Result<ClassificationReport> {
    if y_true.len() != y_pred.len() {
        return Err(TrainingError::shape(format!(
            "{} true labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(TrainingError::shape("cannot report on an empty label set"));
    }

    let labels: BTreeSet<i32> = y_true.iter().chain(y_pred.iter()).copied().collect();
    let n = y_true.len();

    let mut per_class = BTreeMap::new();
    for &label in &labels {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t == label, p == label) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        let precision = safe_div(tp as f64, (tp + fp) as f64);
        let recall = safe_div(tp as f64, (tp + fn_) as f64);
        let f1_score = safe_div(2.0 * precision * recall, precision + recall);
        if tp + fp == 0 {
            log::debug!("Precision for label {} is undefined (no predictions); set to 0", label);
        }
        per_class.insert(
            label,
            ClassMetrics {
                precision,
                recall,
                f1_score,
                support: tp + fn_,
            },
        );
    }

    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    let accuracy = correct as f64 / n as f64;

    let n_labels = per_class.len() as f64;
    let macro_avg = ClassMetrics {
        precision: per_class.values().map(|m| m.precision).sum::<f64>() / n_labels,
        recall: per_class.values().map(|m| m.recall).sum::<f64>() / n_labels,
        f1_score: per_class.values().map(|m| m.f1_score).sum::<f64>() / n_labels,
        support: n,
    };
    let weight = |m: &ClassMetrics| m.support as f64 / n as f64;
    let weighted_avg = ClassMetrics {
        precision: per_class.values().map(|m| m.precision * weight(m)).sum(),
        recall: per_class.values().map(|m| m.recall * weight(m)).sum(),
        f1_score: per_class.values().map(|m| m.f1_score * weight(m)).sum(),
        support: n,
    };

    Ok(ClassificationReport {
        per_class,
        accuracy,
        macro_avg,
        weighted_avg,
    })
}

impl ClassificationReport {
    /// Metrics for one label; absent labels yield all-zero metrics.
    pub fn class(&self, label: i32) -> ClassMetrics {
        self.per_class.get(&label).copied().unwrap_or_default()
    }

    pub fn average(&self, kind: AverageKind) -> ClassMetrics {
        match kind {
            AverageKind::Macro => self.macro_avg,
            AverageKind::Weighted => self.weighted_avg,
        }
    }

    /// Text table in the layout of the usual classification report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        );
        let _ = writeln!(out);
        for (label, m) in &self.per_class {
            let _ = writeln!(
                out,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                label, m.precision, m.recall, m.f1_score, m.support
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.weighted_avg.support
        );
        for kind in [AverageKind::Macro, AverageKind::Weighted] {
            let m = self.average(kind);
            let _ = writeln!(
                out,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                kind.label(),
                m.precision,
                m.recall,
                m.f1_score,
                m.support
            );
        }
        out
    }
}
