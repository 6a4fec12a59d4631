use std::fmt;
use std::str::FromStr;

use plotly::common::Mode;
use plotly::layout::{Axis, BarMode, Layout};
use plotly::{Bar, Plot, Scatter};

use crate::evaluator::{ComparisonReport, Metric, Side};
use crate::metrics::ClassMetrics;
use crate::trainer::{RoundMetrics, TrainingHistory};

/// Which slice of the per-round history to chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryView {
    Accuracy,
    Minority,
    Majority,
    /// Weighted average over both classes
    Average,
}

impl HistoryView {
    pub const ALL: [HistoryView; 4] = [
        HistoryView::Accuracy,
        HistoryView::Minority,
        HistoryView::Majority,
        HistoryView::Average,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            HistoryView::Accuracy => "Accuracy per Round",
            HistoryView::Minority => "Minority Class Metrics per Round",
            HistoryView::Majority => "Majority Class Metrics per Round",
            HistoryView::Average => "Weighted Average Metrics per Round",
        }
    }

    fn class_metrics(&self, round: &RoundMetrics) -> Option<ClassMetrics> {
        match self {
            HistoryView::Accuracy => None,
            HistoryView::Minority => Some(round.minority),
            HistoryView::Majority => Some(round.majority),
            HistoryView::Average => Some(round.weighted_avg),
        }
    }
}

impl FromStr for HistoryView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "acc" | "accuracy" => Ok(HistoryView::Accuracy),
            "min" | "minority" => Ok(HistoryView::Minority),
            "maj" | "majority" => Ok(HistoryView::Majority),
            "avg" | "average" => Ok(HistoryView::Average),
            _ => Err(format!("Unknown history view: {}", s)),
        }
    }
}

impl fmt::Display for HistoryView {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            HistoryView::Accuracy => "acc",
            HistoryView::Minority => "min",
            HistoryView::Majority => "maj",
            HistoryView::Average => "avg",
        };
        f.write_str(s)
    }
}

/// Line chart of one view of a training history, one trace per metric.
pub fn plot_history(history: &TrainingHistory, view: HistoryView) -> Plot {
    let rounds: Vec<usize> = history.rounds().iter().map(|r| r.round).collect();
    let mut plot = Plot::new();

    match view {
        HistoryView::Accuracy => {
            plot.add_trace(
                Scatter::new(rounds.clone(), history.accuracy())
                    .name("Accuracy")
                    .mode(Mode::LinesMarkers),
            );
        }
        _ => {
            let metrics: Vec<ClassMetrics> = history
                .rounds()
                .iter()
                .filter_map(|r| view.class_metrics(r))
                .collect();
            let traces: [(&str, fn(&ClassMetrics) -> f64); 3] = [
                ("Precision", |m| m.precision),
                ("Recall", |m| m.recall),
                ("F1-score", |m| m.f1_score),
            ];
            for (name, value) in traces {
                let y: Vec<f64> = metrics.iter().map(value).collect();
                plot.add_trace(Scatter::new(rounds.clone(), y).name(name).mode(Mode::LinesMarkers));
            }
        }
    }

    plot.set_layout(
        Layout::new()
            .title(view.title())
            .x_axis(Axis::new().title("Round"))
            .y_axis(Axis::new().title("Score").range(vec![0.0, 1.0])),
    );
    plot
}

/// Grouped bar chart of one metric per trial for both trainers.
pub fn plot_trial_comparison(report: &ComparisonReport, metric: Metric) -> Plot {
    let mut plot = Plot::new();
    for (side, name) in [(Side::A, &report.trainer_a), (Side::B, &report.trainer_b)] {
        let trials: Vec<usize> = report.trials(side).iter().map(|t| t.trial).collect();
        plot.add_trace(Bar::new(trials, report.series(side, metric)).name(name.as_str()));
    }

    let title = match report.comparison(metric) {
        Some(c) => format!("{} per Trial (t = {:.3}, p = {:.3})", metric, c.t_value, c.p_value),
        None => format!("{} per Trial", metric),
    };
    plot.set_layout(
        Layout::new()
            .title(title.as_str())
            .bar_mode(BarMode::Group)
            .x_axis(Axis::new().title("Trial"))
            .y_axis(Axis::new().title(metric.name())),
    );
    plot
}
