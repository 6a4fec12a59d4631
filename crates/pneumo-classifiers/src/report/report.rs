// Report and ReportSection come from the shared `report-builder` package;
// this module only assembles the training and comparison pages.
use std::path::Path;

use anyhow::Context;
use maud::{html, Markup};

pub use report_builder::Report;
pub use report_builder::ReportSection;

use crate::evaluator::{ComparisonReport, Metric, Side};
use crate::report::plots::{plot_history, plot_trial_comparison, HistoryView};
use crate::trainer::{TrainingHistory, TrainingSummary};

/// Write a report to `path`.
pub fn save_report(report: &Report, path: &Path) -> anyhow::Result<()> {
    let filename = path
        .to_str()
        .with_context(|| format!("Report path is not valid UTF-8: {}", path.display()))?;
    report
        .save_to_file(filename)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    log::info!("Report saved to {}", path.display());
    Ok(())
}

fn summary_table(summary: &TrainingSummary) -> Markup {
    html! {
        table {
            tr { th { "rounds" } th { "accuracy" } th { "average" } th { "precision" } th { "recall" } th { "f1-score" } }
            @for (label, avg) in [("weighted avg", summary.overall_weighted_avg), ("macro avg", summary.overall_macro_avg)] {
                tr {
                    td { (summary.rounds) }
                    td { (format!("{:.4}", summary.overall_accuracy)) }
                    td { (label) }
                    td { (format!("{:.4}", avg.precision)) }
                    td { (format!("{:.4}", avg.recall)) }
                    td { (format!("{:.4}", avg.f1_score)) }
                }
            }
        }
    }
}

fn history_table(history: &TrainingHistory) -> Markup {
    html! {
        table {
            tr {
                th { "round" } th { "accuracy" } th { "minority f1" } th { "majority f1" }
                th { "weighted f1" } th { "grown rows" } th { "minority rows" } th { "synthetic rows" }
            }
            @for r in history.rounds() {
                tr {
                    td { (r.round) }
                    td { (format!("{:.4}", r.accuracy)) }
                    td { (format!("{:.4}", r.minority.f1_score)) }
                    td { (format!("{:.4}", r.majority.f1_score)) }
                    td { (format!("{:.4}", r.weighted_avg.f1_score)) }
                    td { (r.grown_size) }
                    td { (r.minority_count) }
                    td { (r.synthetic_rows) }
                }
            }
        }
    }
}

fn config_block(config_json: &str) -> Markup {
    html! {
        style {
            ".code-container {
                background-color: #f5f5f5;
                padding: 10px;
                border-radius: 5px;
                overflow-x: auto;
                font-family: monospace;
                white-space: pre-wrap;
            }"
        }
        div class="code-container" {
            pre { code { (config_json) } }
        }
    }
}

/// Report for one training run: summary, per-round table, one chart per
/// history view and the configuration used.
pub fn training_report(trainer_name: &str, history: &TrainingHistory, config_json: &str) -> Report {
    let mut report = Report::new(
        "pneumo",
        env!("CARGO_PKG_VERSION"),
        None,
        &format!("{} Training Report", trainer_name),
    );

    let mut overview = ReportSection::new("Overview");
    match history.summary() {
        Some(summary) => overview.add_content(summary_table(&summary)),
        None => overview.add_content(html! { p { "No rounds were recorded." } }),
    }
    overview.add_content(history_table(history));
    report.add_section(overview);

    let mut charts = ReportSection::new("Round Metrics");
    for view in HistoryView::ALL {
        charts.add_plot(plot_history(history, view));
    }
    report.add_section(charts);

    let mut config = ReportSection::new("Configuration");
    config.add_content(config_block(config_json));
    report.add_section(config);

    report
}

/// Report for a trainer comparison: the t-test table, per-trial charts and
/// any skipped trials.
pub fn comparison_report(comparison: &ComparisonReport, config_json: &str) -> Report {
    let mut report = Report::new(
        "pneumo",
        env!("CARGO_PKG_VERSION"),
        None,
        &format!("{} vs {} Comparison Report", comparison.trainer_a, comparison.trainer_b),
    );

    let mut overview = ReportSection::new("Paired t-test");
    overview.add_content(html! {
        p {
            (comparison.trials_a.len()) " paired trials; "
            (comparison.trainer_a) " uses " (comparison.average_a.label()) ", "
            (comparison.trainer_b) " uses " (comparison.average_b.label()) "."
        }
        table {
            tr {
                th { "metric" }
                th { "mean " (comparison.trainer_a) }
                th { "mean " (comparison.trainer_b) }
                th { "t-value" }
                th { "p-value" }
            }
            @for c in &comparison.comparisons {
                tr {
                    td { (c.metric.name()) }
                    td { (format!("{:.4}", comparison.mean(Side::A, c.metric).unwrap_or(f64::NAN))) }
                    td { (format!("{:.4}", comparison.mean(Side::B, c.metric).unwrap_or(f64::NAN))) }
                    td { (format!("{:.4}", c.t_value)) }
                    td { (format!("{:.4}", c.p_value)) }
                }
            }
        }
        @if !comparison.failed_trials.is_empty() {
            h3 { "Skipped trials" }
            ul {
                @for f in &comparison.failed_trials {
                    li { "trial " (f.trial) " (" (f.trainer) "): " (f.error) }
                }
            }
        }
    });
    report.add_section(overview);

    let mut charts = ReportSection::new("Per-trial Metrics");
    for metric in Metric::ALL {
        charts.add_plot(plot_trial_comparison(comparison, metric));
    }
    report.add_section(charts);

    let mut config = ReportSection::new("Configuration");
    config.add_content(config_block(config_json));
    report.add_section(config);

    report
}
