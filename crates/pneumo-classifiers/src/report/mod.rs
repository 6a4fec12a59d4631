//! Reporting helpers: Plotly charts of per-round and per-trial metrics and a
//! the training and comparison HTML reports built with `report-builder`.
pub mod plots;
pub mod report;

pub use plots::{plot_history, plot_trial_comparison, HistoryView};
pub use report::{comparison_report, save_report, training_report, Report, ReportSection};
