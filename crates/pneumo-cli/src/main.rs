use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;

use pneumo_cli::commands::compare::{render_comparison, run_compare};
use pneumo_cli::commands::predict::{run_predict, write_predictions};
use pneumo_cli::commands::train::run_train;
use pneumo_cli::config::PipelineConfig;

fn data_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("data")
                .help("Path to the labeled patient table (CSV)")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to a JSON pipeline configuration file")
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("target")
                .short('t')
                .long("target")
                .help("Name of the label column. Overrides the config file.")
                .value_parser(clap::builder::NonEmptyStringValueParser::new()),
        )
        .arg(
            Arg::new("categorical")
                .long("categorical")
                .help("Comma-separated categorical columns. Overrides the config file.")
                .value_parser(clap::builder::NonEmptyStringValueParser::new()),
        )
        .arg(
            Arg::new("drop")
                .long("drop")
                .help("Comma-separated columns to ignore. Overrides the config file.")
                .value_parser(clap::builder::NonEmptyStringValueParser::new()),
        )
        .arg(
            Arg::new("test_fraction")
                .long("test-fraction")
                .help("Fraction of rows held out for evaluation")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Seed for the split, the trainers and the evaluator")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("model_type")
                .long("model-type")
                .help("Override the model type from the JSON config.")
                .value_parser(["random_forest", "gbdt"]),
        )
        .arg(
            Arg::new("rounds")
                .long("rounds")
                .help("Number of resampling rounds")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .long("output-dir")
                .help("Directory the results are written to")
                .default_value(".")
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("no_report")
                .long("no-report")
                .help("Disable HTML report generation.")
                .action(ArgAction::SetTrue),
        )
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("PNEUMO_LOG", "error,pneumo=info"))
        .init();

    let matches = Command::new("pneumo")
        .version(clap::crate_version!())
        .about("Active-learning SMOTE training and comparison for pneumonia risk models")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(data_args(
            Command::new("train").about("Train the active-learning SMOTE classifier and save it"),
        ))
        .subcommand(
            data_args(Command::new("compare").about(
                "Compare the active learner against a one-shot SMOTE baseline over paired trials",
            ))
            .arg(
                Arg::new("trials")
                    .short('n')
                    .long("trials")
                    .help("Number of paired trials (at least 2)")
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                Arg::new("parallel")
                    .long("parallel")
                    .help("Run trials on worker threads")
                    .action(ArgAction::SetTrue),
            ),
        )
        .subcommand(
            Command::new("predict")
                .about("Predict labels and class probabilities with a saved model")
                .arg(
                    Arg::new("model")
                        .help("Path to a model.json written by `train`")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("rows")
                        .help("CSV file of feature rows to score")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("Pipeline configuration used for training (column handling)")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("target")
                        .short('t')
                        .long("target")
                        .help("Label column to skip if present")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("drop")
                        .long("drop")
                        .help("Comma-separated columns to ignore")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help("Path to write predictions (CSV). Defaults to stdout.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .get_matches();

    let result = match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("compare", sub_m)) => handle_compare(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn output_dir(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<PathBuf>("output_dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."))
}

fn required_path(matches: &ArgMatches, id: &str) -> Result<PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .with_context(|| format!("Missing required argument: {}", id))
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let data = required_path(matches, "data")?;
    let config = PipelineConfig::from_arguments(matches)?;
    log::info!("[pneumo::train] Training on {}", data.display());

    let out = run_train(&data, &config, &output_dir(matches), !matches.get_flag("no_report"))?;
    println!(
        "rounds: {}\naccuracy: {:.4}\nweighted precision: {:.4}\nweighted recall: {:.4}\nweighted f1-score: {:.4}",
        out.summary.rounds,
        out.summary.overall_accuracy,
        out.summary.overall_weighted_avg.precision,
        out.summary.overall_weighted_avg.recall,
        out.summary.overall_weighted_avg.f1_score
    );
    log::info!("Model saved to {}", out.model.display());
    log::info!("History saved to {}", out.history.display());
    Ok(())
}

fn handle_compare(matches: &ArgMatches) -> Result<()> {
    let data = required_path(matches, "data")?;
    let config = PipelineConfig::from_arguments(matches)?;
    log::info!(
        "[pneumo::compare] {} trials on {}",
        config.evaluator.num_trials,
        data.display()
    );

    let report = run_compare(&data, &config, &output_dir(matches), !matches.get_flag("no_report"))?;
    print!("{}", render_comparison(&report));
    Ok(())
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let model = required_path(matches, "model")?;
    let rows = required_path(matches, "rows")?;
    let config = PipelineConfig::from_arguments(matches)?;

    let predictions = run_predict(&model, &rows, &config.data)?;
    match matches.get_one::<PathBuf>("output_file") {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            write_predictions(file, &predictions)?;
            log::info!("Predictions written to {}", path.display());
        }
        None => write_predictions(std::io::stdout().lock(), &predictions)?,
    }
    Ok(())
}
