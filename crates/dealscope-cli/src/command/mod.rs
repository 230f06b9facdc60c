use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dealscope_engine::preprocess::{
    self, MissingPolicy, NormalizationMethod, OutlierPolicy, PreprocessConfig, Preprocessed, Target,
};

use crate::util::{self, DimensionArg};

use self::{
    cluster::ClusterArg, fit_regression::FitRegressionArg, formula::FormulaArg,
    generate_records::GenerateRecordsArg, lookup::LookupArg, predict::PredictArg, serve::ServeArg,
    train::TrainArg,
};

mod cluster;
mod fit_regression;
mod formula;
mod generate_records;
mod lookup;
mod predict;
mod serve;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Fit a linear regression with inferential statistics
    FitRegression(#[clap(flatten)] FitRegressionArg),
    /// Train a logistic win-probability model
    Train(#[clap(flatten)] TrainArg),
    /// Score records with a trained model
    Predict(#[clap(flatten)] PredictArg),
    /// Group records with k-means
    Cluster(#[clap(flatten)] ClusterArg),
    /// Build a win-rate lookup table
    Lookup(#[clap(flatten)] LookupArg),
    /// Render a trained model as a formula
    Formula(#[clap(flatten)] FormulaArg),
    /// Answer JSON-lines requests from stdin
    Serve(#[clap(flatten)] ServeArg),
    /// Generate synthetic opportunity records
    GenerateRecords(#[clap(flatten)] GenerateRecordsArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::FitRegression(arg) => fit_regression::run(&arg)?,
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Predict(arg) => predict::run(&arg)?,
        Mode::Cluster(arg) => cluster::run(&arg)?,
        Mode::Lookup(arg) => lookup::run(&arg)?,
        Mode::Formula(arg) => formula::run(&arg)?,
        Mode::Serve(arg) => serve::run(&arg)?,
        Mode::GenerateRecords(arg) => generate_records::run(&arg)?,
    }
    Ok(())
}

/// Input records and the dimensions to analyze.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RecordsArg {
    /// Records JSON file
    #[arg(long)]
    input: PathBuf,
    /// Dimension to analyze, as `name` or `name:categorical` (repeatable)
    #[arg(long = "dimension", short = 'd', required = true)]
    dimensions: Vec<DimensionArg>,
}

/// How records become a feature matrix.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PreprocessArg {
    /// Missing values: impute or drop
    #[arg(long, default_value = "impute", value_parser = util::parse_enum::<MissingPolicy>)]
    missing: MissingPolicy,
    /// Outliers beyond the Tukey fences: cap, remove or keep
    #[arg(long, default_value = "cap", value_parser = util::parse_enum::<OutlierPolicy>)]
    outliers: OutlierPolicy,
    /// Column scaling: none, z-score or min-max
    #[arg(long, value_parser = util::parse_enum::<NormalizationMethod>)]
    normalization: Option<NormalizationMethod>,
}

impl PreprocessArg {
    fn config(&self, default_normalization: NormalizationMethod) -> PreprocessConfig {
        PreprocessConfig {
            missing: self.missing,
            outliers: self.outliers,
            normalization: self.normalization.unwrap_or(default_normalization),
            ..PreprocessConfig::default()
        }
    }
}

/// Loads the records and runs them through the preprocessor, reporting on stderr.
fn load_matrix(
    records: &RecordsArg,
    preprocess_arg: &PreprocessArg,
    target: &Target,
    default_normalization: NormalizationMethod,
) -> anyhow::Result<Preprocessed> {
    let RecordsArg { input, dimensions } = records;
    eprintln!("Loading records from {}...", input.display());
    let records = util::read_records_file(input)?;
    eprintln!("Loaded {} records", records.len());

    let dimensions = util::dimensions(dimensions);
    let config = preprocess_arg.config(default_normalization);
    let preprocessed = preprocess::preprocess(&records, &dimensions, target, &config)?;
    eprintln!(
        "Preprocessed {} rows x {} dimensions ({} dropped)",
        preprocessed.matrix.len(),
        preprocessed.matrix.dimensions().len(),
        preprocessed.dropped
    );
    util::report_warnings(&preprocessed.warnings);
    Ok(preprocessed)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_command_definition() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_shared_args() {
        let args = CommandArgs::try_parse_from([
            "dealscope",
            "train",
            "--input",
            "records.json",
            "-d",
            "amount",
            "-d",
            "segment:categorical",
            "--missing",
            "drop",
            "--balance",
            "oversample",
        ])
        .unwrap();
        assert!(matches!(args.mode, Mode::Train(_)));
    }

    #[test]
    fn test_enum_values_accept_json_spelling() {
        for spelling in ["z-score", "zscore", "ZScore"] {
            let args = CommandArgs::try_parse_from([
                "dealscope",
                "cluster",
                "--input",
                "records.json",
                "-d",
                "amount",
                "-k",
                "3",
                "--normalization",
                spelling,
            ]);
            assert!(args.is_ok(), "{spelling}");
        }
        assert!(
            CommandArgs::try_parse_from([
                "dealscope",
                "fit-regression",
                "--input",
                "records.json",
                "-d",
                "amount",
                "--impact",
                "std-dev-scaled-all",
            ])
            .is_ok()
        );
        assert!(
            CommandArgs::try_parse_from([
                "dealscope",
                "train",
                "--input",
                "records.json",
                "-d",
                "amount",
                "--normalization",
                "log",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_dimension_is_required() {
        assert!(
            CommandArgs::try_parse_from(["dealscope", "lookup", "--input", "records.json"]).is_err()
        );
    }

    #[test]
    fn test_preprocess_config_defaults() {
        let arg = PreprocessArg {
            missing: MissingPolicy::Drop,
            outliers: OutlierPolicy::Keep,
            normalization: None,
        };
        let config = arg.config(NormalizationMethod::ZScore);
        assert_eq!(config.missing, MissingPolicy::Drop);
        assert_eq!(config.outliers, OutlierPolicy::Keep);
        assert_eq!(config.normalization, NormalizationMethod::ZScore);
        assert!(config.defaults.is_empty());
    }
}
