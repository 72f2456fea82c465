use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use env_logger::{Builder, Env};
use log::{debug, error, info, LevelFilter};

use kidney_data_engineering::config::Config;
use kidney_data_engineering::io::TableFormat;
use kidney_data_engineering::monitor::RunStats;
use kidney_data_engineering::pipeline::{correlation_file, inspect_file, run_clean};
use kidney_data_engineering::schema::SchemaContract;
use kidney_data_engineering::train::{
    load_training_set, model_path, save_model, train_and_evaluate, write_report,
};
use kidney_data_engineering::Result;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Clean, encode and model the chronic kidney disease dataset", long_about = None)]
#[clap(propagate_version = true)]
struct KidneyArgs {
    #[clap(short, long, action = ArgAction::Count, global = true, help = "Verbose level")]
    verbose: u8,
    #[clap(short, long, global = true, help = "TOML configuration file")]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report shape, missing values and value ranges of a raw file
    Inspect {
        input: PathBuf,
        #[clap(long, help = "Also write the report as JSON")]
        json: Option<PathBuf>,
        #[clap(long, value_name = "THRESHOLD", help = "List column pairs correlated at least this strongly")]
        correlations: Option<f64>,
    },
    /// Normalize, impute, encode and prune a raw file
    Clean {
        input: PathBuf,
        output: PathBuf,
        #[clap(short, long, value_enum, help = "Output format, inferred from the extension by default")]
        format: Option<WriteFormat>,
    },
    /// Train and compare classifiers on a cleaned file
    Train {
        cleaned: PathBuf,
        #[clap(long, help = "Write per-model scores as CSV")]
        report: Option<PathBuf>,
        #[clap(long, help = "Where to save the best model, beside the report by default")]
        model: Option<PathBuf>,
    },
    /// Clean, then train on the result
    Run {
        input: PathBuf,
        output: PathBuf,
        #[clap(short, long, value_enum)]
        format: Option<WriteFormat>,
        #[clap(long)]
        report: Option<PathBuf>,
        #[clap(long)]
        model: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WriteFormat {
    Csv,
    Parquet,
}

fn main() {
    let cli = KidneyArgs::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let env = Env::new().filter("KIDNEY_LOG");
    Builder::new()
        .filter(Some("kidney_data_engineering"), log_level)
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", cli);

    if let Err(e) = kidney_app(cli) {
        error!("{}", e);
        process::exit(1);
    }
}

fn kidney_app(cli: KidneyArgs) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    debug!("Configuration {:#?}", config);

    match cli.command {
        Command::Inspect {
            input,
            json,
            correlations,
        } => {
            let stats = RunStats::start("inspect");
            let report = inspect_file(&input, &config.cleaning)?;
            if let Some(path) = json {
                serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &report)?;
                info!("inspection written to {:?}", path);
            }
            if let Some(threshold) = correlations {
                correlation_file(&input, &config.cleaning, threshold)?;
            }
            stats.finish();
        }
        Command::Clean {
            input,
            output,
            format,
        } => {
            let stats = RunStats::start("clean");
            let format = output_format(format, &output)?;
            run_clean(&input, &output, format, &config.cleaning)?;
            stats.finish();
        }
        Command::Train {
            cleaned,
            report,
            model,
        } => {
            let stats = RunStats::start("train");
            train(&cleaned, report.as_deref(), model.as_deref(), &config)?;
            stats.finish();
        }
        Command::Run {
            input,
            output,
            format,
            report,
            model,
        } => {
            let stats = RunStats::start("run");
            let format = output_format(format, &output)?;
            run_clean(&input, &output, format, &config.cleaning)?;
            train(&output, report.as_deref(), model.as_deref(), &config)?;
            stats.finish();
        }
    }
    Ok(())
}

// if the output format is not given, it follows the output extension
fn output_format(format: Option<WriteFormat>, output: &Path) -> Result<TableFormat> {
    match format {
        Some(WriteFormat::Csv) => Ok(TableFormat::Csv),
        Some(WriteFormat::Parquet) => Ok(TableFormat::Parquet),
        None => TableFormat::from_path(output),
    }
}

fn train(cleaned: &Path, report_path: Option<&Path>, model_file: Option<&Path>, config: &Config) -> Result<()> {
    let contract = SchemaContract::read(SchemaContract::path_for(cleaned))?;
    let set = load_training_set(cleaned, &contract, &config.training)?;
    let report = train_and_evaluate(&set, &config.training)?;

    if let Some(path) = report_path {
        write_report(path, &report)?;
        info!("scores written to {:?}", path);
    }

    if let Some(best) = report.best() {
        info!(
            "best model: {} with accuracy {:.4} and f1-score {:.4}",
            best.model, best.accuracy, best.f1_score
        );
        // saved beside the report, or beside the cleaned table without one
        let path = match model_file {
            Some(path) => path.to_path_buf(),
            None => {
                let anchor = report_path.unwrap_or(cleaned);
                model_path(anchor.parent().unwrap_or_else(|| Path::new(".")), &best.model)
            }
        };
        save_model(&path, best, &set.feature_names)?;
        info!("model saved to {:?}", path);
    }
    Ok(())
}
