use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;

use medreport_lib::{config, Catalog, ExportOptions, FormShell, PatientForm, PreviewStatus};

/// Terminal stand-in for the report form: fill the fields, press
/// "Generate", optionally "Save as PDF".
#[derive(Debug, Parser)]
#[command(name = "medreport", version, about = "Generate a synthetic specimen lab report")]
struct Cli {
    /// Patient name
    #[arg(long, default_value = "")]
    name: String,

    /// Patient age in years
    #[arg(long, default_value = "")]
    age: String,

    /// Male or Female
    #[arg(long, default_value = "")]
    gender: String,

    /// Test panel key or label (see --list-tests)
    #[arg(long, default_value = "")]
    test: String,

    /// Bed rest days; blank means "Not specified"
    #[arg(long, default_value = "")]
    rest_days: String,

    /// Catalog JSON replacing the built-in reference data
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Print the composed record as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Save the report as PDF after generating it
    #[arg(long)]
    pdf: bool,

    /// Directory for the PDF
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Do not open the PDF in the system viewer
    #[arg(long)]
    no_open: bool,

    /// List available test panels and exit
    #[arg(long)]
    list_tests: bool,
}

fn main() -> ExitCode {
    medreport_lib::init_tracing();
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let cli = Cli::parse();

    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path),
        None => Catalog::builtin(),
    };
    let catalog = match catalog {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.list_tests {
        for panel in catalog.panels() {
            println!("{:<12} {}", panel.key, panel.label);
        }
        return ExitCode::SUCCESS;
    }

    let mut shell = match cli.seed {
        Some(seed) => FormShell::seeded(catalog, seed),
        None => FormShell::new(catalog),
    };

    let form = PatientForm {
        name: cli.name,
        age: cli.age,
        gender: cli.gender,
        test: cli.test,
        rest_days: cli.rest_days,
    };

    let text = match shell.generate(&form, Local::now().naive_local()) {
        Ok(text) => text.to_string(),
        Err(msg) => {
            eprintln!("Error: {msg}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        let Some(record) = shell.last_record() else {
            return ExitCode::FAILURE;
        };
        match serde_json::to_string_pretty(record) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{text}");
    }

    if cli.pdf {
        let options = ExportOptions {
            out_dir: cli.out_dir,
            open_preview: !cli.no_open,
        };
        match shell.save_as_pdf(&options) {
            Ok(outcome) => {
                eprintln!("Report saved as {}", outcome.path.display());
                if let PreviewStatus::Failed(reason) = outcome.preview {
                    eprintln!("Warning: could not open preview: {reason}");
                }
            }
            Err(msg) => {
                eprintln!("Error: {msg}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
