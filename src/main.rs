use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use insurance_costs::data::loader;
use insurance_costs::report::{InsuranceReport, ReportKind};

/// Descriptive statistics reports over medical insurance cost records
#[derive(Parser, Debug)]
#[command(name = "insurance-costs", version, about, long_about = None)]
struct Args {
    /// Insurance dataset (.csv, .json or .parquet)
    #[arg(value_name = "FILE", default_value = "insurance.csv")]
    input: PathBuf,

    /// Report to print (can be repeated; default: all, in order)
    #[arg(short, long = "report", value_enum, value_name = "KIND")]
    reports: Vec<ReportKind>,

    /// Number of records shown by the preview report
    #[arg(long, default_value_t = 10)]
    preview_rows: usize,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let dataset = loader::load_file(&args.input)?;
    let mut report = InsuranceReport::new(dataset);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.reports.is_empty() {
        report.run_all(&mut out, args.preview_rows)?;
    } else {
        for &kind in &args.reports {
            report.run(kind, &mut out, args.preview_rows)?;
        }
    }
    out.flush()?;

    Ok(())
}

/// Initialize logging from the verbosity flags; `RUST_LOG` still wins.
fn init_logging(verbose: u8, quiet: bool) {
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
