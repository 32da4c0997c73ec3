//! tst-runner CLI entry point

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tst_runner::config::{env, ConfigLoader};
use tst_runner::scheduler::LogObserver;
use tst_runner::{OutputFormat, TestEngineBuilder};

#[derive(Parser, Debug)]
#[command(name = "tst-runner", version, about = "Run declarative tests against student programs")]
struct Cli {
    /// Files to test. One name that is not a file is used as a substring
    /// pattern; no name tests every file in the current directory.
    filenames: Vec<String>,

    /// Comma-separated glob patterns naming test files
    #[arg(short = 't', long, value_delimiter = ',')]
    test_files: Option<Vec<String>>,

    /// Per-run timeout in seconds
    #[arg(short = 'T', long)]
    timeout: Option<u64>,

    /// Show failed test details and output diffs (single subject only)
    #[arg(short, long)]
    diff: bool,

    /// Report format: summary, passed, failed or json
    #[arg(short = 'f', long)]
    output_format: Option<OutputFormat>,

    /// Extra configuration file layered over tst.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log each test run
    #[arg(short, long)]
    verbose: bool,

    /// Show a progress bar
    #[cfg(feature = "progress")]
    #[arg(long)]
    progress: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match try_main(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("tst-runner: {err}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("TST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .try_init();
}

fn try_main(cli: Cli) -> tst_runner::Result<bool> {
    let mut loader = ConfigLoader::new();
    if let Some(ref path) = cli.config {
        loader = loader.config_file(path);
    }
    let mut config = loader.load()?;

    if let Some(timeout) = cli.timeout {
        config.run.timeout = timeout;
    }
    if let Some(format) = cli.output_format {
        config.report.format = format;
    }
    config.report.diff |= cli.diff;
    config.verbose |= cli.verbose;

    init_logging(config.verbose);
    for (key, value) in env::detect_active_overrides() {
        tracing::debug!("{key}={value} overrides configuration");
    }

    let verbose = config.verbose;
    let mut builder = TestEngineBuilder::new()
        .with_config(config)
        .subjects(cli.filenames);
    if let Some(patterns) = cli.test_files {
        builder = builder.test_files(patterns);
    }

    #[cfg(feature = "progress")]
    if cli.progress {
        builder = builder.observer(tst_runner::scheduler::ProgressObserver::new());
    }
    if verbose {
        builder = builder.observer(LogObserver::default());
    }

    let engine = builder.build()?;
    let report = engine.run();
    print!("{}", report.render()?);
    Ok(report.all_passed())
}
