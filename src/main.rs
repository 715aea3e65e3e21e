//! symprobe - Symfony web profiler prober.
//!
//! CLI entry point.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use symprobe::modules::{self, info, logs, sources};
use symprobe::{
    Commands, Config, ConsoleOutput, GetConfig, HttpTransport, ScanConfig, ScanContext, ScanError,
    Scanner,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Set up logging
    let filter = if config.verbose {
        EnvFilter::new("symprobe=debug")
    } else {
        EnvFilter::new("symprobe=info")
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!config.no_colors);
    if config.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }

    let run = async {
        match config.command.clone() {
            Commands::Scan(scan_config) => {
                let modules = modules::registry(&scan_config.module_options());
                run_scan(scan_config, modules, &config).await
            }
            Commands::Sources(scan_config) => {
                let modules =
                    modules::select(&scan_config.module_options(), &[info::NAME, sources::NAME]);
                run_scan(scan_config, modules, &config).await
            }
            Commands::Creds(scan_config) => {
                let modules =
                    modules::select(&scan_config.module_options(), &[info::NAME, logs::NAME]);
                run_scan(scan_config, modules, &config).await
            }
            Commands::Get(get_config) => run_get(get_config).await,
        }
    };

    // Dropping the scan aborts its workers.
    tokio::select! {
        result = run => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            error!("Interrupted");
            ExitCode::FAILURE
        }
    }
}

async fn run_scan(
    scan_config: ScanConfig,
    modules: Vec<Box<dyn modules::Module>>,
    global_config: &Config,
) -> Result<(), ScanError> {
    if let Some(ref dir) = scan_config.output {
        prepare_output(dir)?;
    }

    let console = ConsoleOutput::new(scan_config.json, !global_config.no_colors);
    console.print_banner();

    let http = scan_config.target.http_config()?;
    let scanner = Scanner::new(&http, modules)?
        .with_threads(scan_config.threads)
        .with_heartbeat(scan_config.heartbeat())
        .with_output(scan_config.output.clone());

    let report = scanner.scan(&scan_config.target.normalized_url()?).await?;
    console.print_summary(&report)
}

async fn run_get(get_config: GetConfig) -> Result<(), ScanError> {
    let http = get_config.target.http_config()?;
    let transport = Arc::new(HttpTransport::new(&http)?);
    let mut ctx = ScanContext::new(&get_config.target.normalized_url()?, transport);

    match symprobe::profiler::open(&mut ctx, &get_config.path).await? {
        Some(content) => println!("{}", content),
        None => error!("Not found"),
    }
    Ok(())
}

/// The output directory must be empty; it is created `0o700` when missing.
fn prepare_output(dir: &Path) -> Result<(), ScanError> {
    if dir.exists() {
        let mut entries = std::fs::read_dir(dir)?;
        if entries.next().is_some() {
            return Err(ScanError::ConfigError(format!(
                "output directory {} is not empty",
                dir.display()
            )));
        }
    } else {
        symprobe::scanner::create_dir(dir, 0o700)?;
        info!("Created {}", dir.display());
    }
    Ok(())
}
