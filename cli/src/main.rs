use std::io;

use clap::Parser;
use stepgauge_cli::{AppConfig, Cli, commands};
use stepgauge_core::init_tracing_with_options;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| config.paths.logs_dir.clone());
    let _telemetry = init_tracing_with_options(
        &log_dir,
        &config.diagnostics.trace_file_prefix,
        &config.diagnostics.rust_log_filter,
    )?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::run(cli.command, &config, &mut out)
}
