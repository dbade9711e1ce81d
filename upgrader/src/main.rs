//! swupgrade - Entry Point
//!
//! Upgrades the software of one network device over ssh and reboots it when
//! the install is confirmed.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing::info;

use swupgrade::app::options::Cli;
use swupgrade::app::run::run;
use swupgrade::app::settings::Settings;
use swupgrade::device::ssh::SshTransport;
use swupgrade::logs::{init_logging, RunLogger};
use swupgrade::utils::{generate_run_id, version_info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_cli(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", "[ERROR]".red(), e);
            ExitCode::from(1)
        }
    }
}

async fn run_cli(cli: Cli) -> anyhow::Result<u8> {
    let settings = Settings::load(cli.config.as_deref())
        .await
        .context("Unable to load settings")?;

    let log_options = cli.log_options(&settings);
    let log_file = log_options.log_file.clone();
    let _log_guard = init_logging(log_options).context("Failed to initialize logging")?;
    if let Some(path) = &log_file {
        println!("Information logged in {}", path.display());
    }

    let version = version_info();
    info!("swupgrade {} ({})", version.version, version.git_hash);

    let request = cli.request(&settings);
    let transport = SshTransport::new(cli.ssh_options(&settings));
    let mut logger = RunLogger::new(&request.device, generate_run_id());

    let summary = match run(&request, Box::new(transport), &mut logger).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red(), e);
            return Ok(1);
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if summary.summary.is_success() {
        println!("{} {}", "[SUCCESS]".green(), summary);
    } else {
        eprintln!("{} {}", "[FAILED]".red(), summary);
    }

    Ok(summary.exit_code())
}
