mod cli;
mod logging;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use console::style;
use global_depends::{config, ScanOrchestrator};
use output::{ConsoleSink, JsonLinesSink};
use std::process::ExitCode;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let policy = cli.policy().context("invalid search request")?;
    let client = config::http_client()?;
    let repositories = cli
        .repository_list()
        .build(&client)
        .context("failed to configure repositories")?;

    info!(
        repositories = repositories.len(),
        target = %policy.target(),
        "Repositories configured"
    );

    let target = policy.target().to_string();
    let mut orchestrator =
        ScanOrchestrator::new(repositories, policy).with_config(cli.scan_config());

    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for in-flight fetches");
            stop.stop();
        }
    });

    if cli.json {
        let mut sink = JsonLinesSink::new(std::io::stdout(), target);
        let summary = orchestrator.run(&mut sink).await?;
        sink.write_summary(&summary, true);
    } else {
        let mut sink = ConsoleSink::new(target);
        let summary = orchestrator.run(&mut sink).await?;
        sink.print_summary(&summary);
    }

    Ok(())
}
