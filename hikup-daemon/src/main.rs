use anyhow::Result;
use clap::Parser;

use hikup_daemon::cli::DaemonCli;
use hikup_daemon::logging;
use hikup_daemon::orchestrator::{self, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = orchestrator::load_config(cli.daemon_config.as_deref()).await?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid command-line override: {}", e))?;

    logging::init_tracing(&config.general)?;

    let options = cli.run_options();

    if cli.validate {
        orchestrator::validate(&config, &options)?;
        println!("configuration OK");
        return Ok(());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hikup starting");

    let mut orchestrator = Orchestrator::build(config, options)?;

    if cli.once {
        let report = orchestrator.run_once().await?;
        if report.failed() > 0 {
            return Err(anyhow::anyhow!(
                "{} of {} selected containers failed to update",
                report.failed(),
                report.selected
            ));
        }
        return Ok(());
    }

    orchestrator.run().await?;
    tracing::info!("hikup shut down");
    Ok(())
}
