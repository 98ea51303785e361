use anyhow::Result;
use clap::Parser;

use ragline::{cli::Cli, runtime::Orchestrator, utils::init_logger};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_logger(cli.verbose);

    let orchestrator = Orchestrator::new(cli)?;
    let code = orchestrator.run().await?;

    // Exit with appropriate code
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
