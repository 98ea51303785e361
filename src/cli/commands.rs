use anyhow::Result;
use colored::Colorize;

use crate::{app::init_config, app::Config, transport::ServerClient};

use super::Commands;

/// Handle CLI subcommands
///
/// Returns `true` when the command was fully handled and the process should
/// exit, `false` to continue into the chat loop.
pub async fn handle_command(command: &Commands, config: &Config) -> Result<bool> {
    match command {
        Commands::Init => {
            let path = init_config()?;
            println!("Configuration ready at: {}", path.display());
            Ok(true)
        }
        Commands::Version => {
            show_version();
            Ok(true)
        }
        Commands::Status => {
            show_status(config).await?;
            Ok(true)
        }
        Commands::Chat => Ok(false),
    }
}

/// Show version information
pub fn show_version() {
    println!("Ragline v{}", env!("CARGO_PKG_VERSION"));
    println!("   Streaming answers from your documents, in the terminal");
}

/// Show server reachability and credential status
async fn show_status(config: &Config) -> Result<()> {
    println!("Ragline Status:");
    println!();

    let client = ServerClient::new(&config.server.base_url, config.server.request_timeout_secs)?;
    match client.health().await {
        Ok(health) if health.is_ok() => {
            println!(
                "  [OK] Server: {} (version {}, provider {})",
                client.base_url().green(),
                health.version.as_deref().unwrap_or("unknown"),
                health.llm_provider.as_deref().unwrap_or("unknown"),
            );
        }
        Ok(health) => {
            println!(
                "  [WARNING] Server: {} reports status '{}'",
                client.base_url(),
                health.status.yellow()
            );
        }
        Err(e) => {
            println!("  [ERROR] Server: {} unreachable ({})", client.base_url(), e.to_string().red());
        }
    }

    if config.auth.token.is_some() {
        println!("  [OK] Token: Set");
    } else {
        println!("  [WARNING] Token: Not set (use --token or RAGLINE_TOKEN)");
    }

    println!();
    Ok(())
}
