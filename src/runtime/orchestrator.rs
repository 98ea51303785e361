use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;
use tracing::warn;

use crate::{
    app::{load_config, load_config_from, Config},
    cli::{handle_command, Cli},
    session::SessionController,
    transport::ServerClient,
};

use super::non_interactive::NonInteractiveRunner;
use super::repl::Repl;

/// Main runtime orchestrator
pub struct Orchestrator {
    cli: Cli,
    config: Config,
}

impl Orchestrator {
    /// Create a new orchestrator from CLI args
    pub fn new(cli: Cli) -> Result<Self> {
        let config = match &cli.config {
            // An explicit file that fails to load is fatal
            Some(path) => load_config_from(path)?,
            None => match load_config() {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("Failed to load config: {:#}. Using defaults.", e);
                    Config::default()
                }
            },
        };

        let config = apply_overrides(config, &cli);
        Ok(Self { cli, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the orchestrator, returning the process exit code
    pub async fn run(self) -> Result<i32> {
        if let Some(command) = &self.cli.command {
            if handle_command(command, &self.config).await? {
                return Ok(0);
            }
        }

        let client = Arc::new(ServerClient::new(
            &self.config.server.base_url,
            self.config.server.request_timeout_secs,
        )?);
        let controller = build_controller(&self.config, client)?;

        if let Some(prompt) = self.cli.prompt.clone() {
            let runner = NonInteractiveRunner::new(controller, &self.config.server.base_url);
            let result = runner.execute(prompt).await;
            println!("{}", runner.format_result(&result, self.cli.output_format));
            return Ok(if result.is_failure() { 1 } else { 0 });
        }

        println!("Connected to {}", self.config.server.base_url.green());
        Repl::new(controller, self.config.ui.clone()).run().await?;
        Ok(0)
    }
}

/// Layer `--server`, `--token` and `--filter-*` over the loaded config
fn apply_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(server) = &cli.server {
        config.server.base_url = server.clone();
    }
    if let Some(token) = &cli.token {
        config.auth.token = Some(token.clone());
    }
    if let Some(source) = &cli.filter_source {
        config.retrieval.source = Some(source.clone());
    }
    if let Some(section) = &cli.filter_section {
        config.retrieval.section = Some(section.clone());
    }
    if let Some(page) = cli.filter_page {
        config.retrieval.page = Some(page);
    }
    config
}

/// Wire a controller to the server using the configured token, filters and
/// analysis keywords
pub fn build_controller(config: &Config, client: Arc<ServerClient>) -> Result<SessionController> {
    let token = match &config.auth.token {
        Some(token) => token.clone(),
        None => {
            warn!("no token configured; the server will likely reject queries");
            String::new()
        }
    };

    Ok(SessionController::new(client.clone(), client, token)
        .with_filters(config.filters())
        .with_trigger(config.analysis_trigger()?))
}
