use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ragline")]
#[command(version)]
#[command(about = "Ask questions of your documents over a streaming answer server", long_about = None)]
pub struct Cli {
    /// Server base URL (overrides config)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Bearer token for the server
    #[arg(short, long, env = "RAGLINE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Restrict retrieval to one source document
    #[arg(long)]
    pub filter_source: Option<String>,

    /// Restrict retrieval to one section
    #[arg(long)]
    pub filter_section: Option<String>,

    /// Restrict retrieval to one page
    #[arg(long)]
    pub filter_page: Option<i64>,

    /// Non-interactive query to execute
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Output format for non-interactive mode
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, requires = "prompt")]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Initialize configuration
    Init,
    /// Start an interactive chat (default)
    Chat,
    /// Check that the server is reachable
    Status,
    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
    /// Markdown formatted output
    Markdown,
}
