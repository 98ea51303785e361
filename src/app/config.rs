use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    APP_NAME, DEFAULT_ANALYSIS_KEYWORDS, DEFAULT_SERVER_URL, ENV_PREFIX,
    HTTP_REQUEST_TIMEOUT_SECS, LOCAL_CONFIG_PATH,
};
use crate::session::AnalysisTrigger;
use crate::transport::QueryFilters;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Answering server connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Credentials
    #[serde(default)]
    pub auth: AuthConfig,

    /// Routing of analysis-style queries
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Retrieval filters sent with every streamed query
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Terminal output
    #[serde(default)]
    pub ui: UIConfig,
}

impl Config {
    pub fn filters(&self) -> QueryFilters {
        QueryFilters {
            source: self.retrieval.source.clone(),
            section: self.retrieval.section.clone(),
            page: self.retrieval.page,
        }
    }

    pub fn analysis_trigger(&self) -> Result<AnalysisTrigger> {
        AnalysisTrigger::from_keywords(&self.analysis.keywords)
            .context("Invalid analysis keyword list")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. http://127.0.0.1:8000
    pub base_url: String,
    /// Upper bound for a whole exchange, streaming included
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_secs: HTTP_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token issued by the server's login endpoint
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Queries containing any of these (case-insensitive) skip streaming
    pub keywords: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_ANALYSIS_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub source: Option<String>,
    pub section: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIConfig {
    pub show_citations: bool,
    pub show_memory_notices: bool,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            show_citations: true,
            show_memory_notices: true,
        }
    }
}

fn base_figment() -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
}

fn with_env(figment: Figment) -> Figment {
    // RAGLINE_SERVER__BASE_URL -> server.base_url
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load configuration from multiple sources
///
/// Defaults, then the global file, then `.ragline/config.toml`, then
/// `RAGLINE_*` environment variables.
pub fn load_config() -> Result<Config> {
    let global_config = get_config_dir()?.join("config.toml");
    let local_config = PathBuf::from(LOCAL_CONFIG_PATH);

    let mut figment = base_figment();

    if global_config.exists() {
        figment = figment.merge(Toml::file(&global_config));
    }

    if local_config.exists() {
        figment = figment.merge(Toml::file(&local_config));
    }

    with_env(figment)
        .extract()
        .context("Failed to load configuration")
}

/// Load configuration from an explicit file instead of the usual locations
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    with_env(base_figment().merge(Toml::file(path)))
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
        Ok(proj_dirs.config_dir().to_path_buf())
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        Ok(PathBuf::from(home).join(".config").join(APP_NAME))
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist
///
/// Returns the path of the global config file.
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join("config.toml");

    if !config_file.exists() {
        save_config(&Config::default(), Some(config_file.clone()))?;
        tracing::info!(path = %config_file.display(), "created default configuration");
    }

    Ok(config_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.base_url, DEFAULT_SERVER_URL);
        assert_eq!(config.auth.token, None);
        assert!(config.analysis.keywords.contains(&"weather".to_string()));
        assert_eq!(config.filters(), QueryFilters::default());
        assert!(config.ui.show_citations);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
base_url = "http://rag.internal:9000"

[auth]
token = "abc"

[retrieval]
source = "handbook.pdf"
page = 12

[analysis]
keywords = ["forecast"]
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.server.base_url, "http://rag.internal:9000");
        // untouched keys keep their defaults
        assert_eq!(config.server.request_timeout_secs, HTTP_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.auth.token.as_deref(), Some("abc"));
        assert_eq!(
            config.filters(),
            QueryFilters {
                source: Some("handbook.pdf".to_string()),
                section: None,
                page: Some(12),
            }
        );

        let trigger = config.analysis_trigger().unwrap();
        assert!(trigger.matches("Forecast for tomorrow"));
        assert!(!trigger.matches("analyze this"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_config_from(&temp_dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sub").join("config.toml");

        let mut config = Config::default();
        config.ui.show_memory_notices = false;
        config.retrieval.section = Some("Pricing".to_string());
        save_config(&config, Some(path.clone())).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), config);
    }
}
