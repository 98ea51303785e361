/// Constants module to avoid magic numbers in the codebase

// Network Configuration
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const ASK_PATH: &str = "/ask";
pub const ANALYZE_PATH: &str = "/analyze";
pub const HEALTH_PATH: &str = "/health";

// Timeouts
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 600; // retrieval + generation can be slow
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 3;

// Stream protocol
pub const DONE_SENTINEL: &str = "[DONE]";
pub const SSE_DATA_FIELD: &str = "data";

/// Shown as the assistant answer when the channel fails before any text arrived
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Connection error. Please check the server and try again.";

// Analysis trigger vocabulary (matched case-insensitively as substrings)
pub const DEFAULT_ANALYSIS_KEYWORDS: &[&str] = &["analyze", "analyse", "weather"];

// Config
pub const APP_NAME: &str = "ragline";
pub const ENV_PREFIX: &str = "RAGLINE_";
pub const LOCAL_CONFIG_PATH: &str = ".ragline/config.toml";
