// Gateway module for server transport - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod http;
mod traits;
mod types;

// Public re-exports - the ONLY way to access transport functionality
pub use http::ServerClient;
#[cfg(test)]
pub use traits::MockAnalysisService;
pub use traits::{AnalysisService, ChannelOpener, PushChannel};
pub use types::{HealthStatus, QueryFilters, StreamRequest};
