pub mod app;
pub mod cli;
pub mod constants;
pub mod protocol;
pub mod runtime;
pub mod session;
pub mod transport;
pub mod utils;

pub use app::{load_config, Config};
pub use session::{SessionController, SubmitOutcome};
pub use transport::ServerClient;
pub use utils::RaglineError;
