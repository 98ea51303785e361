/// Runtime orchestrator module - Gateway

mod non_interactive;
mod orchestrator;
mod repl;

pub use non_interactive::{
    describe_citation, format_result, ExecutionMetadata, NonInteractiveResult,
    NonInteractiveRunner,
};
pub use orchestrator::{build_controller, Orchestrator};
pub use repl::{Repl, ReplInput};
