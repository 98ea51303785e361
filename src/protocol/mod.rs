// Gateway module for the stream protocol - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod frame;
mod sse;

// Public re-exports - the ONLY way to access protocol functionality
pub use frame::{decode, Citation, Decoded, MemoryUpdate, Message};
pub use sse::SseDecoder;
