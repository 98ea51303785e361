/// Session management module - Gateway

mod accumulator;
mod controller;
mod conversation;
mod state;
mod trigger;

pub use accumulator::AnswerAccumulator;
pub use controller::{
    AnswerPath, MemoryCallback, NoticeCallback, RejectReason, SessionController,
    SessionObservers, StreamCallback, SubmitOutcome,
};
pub use conversation::{ConversationEntry, ConversationLog, Role, Transcript};
pub use state::{transition, ChannelEvent, Effect, FinalAnswer, Phase, Session, Termination};
pub use trigger::AnalysisTrigger;
