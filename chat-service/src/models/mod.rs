//! Domain models for the chat service.

pub mod chat;
pub mod generation;

pub use chat::{ChatRequest, ChatResponse, HistoryEntry, StatusResponse};
pub use generation::{
    AttemptOutcome, ChatMessage, ErrorKind, GenerationAttempt, GenerationOutcome,
    GenerationRequest, Role,
};
