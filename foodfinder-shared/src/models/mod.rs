pub mod chat;

pub use chat::{ChatErrorResponse, ChatMessage, ChatReply, ChatRequest, ChatRole};
