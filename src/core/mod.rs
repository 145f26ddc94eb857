//! Core generation components
//!
//! Prompt assembly, the streaming relay, and chat persistence.

mod prompt;
mod relay;
mod store;

pub use prompt::{GenerationRequest, ValidationError};
pub use relay::{record_reply, RelayStream, FALLBACK_REPLY};
pub use store::{Conversations, SqliteChatStore, StoreError};
