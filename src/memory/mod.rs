//! 记忆层：模型上下文（短期）、上下文持久化、记忆提供者（检索注入）

pub mod conversation;
pub mod long_term;
pub mod persistence;

pub use conversation::{
    BufferedContext, ChatContext, ContentPart, ContextState, Image, LlmMessage,
    ToolExecutionResult, UnboundedContext, UserContent,
};
pub use long_term::{ListMemory, MemoryError, MemoryItem, MemoryProvider};
pub use persistence::ContextPersistence;
