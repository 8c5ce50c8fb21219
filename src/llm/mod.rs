//! LLM 层：模型客户端抽象与测试/演示用实现（Mock / Replay）

pub mod mock;
pub mod traits;

pub use mock::{MockLlmClient, RecordedRequest, ReplayChatClient};
pub use traits::{
    ChatCompletionClient, CompletionContent, CreateResult, LlmError, ModelCapabilities,
    RequestUsage, ToolCallRequest, ToolSchema,
};
