//! Agent 错误类型
//!
//! 构造期错误（Configuration）与回合期错误（CapabilityMismatch / Llm / Memory / Cancelled）。
//! 单个工具调用的失败不在此列：ToolExecutor 会把它转成结果里的 "Error: ..." 文本。

use thiserror::Error;

use crate::llm::LlmError;
use crate::memory::MemoryError;

/// Agent 构造或回合处理中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 工具名重复、Handoff 名重复或与工具名冲突、模型不支持 function calling 却注册了工具
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 多模态消息交给了不支持 vision 的模型；在写入上下文之前抛出
    #[error("Capability mismatch: {0}")]
    CapabilityMismatch(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Cancelled")]
    Cancelled,

    /// 反思轮（第二次推理）返回了工具调用而不是文本
    #[error("Reflection round requested {0} tool call(s) instead of a text answer")]
    ReflectionRequestedTools(usize),

    #[error("State error: {0}")]
    State(String),

    /// 回合内部 panic（如记忆提供者或模型客户端），由 spawn_turn 捕获
    #[error("Internal error: {0}")]
    Internal(String),
}
