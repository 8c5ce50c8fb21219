//! 模型客户端抽象
//!
//! 所有后端实现 ChatCompletionClient：声明能力标记（function calling / vision），
//! create 接收完整上下文与工具 schema，返回文本或工具调用列表。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::memory::LlmMessage;

/// 模型调用错误（网络、限流、响应不合法等），Agent 不做重试，直接上抛
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// 脚本化客户端已没有可回放的结果
    #[error("No more scripted responses")]
    Exhausted,

    #[error("Request cancelled")]
    Cancelled,
}

/// 模型能力标记：决定哪些代码路径合法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// 是否支持工具调用（注册工具或 Handoff 的前提）
    pub function_calling: bool,
    /// 是否支持图片输入（多模态消息的前提）
    pub vision: bool,
}

impl ModelCapabilities {
    pub fn new(function_calling: bool, vision: bool) -> Self {
        Self {
            function_calling,
            vision,
        }
    }

    /// 纯文本模型：不支持工具与图片
    pub fn text_only() -> Self {
        Self::new(false, false)
    }
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self::new(true, false)
    }
}

/// 单次推理的 token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl RequestUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// 模型请求的一次工具调用；arguments 为 JSON 字符串，执行前才解析
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// 推理结果内容：文本（回合结束）或非空工具调用列表（进入工具执行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionContent {
    Text(String),
    ToolCalls(Vec<ToolCallRequest>),
}

/// create 的返回值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResult {
    pub content: CompletionContent,
    pub usage: RequestUsage,
}

impl CreateResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: CompletionContent::Text(content.into()),
            usage: RequestUsage::default(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: CompletionContent::ToolCalls(calls),
            usage: RequestUsage::default(),
        }
    }

    pub fn with_usage(mut self, usage: RequestUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// 发给模型的工具描述（名称、说明、参数 JSON Schema）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// 模型客户端 trait
#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    /// 模型声明的能力
    fn capabilities(&self) -> ModelCapabilities;

    /// 一次推理；tools 为空表示本轮不允许工具调用
    async fn create(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolSchema],
        cancel: CancellationToken,
    ) -> Result<CreateResult, LlmError>;
}
