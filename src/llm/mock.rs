//! Mock / Replay 模型客户端（用于测试与本地演示，无需 API）
//!
//! - MockLlmClient：有 echo 工具时把最后一条 User 消息转成 echo 工具调用；看到工具结果后回显为文本
//! - ReplayChatClient：按顺序回放预设的 CreateResult，并记录每次请求，便于断言

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::llm::{
    ChatCompletionClient, CreateResult, LlmError, ModelCapabilities, RequestUsage,
    ToolCallRequest, ToolSchema,
};
use crate::memory::LlmMessage;

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl ChatCompletionClient for MockLlmClient {
    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::new(true, false)
    }

    async fn create(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolSchema],
        _cancel: CancellationToken,
    ) -> Result<CreateResult, LlmError> {
        if let Some(LlmMessage::FunctionExecutionResult { content }) = messages.last() {
            let joined = content
                .iter()
                .map(|r| r.content.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Ok(CreateResult::text(format!("Echo from Mock: {}", joined)));
        }

        let last_user = messages
            .iter()
            .rev()
            .find_map(|m| match m {
                LlmMessage::User { content, .. } => Some(content.text()),
                _ => None,
            })
            .unwrap_or_else(|| "(no input)".to_string());
        let usage = RequestUsage::new(messages.len() as u64, 1);

        if tools.iter().any(|t| t.name == "echo") {
            let call = ToolCallRequest::new(
                format!("call_{}", Uuid::new_v4()),
                "echo",
                serde_json::json!({ "text": last_user }).to_string(),
            );
            return Ok(CreateResult::tool_calls(vec![call]).with_usage(usage));
        }

        Ok(CreateResult::text(format!("Echo from Mock: {}", last_user)).with_usage(usage))
    }
}

/// ReplayChatClient 收到的一次请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<LlmMessage>,
    pub tool_names: Vec<String>,
}

/// 回放客户端：按顺序返回预设结果，耗尽后返回 LlmError::Exhausted
pub struct ReplayChatClient {
    capabilities: ModelCapabilities,
    responses: Mutex<VecDeque<CreateResult>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ReplayChatClient {
    pub fn new(responses: Vec<CreateResult>) -> Self {
        Self {
            capabilities: ModelCapabilities::default(),
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// 已收到的全部请求（按调用顺序）
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 剩余未回放的结果数
    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl ChatCompletionClient for ReplayChatClient {
    fn capabilities(&self) -> ModelCapabilities {
        self.capabilities
    }

    async fn create(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolSchema],
        cancel: CancellationToken,
    ) -> Result<CreateResult, LlmError> {
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            });
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or(LlmError::Exhausted)
    }
}
