//! 回合状态机
//!
//! AwaitingInference → Terminated(Text) | ToolCallsIssued
//! ToolCallsIssued → Terminated(Handoff) | ReflectionPending | Terminated(ToolCallSummary)
//! ReflectionPending → Terminated(Text)
//!
//! 挂起点只有：记忆提供者 update_context、每次推理、工具执行汇合。

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentEvent, AssistantAgent, ChatMessage, Diagnostic, Response};
use crate::core::AgentError;
use crate::llm::{CompletionContent, CreateResult, LlmError, RequestUsage, ToolCallRequest};
use crate::memory::{LlmMessage, ToolExecutionResult};
use crate::tools::detect_handoff;

enum TurnState {
    AwaitingInference,
    ToolCallsIssued {
        calls: Vec<ToolCallRequest>,
        usage: RequestUsage,
    },
    ReflectionPending,
    Terminated(ChatMessage),
}

/// 本回合内部事件：按顺序累积，并在产生时推送给可选的监听端
struct InnerEvents<'a> {
    events: Vec<AgentEvent>,
    tx: Option<&'a mpsc::UnboundedSender<AgentEvent>>,
}

impl<'a> InnerEvents<'a> {
    fn new(tx: Option<&'a mpsc::UnboundedSender<AgentEvent>>) -> Self {
        Self {
            events: Vec::new(),
            tx,
        }
    }

    fn emit(&mut self, event: AgentEvent) {
        tracing::debug!(event = ?event, "agent event");
        if let Some(tx) = self.tx {
            let _ = tx.send(event.clone());
        }
        self.events.push(event);
    }
}

impl AssistantAgent {
    pub(crate) async fn run_turn(
        &mut self,
        messages: Vec<ChatMessage>,
        cancel: CancellationToken,
        event_tx: Option<&mpsc::UnboundedSender<AgentEvent>>,
    ) -> Result<Response, AgentError> {
        self.ingest(messages)?;

        let mut inner = InnerEvents::new(event_tx);
        self.augment_context(&mut inner).await?;

        let mut state = TurnState::AwaitingInference;
        loop {
            state = match state {
                TurnState::AwaitingInference => {
                    let result = self.infer(true, &cancel).await?;
                    match result.content {
                        CompletionContent::Text(text) => {
                            TurnState::Terminated(self.text_message(text, result.usage))
                        }
                        CompletionContent::ToolCalls(calls) => TurnState::ToolCallsIssued {
                            calls,
                            usage: result.usage,
                        },
                    }
                }
                TurnState::ToolCallsIssued { calls, usage } => {
                    inner.emit(AgentEvent::ToolCallRequest {
                        content: calls.clone(),
                        source: self.name.clone(),
                        usage: Some(usage),
                    });

                    let results = self.executor.execute_all(&calls, &cancel).await;
                    self.context.add_message(LlmMessage::FunctionExecutionResult {
                        content: results.clone(),
                    });
                    inner.emit(AgentEvent::ToolCallExecution {
                        content: results.clone(),
                        source: self.name.clone(),
                    });

                    self.after_tool_execution(&calls, &results)
                }
                TurnState::ReflectionPending => {
                    let result = self.infer(false, &cancel).await?;
                    match result.content {
                        CompletionContent::Text(text) => {
                            TurnState::Terminated(self.text_message(text, result.usage))
                        }
                        CompletionContent::ToolCalls(calls) => {
                            return Err(AgentError::ReflectionRequestedTools(calls.len()));
                        }
                    }
                }
                TurnState::Terminated(chat_message) => {
                    return Ok(Response {
                        chat_message,
                        inner_messages: inner.events,
                    });
                }
            };
        }
    }

    /// 先整体校验再写入：任一多模态消息遇到无 vision 的模型即失败，上下文不变
    fn ingest(&mut self, messages: Vec<ChatMessage>) -> Result<(), AgentError> {
        if !self.client.capabilities().vision
            && messages
                .iter()
                .any(|m| matches!(m, ChatMessage::MultiModal { .. }))
        {
            return Err(AgentError::CapabilityMismatch(
                "The model does not support vision.".to_string(),
            ));
        }
        for message in messages {
            self.context.add_message(message.into_llm_message());
        }
        Ok(())
    }

    /// 按注册顺序调用记忆提供者；失败直接上抛
    async fn augment_context(&mut self, inner: &mut InnerEvents<'_>) -> Result<(), AgentError> {
        for provider in &self.memory {
            let items = provider.update_context(self.context.as_mut()).await?;
            if !items.is_empty() {
                tracing::debug!(provider = provider.name(), count = items.len(), "memory injected");
                inner.emit(AgentEvent::MemoryQuery {
                    content: items,
                    source: self.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// 一次推理；结果（文本或工具调用）先写入上下文再返回
    async fn infer(
        &mut self,
        with_tools: bool,
        cancel: &CancellationToken,
    ) -> Result<CreateResult, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let mut messages = self.system_messages.clone();
        messages.extend(self.context.llm_messages());
        let tools = if with_tools {
            self.executor.registry().schemas()
        } else {
            Vec::new()
        };

        let result = self
            .client
            .create(&messages, &tools, cancel.clone())
            .await
            .map_err(|e| match e {
                LlmError::Cancelled => AgentError::Cancelled,
                other => AgentError::Llm(other),
            })?;
        if matches!(&result.content, CompletionContent::ToolCalls(calls) if calls.is_empty()) {
            return Err(LlmError::InvalidResponse("empty tool call list".to_string()).into());
        }
        tracing::debug!(
            prompt_tokens = result.usage.prompt_tokens,
            completion_tokens = result.usage.completion_tokens,
            "inference done"
        );

        self.context.add_message(LlmMessage::assistant(
            result.content.clone(),
            &self.name,
            Some(result.usage),
        ));
        Ok(result)
    }

    /// 工具执行后的分支：Handoff 优先，其次反思，否则输出摘要
    fn after_tool_execution(
        &self,
        calls: &[ToolCallRequest],
        results: &[ToolExecutionResult],
    ) -> TurnState {
        if let Some(found) = detect_handoff(self.executor.registry(), calls) {
            if found.is_ambiguous() {
                self.observer.on_diagnostic(
                    &self.name,
                    &Diagnostic::MultipleHandoffs {
                        targets: found.matched_targets.clone(),
                    },
                );
            }
            return TurnState::Terminated(ChatMessage::Handoff {
                content: found.selected.message,
                target: found.selected.target,
                source: self.name.clone(),
            });
        }

        if self.reflect_on_tool_use {
            return TurnState::ReflectionPending;
        }

        let summary = calls
            .iter()
            .zip(results)
            .map(|(call, result)| render_summary(&self.tool_call_summary_format, call, result))
            .collect::<Vec<_>>()
            .join("\n");
        TurnState::Terminated(ChatMessage::ToolCallSummary {
            content: summary,
            source: self.name.clone(),
        })
    }

    fn text_message(&self, content: String, usage: RequestUsage) -> ChatMessage {
        ChatMessage::Text {
            content,
            source: self.name.clone(),
            usage: Some(usage),
        }
    }
}

/// 单遍替换 {tool_name} / {arguments} / {result}；`{{` `}}` 转义为花括号，未知占位符原样保留
pub(crate) fn render_summary(
    template: &str,
    call: &ToolCallRequest,
    result: &ToolExecutionResult,
) -> String {
    let mut out = String::with_capacity(template.len() + result.content.len());
    let mut rest = template;
    while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('{') {
            if let Some(end) = tail.find('}') {
                let value = match &tail[1..end] {
                    "tool_name" => Some(call.name.as_str()),
                    "arguments" => Some(call.arguments.as_str()),
                    "result" => Some(result.content.as_str()),
                    _ => None,
                };
                out.push_str(value.unwrap_or(&tail[..=end]));
                rest = &tail[end + 1..];
                continue;
            }
        }
        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}
