//! 回合输出：对外聊天消息、内部事件与最终 Response
//!
//! 一个回合按顺序产生若干 AgentEvent（MemoryQuery / ToolCallRequest / ToolCallExecution），
//! 最后恰好一个 Response。均可序列化为 JSON 供前端展示。

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::{RequestUsage, ToolCallRequest};
use crate::memory::{ContentPart, LlmMessage, MemoryItem, ToolExecutionResult, UserContent};

/// Agent 之间传递的聊天消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatMessage {
    Text {
        content: String,
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<RequestUsage>,
    },
    MultiModal {
        content: Vec<ContentPart>,
        source: String,
    },
    /// 未开启反思时，工具调用结果按模板拼成的摘要
    ToolCallSummary {
        content: String,
        source: String,
    },
    /// 把控制权交给 target
    Handoff {
        content: String,
        target: String,
        source: String,
    },
}

/// ChatMessage 的种类（不带内容）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMessageKind {
    Text,
    MultiModal,
    ToolCallSummary,
    Handoff,
}

impl ChatMessage {
    pub fn text(content: impl Into<String>, source: impl Into<String>) -> Self {
        ChatMessage::Text {
            content: content.into(),
            source: source.into(),
            usage: None,
        }
    }

    pub fn multi_modal(content: Vec<ContentPart>, source: impl Into<String>) -> Self {
        ChatMessage::MultiModal {
            content,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ChatMessageKind {
        match self {
            ChatMessage::Text { .. } => ChatMessageKind::Text,
            ChatMessage::MultiModal { .. } => ChatMessageKind::MultiModal,
            ChatMessage::ToolCallSummary { .. } => ChatMessageKind::ToolCallSummary,
            ChatMessage::Handoff { .. } => ChatMessageKind::Handoff,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            ChatMessage::Text { source, .. }
            | ChatMessage::MultiModal { source, .. }
            | ChatMessage::ToolCallSummary { source, .. }
            | ChatMessage::Handoff { source, .. } => source,
        }
    }

    /// 文本内容；多模态消息只取文本部分
    pub fn content_text(&self) -> String {
        match self {
            ChatMessage::Text { content, .. }
            | ChatMessage::ToolCallSummary { content, .. }
            | ChatMessage::Handoff { content, .. } => content.clone(),
            ChatMessage::MultiModal { content, .. } => {
                UserContent::MultiModal(content.clone()).text()
            }
        }
    }

    /// 作为输入写入上下文时的形态：一律记为 User 消息
    pub(crate) fn into_llm_message(self) -> LlmMessage {
        match self {
            ChatMessage::MultiModal { content, source } => {
                LlmMessage::user(UserContent::MultiModal(content), source)
            }
            ChatMessage::Text {
                content, source, ..
            }
            | ChatMessage::ToolCallSummary { content, source }
            | ChatMessage::Handoff {
                content, source, ..
            } => LlmMessage::user_text(content, source),
        }
    }
}

/// 回合内部事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 记忆提供者注入了内容
    MemoryQuery {
        content: Vec<MemoryItem>,
        source: String,
    },
    /// 模型请求了工具调用
    ToolCallRequest {
        content: Vec<ToolCallRequest>,
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<RequestUsage>,
    },
    /// 本批工具调用的全部结果（与请求同序）
    ToolCallExecution {
        content: Vec<ToolExecutionResult>,
        source: String,
    },
}

/// 回合的最终结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub chat_message: ChatMessage,
    /// 本回合按顺序产生的内部事件
    pub inner_messages: Vec<AgentEvent>,
}

/// spawn_turn 通道中的一项：若干 Event，之后恰好一个 Response 或 Error
#[derive(Debug)]
pub enum TurnOutput {
    Event(AgentEvent),
    Response(Response),
    Error(AgentError),
}

impl TurnOutput {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnOutput::Event(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Image;

    #[test]
    fn test_inputs_become_user_messages() {
        let summary = ChatMessage::ToolCallSummary {
            content: "12:00".into(),
            source: "clock".into(),
        };
        assert_eq!(
            summary.into_llm_message(),
            LlmMessage::user_text("12:00", "clock")
        );

        let handoff = ChatMessage::Handoff {
            content: "over to you".into(),
            target: "me".into(),
            source: "router".into(),
        };
        assert_eq!(
            handoff.into_llm_message(),
            LlmMessage::user_text("over to you", "router")
        );
    }

    #[test]
    fn test_multimodal_kept_as_multimodal() {
        let parts = vec![
            ContentPart::Text("what is this".into()),
            ContentPart::Image(Image {
                mime_type: "image/png".into(),
                data: "AAAA".into(),
            }),
        ];
        let msg = ChatMessage::multi_modal(parts.clone(), "user");
        assert_eq!(msg.kind(), ChatMessageKind::MultiModal);
        assert_eq!(msg.content_text(), "what is this\n<image>");
        assert_eq!(
            msg.into_llm_message(),
            LlmMessage::user(UserContent::MultiModal(parts), "user")
        );
    }

    #[test]
    fn test_event_serialization_tag() {
        let ev = AgentEvent::ToolCallExecution {
            content: vec![ToolExecutionResult::success("1", "ok")],
            source: "assistant".into(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains(r#""type":"tool_call_execution""#));
    }
}
