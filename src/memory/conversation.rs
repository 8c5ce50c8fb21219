//! 短期记忆：模型上下文（ContextStore）
//!
//! 按因果顺序保存本 Agent 的全部消息；只追加，除显式 clear 外不删除、不重排。
//! UnboundedContext 把全部消息发给模型；BufferedContext 全量保存，但只发送最近 N 条。

use serde::{Deserialize, Serialize};

use crate::llm::{CompletionContent, RequestUsage};

/// 图片（base64 数据 + MIME 类型）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub mime_type: String,
    pub data: String,
}

/// 多模态消息的一段
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPart {
    Text(String),
    Image(Image),
}

/// User 消息内容：纯文本或多模态
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserContent {
    Text(String),
    MultiModal(Vec<ContentPart>),
}

impl UserContent {
    /// 文本部分（多模态时按顺序拼接，图片以占位符表示）
    pub fn text(&self) -> String {
        match self {
            UserContent::Text(t) => t.clone(),
            UserContent::MultiModal(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text(t) => t.as_str(),
                    ContentPart::Image(_) => "<image>",
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_multimodal(&self) -> bool {
        matches!(self, UserContent::MultiModal(_))
    }
}

/// 单个工具调用的结果，与请求按 call_id 和位置一一对应
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub call_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolExecutionResult {
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// 上下文中的一条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmMessage {
    System {
        content: String,
    },
    User {
        content: UserContent,
        source: String,
    },
    Assistant {
        content: CompletionContent,
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<RequestUsage>,
    },
    /// 一批工具调用的全部结果（一次执行只占一条）
    FunctionExecutionResult {
        content: Vec<ToolExecutionResult>,
    },
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        LlmMessage::System {
            content: content.into(),
        }
    }

    pub fn user(content: UserContent, source: impl Into<String>) -> Self {
        LlmMessage::User {
            content,
            source: source.into(),
        }
    }

    pub fn user_text(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self::user(UserContent::Text(content.into()), source)
    }

    pub fn assistant(
        content: CompletionContent,
        source: impl Into<String>,
        usage: Option<RequestUsage>,
    ) -> Self {
        LlmMessage::Assistant {
            content,
            source: source.into(),
            usage,
        }
    }
}

/// 上下文的可序列化快照（save / load 的载体）
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextState {
    pub messages: Vec<LlmMessage>,
}

/// ContextStore trait：追加、快照、清空、保存/恢复
pub trait ChatContext: Send + Sync {
    fn add_message(&mut self, message: LlmMessage);

    /// 全部消息（按追加顺序）
    fn messages(&self) -> &[LlmMessage];

    /// 发送给模型的消息；默认与 messages 相同
    fn llm_messages(&self) -> Vec<LlmMessage> {
        self.messages().to_vec()
    }

    fn clear(&mut self);

    fn save_state(&self) -> ContextState {
        ContextState {
            messages: self.messages().to_vec(),
        }
    }

    /// 用快照整体替换当前内容
    fn load_state(&mut self, state: ContextState);

    fn len(&self) -> usize {
        self.messages().len()
    }

    fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }
}

/// 无上限上下文：全部消息都发给模型
#[derive(Clone, Debug, Default)]
pub struct UnboundedContext {
    messages: Vec<LlmMessage>,
}

impl UnboundedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带初始消息（reset 后不会恢复）
    pub fn with_messages(messages: Vec<LlmMessage>) -> Self {
        Self { messages }
    }
}

impl ChatContext for UnboundedContext {
    fn add_message(&mut self, message: LlmMessage) {
        self.messages.push(message);
    }

    fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }

    fn clear(&mut self) {
        self.messages.clear();
    }

    fn load_state(&mut self, state: ContextState) {
        self.messages = state.messages;
    }
}

/// 滑动窗口上下文：保存全部消息，只把最近 buffer_size 条发给模型
#[derive(Clone, Debug)]
pub struct BufferedContext {
    messages: Vec<LlmMessage>,
    buffer_size: usize,
}

impl BufferedContext {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            messages: Vec::new(),
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl ChatContext for BufferedContext {
    fn add_message(&mut self, message: LlmMessage) {
        self.messages.push(message);
    }

    fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }

    /// 窗口起点若落在工具结果上则跳过它，避免发送没有对应调用的结果
    fn llm_messages(&self) -> Vec<LlmMessage> {
        let start = self.messages.len().saturating_sub(self.buffer_size);
        let mut window = &self.messages[start..];
        if let Some(LlmMessage::FunctionExecutionResult { .. }) = window.first() {
            window = &window[1..];
        }
        window.to_vec()
    }

    fn clear(&mut self) {
        self.messages.clear();
    }

    fn load_state(&mut self, state: ContextState) {
        self.messages = state.messages;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_keeps_append_order() {
        let mut ctx = UnboundedContext::new();
        ctx.add_message(LlmMessage::user_text("a", "user"));
        ctx.add_message(LlmMessage::assistant(
            CompletionContent::Text("b".into()),
            "assistant",
            None,
        ));
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.messages()[0], LlmMessage::user_text("a", "user"));
        assert_eq!(ctx.llm_messages(), ctx.messages().to_vec());
    }

    #[test]
    fn test_clear_empties_preloaded_messages() {
        let mut ctx = UnboundedContext::with_messages(vec![LlmMessage::system("seed")]);
        assert!(!ctx.is_empty());
        ctx.clear();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_buffered_window_and_full_snapshot() {
        let mut ctx = BufferedContext::new(2);
        for i in 0..5 {
            ctx.add_message(LlmMessage::user_text(format!("m{i}"), "user"));
        }
        assert_eq!(ctx.messages().len(), 5);
        let window = ctx.llm_messages();
        assert_eq!(
            window,
            vec![
                LlmMessage::user_text("m3", "user"),
                LlmMessage::user_text("m4", "user")
            ]
        );
        assert_eq!(ctx.save_state().messages.len(), 5);
    }

    #[test]
    fn test_buffered_window_skips_leading_tool_result() {
        let mut ctx = BufferedContext::new(2);
        ctx.add_message(LlmMessage::user_text("q", "user"));
        ctx.add_message(LlmMessage::FunctionExecutionResult {
            content: vec![ToolExecutionResult::success("1", "ok")],
        });
        ctx.add_message(LlmMessage::user_text("next", "user"));
        assert_eq!(ctx.llm_messages(), vec![LlmMessage::user_text("next", "user")]);
    }

    #[test]
    fn test_state_json_round_trip() {
        let mut ctx = UnboundedContext::new();
        ctx.add_message(LlmMessage::system("sys"));
        ctx.add_message(LlmMessage::user(
            UserContent::MultiModal(vec![
                ContentPart::Text("look".into()),
                ContentPart::Image(Image {
                    mime_type: "image/png".into(),
                    data: "AAAA".into(),
                }),
            ]),
            "user",
        ));
        ctx.add_message(LlmMessage::assistant(
            CompletionContent::ToolCalls(vec![crate::llm::ToolCallRequest::new(
                "c1", "get_time", "{}",
            )]),
            "assistant",
            Some(RequestUsage::new(10, 2)),
        ));
        ctx.add_message(LlmMessage::FunctionExecutionResult {
            content: vec![ToolExecutionResult::error("c1", "Error: boom")],
        });

        let json = serde_json::to_string(&ctx.save_state()).unwrap();
        let state: ContextState = serde_json::from_str(&json).unwrap();
        let mut restored = UnboundedContext::new();
        restored.load_state(state);
        assert_eq!(restored.messages(), ctx.messages());
    }

    #[test]
    fn test_multimodal_text_projection() {
        let content = UserContent::MultiModal(vec![
            ContentPart::Text("caption".into()),
            ContentPart::Image(Image {
                mime_type: "image/jpeg".into(),
                data: String::new(),
            }),
        ]);
        assert!(content.is_multimodal());
        assert_eq!(content.text(), "caption\n<image>");
    }
}
