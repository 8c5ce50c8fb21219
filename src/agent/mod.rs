//! AssistantAgent：单智能体回合编排
//!
//! 每回合：写入输入消息 → 记忆注入 → 推理 →（文本则结束）→ 并发执行工具 →
//! Handoff 检测（命中则结束）→ 反思（第二次推理）或按模板输出工具摘要。
//! 跨回合只保留上下文（ContextStore）；同一实例不可并发处理回合，由 &mut self 保证。

pub mod events;
pub mod observer;
pub mod stream;
pub mod turn;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::ChatCompletionClient;
use crate::memory::{
    BufferedContext, ChatContext, ContextState, LlmMessage, MemoryProvider, UnboundedContext,
};
use crate::tools::{Handoff, Tool, ToolExecutor, ToolRegistry};

pub use events::{AgentEvent, ChatMessage, ChatMessageKind, Response, TurnOutput};
pub use observer::{AgentObserver, Diagnostic, TracingObserver};
pub use stream::spawn_turn;

pub const DEFAULT_DESCRIPTION: &str = "An agent that provides assistance with ability to use tools.";
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful AI assistant. Solve tasks using your tools. Reply with TERMINATE when the task has been completed.";
pub const DEFAULT_TOOL_CALL_SUMMARY_FORMAT: &str = "{result}";

const STATE_TYPE: &str = "AssistantAgentState";
const STATE_VERSION: &str = "1.0.0";

/// save_state / load_state 的载体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(rename = "type", default = "default_state_type")]
    pub kind: String,
    #[serde(default = "default_state_version")]
    pub version: String,
    pub llm_context: ContextState,
}

fn default_state_type() -> String {
    STATE_TYPE.to_string()
}

fn default_state_version() -> String {
    STATE_VERSION.to_string()
}

impl AgentState {
    pub fn new(llm_context: ContextState) -> Self {
        Self {
            kind: default_state_type(),
            version: default_state_version(),
            llm_context,
        }
    }
}

/// 单智能体
pub struct AssistantAgent {
    name: String,
    description: String,
    client: Arc<dyn ChatCompletionClient>,
    executor: ToolExecutor,
    memory: Vec<Arc<dyn MemoryProvider>>,
    context: Box<dyn ChatContext>,
    /// 每次推理都放在最前，但不写入上下文
    system_messages: Vec<LlmMessage>,
    reflect_on_tool_use: bool,
    tool_call_summary_format: String,
    observer: Arc<dyn AgentObserver>,
}

impl AssistantAgent {
    pub fn builder(
        name: impl Into<String>,
        client: Arc<dyn ChatCompletionClient>,
    ) -> AssistantAgentBuilder {
        AssistantAgentBuilder::new(name, client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// 本 Agent 可能产生的 Response 消息种类
    pub fn produced_message_kinds(&self) -> Vec<ChatMessageKind> {
        let registry = self.executor.registry();
        let mut kinds = vec![ChatMessageKind::Text];
        if registry.has_handoffs() {
            kinds.push(ChatMessageKind::Handoff);
        }
        if registry.has_tools() {
            kinds.push(ChatMessageKind::ToolCallSummary);
        }
        kinds
    }

    /// 当前上下文（只读）
    pub fn context(&self) -> &dyn ChatContext {
        self.context.as_ref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    /// 处理一批新消息，只返回最终 Response
    pub async fn on_messages(
        &mut self,
        messages: Vec<ChatMessage>,
        cancel: CancellationToken,
    ) -> Result<Response, AgentError> {
        let span = tracing::info_span!("agent", agent = %self.name);
        self.run_turn(messages, cancel, None).instrument(span).await
    }

    /// 处理一批新消息；内部事件产生时即推送到 event_tx，最终 Response 作为返回值
    pub async fn on_messages_stream(
        &mut self,
        messages: Vec<ChatMessage>,
        cancel: CancellationToken,
        event_tx: &mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<Response, AgentError> {
        let span = tracing::info_span!("agent", agent = %self.name);
        self.run_turn(messages, cancel, Some(event_tx))
            .instrument(span)
            .await
    }

    /// 清空上下文；构造时预置的消息不会恢复
    pub fn reset(&mut self) {
        self.context.clear();
        tracing::debug!(agent = %self.name, "context reset");
    }

    pub fn save_state(&self) -> AgentState {
        AgentState::new(self.context.save_state())
    }

    pub fn load_state(&mut self, state: AgentState) {
        self.context.load_state(state.llm_context);
    }

    /// 从 JSON 值恢复（save_state 序列化后的形态）
    pub fn load_state_value(&mut self, value: serde_json::Value) -> Result<(), AgentError> {
        let state: AgentState =
            serde_json::from_value(value).map_err(|e| AgentError::State(e.to_string()))?;
        if state.kind != STATE_TYPE {
            return Err(AgentError::State(format!(
                "Unexpected state type: {}",
                state.kind
            )));
        }
        self.load_state(state);
        Ok(())
    }
}

/// AssistantAgent 构建器
pub struct AssistantAgentBuilder {
    name: String,
    client: Arc<dyn ChatCompletionClient>,
    description: String,
    system_message: Option<String>,
    tools: Vec<Arc<dyn Tool>>,
    handoffs: Vec<Handoff>,
    memory: Vec<Arc<dyn MemoryProvider>>,
    context: Option<Box<dyn ChatContext>>,
    reflect_on_tool_use: bool,
    tool_call_summary_format: String,
    observer: Arc<dyn AgentObserver>,
}

impl AssistantAgentBuilder {
    pub fn new(name: impl Into<String>, client: Arc<dyn ChatCompletionClient>) -> Self {
        Self {
            name: name.into(),
            client,
            description: DEFAULT_DESCRIPTION.to_string(),
            system_message: Some(DEFAULT_SYSTEM_MESSAGE.to_string()),
            tools: Vec::new(),
            handoffs: Vec::new(),
            memory: Vec::new(),
            context: None,
            reflect_on_tool_use: false,
            tool_call_summary_format: DEFAULT_TOOL_CALL_SUMMARY_FORMAT.to_string(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// 按 [agent] / [context] 配置段初始化；context.buffer_size 为 0 时报 Configuration 错误
    pub fn from_config(
        config: &AppConfig,
        client: Arc<dyn ChatCompletionClient>,
    ) -> Result<Self, AgentError> {
        let agent = &config.agent;
        let mut builder = Self::new(agent.name.clone(), client)
            .with_description(agent.description.clone())
            .with_reflect_on_tool_use(agent.reflect_on_tool_use)
            .with_tool_call_summary_format(agent.tool_call_summary_format.clone());
        builder.system_message = agent
            .system_message
            .clone()
            .filter(|s| !s.trim().is_empty());
        match config.context.buffer_size {
            Some(0) => {
                return Err(AgentError::Configuration(
                    "context.buffer_size must be at least 1".to_string(),
                ))
            }
            Some(size) => builder = builder.with_context(BufferedContext::new(size)),
            None => {}
        }
        Ok(builder)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    /// 不发送 system 消息（部分模型不支持）
    pub fn without_system_message(mut self) -> Self {
        self.system_message = None;
        self
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn with_shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.handoffs.push(handoff);
        self
    }

    pub fn with_memory(mut self, provider: Arc<dyn MemoryProvider>) -> Self {
        self.memory.push(provider);
        self
    }

    /// 自定义上下文（可带预置消息）；默认 UnboundedContext
    pub fn with_context(mut self, context: impl ChatContext + 'static) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    pub fn with_reflect_on_tool_use(mut self, reflect: bool) -> Self {
        self.reflect_on_tool_use = reflect;
        self
    }

    /// 摘要模板，支持 {tool_name} / {arguments} / {result}
    pub fn with_tool_call_summary_format(mut self, format: impl Into<String>) -> Self {
        self.tool_call_summary_format = format.into();
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// 校验能力与名称唯一性后构造 Agent
    pub fn build(self) -> Result<AssistantAgent, AgentError> {
        let capabilities = self.client.capabilities();
        if !self.tools.is_empty() && !capabilities.function_calling {
            return Err(AgentError::Configuration(
                "The model does not support function calling.".to_string(),
            ));
        }
        if !self.handoffs.is_empty() && !capabilities.function_calling {
            return Err(AgentError::Configuration(
                "The model does not support function calling, which is needed for handoffs."
                    .to_string(),
            ));
        }
        let registry = ToolRegistry::build(self.tools, self.handoffs)?;

        Ok(AssistantAgent {
            name: self.name,
            description: self.description,
            client: self.client,
            executor: ToolExecutor::new(Arc::new(registry)),
            memory: self.memory,
            context: self
                .context
                .unwrap_or_else(|| Box::new(UnboundedContext::new())),
            system_messages: self
                .system_message
                .map(|m| vec![LlmMessage::system(m)])
                .unwrap_or_default(),
            reflect_on_tool_use: self.reflect_on_tool_use,
            tool_call_summary_format: self.tool_call_summary_format,
            observer: self.observer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ModelCapabilities, ReplayChatClient};
    use crate::tools::EchoTool;

    fn client(caps: ModelCapabilities) -> Arc<dyn ChatCompletionClient> {
        Arc::new(ReplayChatClient::new(vec![]).with_capabilities(caps))
    }

    #[test]
    fn test_tools_require_function_calling() {
        let err = AssistantAgent::builder("a", client(ModelCapabilities::text_only()))
            .with_tool(EchoTool)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::Configuration(m) if m.contains("function calling")));
    }

    #[test]
    fn test_handoffs_require_function_calling() {
        let err = AssistantAgent::builder("a", client(ModelCapabilities::text_only()))
            .with_handoff(Handoff::new("b"))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::Configuration(m) if m.contains("handoffs")));
    }

    #[test]
    fn test_produced_message_kinds() {
        let plain = AssistantAgent::builder("a", client(ModelCapabilities::default()))
            .build()
            .unwrap();
        assert_eq!(plain.produced_message_kinds(), vec![ChatMessageKind::Text]);

        let full = AssistantAgent::builder("a", client(ModelCapabilities::default()))
            .with_tool(EchoTool)
            .with_handoff(Handoff::new("b"))
            .build()
            .unwrap();
        assert_eq!(
            full.produced_message_kinds(),
            vec![
                ChatMessageKind::Text,
                ChatMessageKind::Handoff,
                ChatMessageKind::ToolCallSummary
            ]
        );
    }

    #[test]
    fn test_from_config_applies_sections() {
        let mut cfg = AppConfig::default();
        cfg.agent.name = "helper".into();
        cfg.agent.system_message = Some(String::new());
        cfg.agent.reflect_on_tool_use = true;
        cfg.context.buffer_size = Some(4);
        let agent = AssistantAgentBuilder::from_config(&cfg, client(ModelCapabilities::default()))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(agent.name(), "helper");
        assert!(agent.system_messages.is_empty());
        assert!(agent.reflect_on_tool_use);
    }

    #[test]
    fn test_from_config_rejects_zero_buffer_size() {
        let mut cfg = AppConfig::default();
        cfg.context.buffer_size = Some(0);
        let err = AssistantAgentBuilder::from_config(&cfg, client(ModelCapabilities::default()))
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::Configuration(m) if m.contains("buffer_size")));
    }

    #[test]
    fn test_load_state_value_rejects_wrong_type() {
        let mut agent = AssistantAgent::builder("a", client(ModelCapabilities::default()))
            .build()
            .unwrap();
        let value = serde_json::json!({
            "type": "SomethingElse",
            "llm_context": { "messages": [] }
        });
        assert!(matches!(
            agent.load_state_value(value),
            Err(AgentError::State(_))
        ));
        assert!(matches!(
            agent.load_state_value(serde_json::json!({"bogus": 1})),
            Err(AgentError::State(_))
        ));
    }
}
