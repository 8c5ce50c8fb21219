//! Bee Assistant - 单智能体回合编排
//!
//! 模块划分：
//! - **agent**: AssistantAgent 回合状态机（推理 → 并发工具调用 → Handoff / 反思 / 摘要）与事件流
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: 模型客户端抽象（能力标记、推理结果）与测试用客户端
//! - **memory**: 对话上下文（ContextStore）、状态持久化、记忆提供者
//! - **observability**: tracing 初始化
//! - **tools**: 工具 trait、注册表、Handoff、并发执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;

pub use agent::{
    spawn_turn, AgentEvent, AgentObserver, AgentState, AssistantAgent, AssistantAgentBuilder,
    ChatMessage, Diagnostic, Response, TurnOutput,
};
pub use core::AgentError;
