//! Handoff：把对话控制权交给另一个 Agent
//!
//! 每个 Handoff 对应一个隐式工具（默认名 `transfer_to_{target}`），执行时返回外发消息。
//! detect_handoff 按请求顺序扫描工具调用，命中多个时只取第一个。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::llm::ToolCallRequest;
use crate::tools::{Tool, ToolRegistry};

/// Handoff 目标与外发消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handoff {
    /// 目标 Agent 名
    pub target: String,
    /// 对应工具名
    pub name: String,
    pub description: String,
    /// 交接时发出的消息（`{target}` 已替换）
    pub message: String,
}

impl Handoff {
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            name: format!("transfer_to_{}", target),
            description: format!("Handoff to {}.", target),
            message: format!(
                "Transferred to {}, adopting the role of {} immediately.",
                target, target
            ),
            target,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 自定义消息模板，`{target}` 替换为目标名
    pub fn with_message(mut self, template: &str) -> Self {
        self.message = template.replace("{target}", &self.target);
        self
    }
}

/// Handoff 的隐式工具：无参数，执行即返回外发消息
pub struct HandoffTool {
    handoff: Handoff,
}

impl HandoffTool {
    pub fn new(handoff: Handoff) -> Self {
        Self { handoff }
    }
}

#[async_trait]
impl Tool for HandoffTool {
    fn name(&self) -> &str {
        &self.handoff.name
    }

    fn description(&self) -> &str {
        &self.handoff.description
    }

    async fn execute(&self, _args: Value, _cancel: CancellationToken) -> Result<Value, String> {
        Ok(Value::String(self.handoff.message.clone()))
    }
}

/// 检测结果：被采用的 Handoff 与全部命中的目标（按请求顺序）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoffMatch {
    pub selected: Handoff,
    pub matched_targets: Vec<String>,
}

impl HandoffMatch {
    /// 是否命中多个（需要发出诊断）
    pub fn is_ambiguous(&self) -> bool {
        self.matched_targets.len() > 1
    }
}

/// 按请求顺序收集命中的 Handoff；没有命中返回 None
pub fn detect_handoff(registry: &ToolRegistry, calls: &[ToolCallRequest]) -> Option<HandoffMatch> {
    let matched: Vec<&Handoff> = calls
        .iter()
        .filter_map(|call| registry.handoff(&call.name))
        .collect();
    let selected = (*matched.first()?).clone();
    Some(HandoffMatch {
        selected,
        matched_targets: matched.iter().map(|h| h.target.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;
    use std::sync::Arc;

    fn registry() -> ToolRegistry {
        ToolRegistry::build(
            vec![Arc::new(EchoTool)],
            vec![Handoff::new("agentA"), Handoff::new("agentB")],
        )
        .unwrap()
    }

    #[test]
    fn test_handoff_defaults() {
        let h = Handoff::new("agentA");
        assert_eq!(h.name, "transfer_to_agentA");
        assert_eq!(h.description, "Handoff to agentA.");
        assert_eq!(
            h.message,
            "Transferred to agentA, adopting the role of agentA immediately."
        );
    }

    #[test]
    fn test_custom_message_template() {
        let h = Handoff::new("billing").with_message("Routing you to {target}.");
        assert_eq!(h.message, "Routing you to billing.");
    }

    #[tokio::test]
    async fn test_handoff_tool_returns_message() {
        let tool = HandoffTool::new(Handoff::new("agentA"));
        let out = tool
            .execute(serde_json::json!({}), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tool.return_value_as_string(&out), Handoff::new("agentA").message);
    }

    #[test]
    fn test_no_handoff_detected() {
        let calls = vec![ToolCallRequest::new("1", "echo", "{}")];
        assert!(detect_handoff(&registry(), &calls).is_none());
    }

    #[test]
    fn test_first_handoff_wins() {
        let calls = vec![
            ToolCallRequest::new("1", "echo", "{}"),
            ToolCallRequest::new("2", "transfer_to_agentA", "{}"),
            ToolCallRequest::new("3", "transfer_to_agentB", "{}"),
        ];
        let m = detect_handoff(&registry(), &calls).unwrap();
        assert_eq!(m.selected.target, "agentA");
        assert_eq!(m.matched_targets, vec!["agentA", "agentB"]);
        assert!(m.is_ambiguous());
    }
}
