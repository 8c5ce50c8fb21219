//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute / return_value_as_string）。
//! ToolRegistry 把普通工具与 Handoff 工具合并为一个注册表，构造时一次性校验名称唯一。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::ToolSchema;
use crate::tools::{Handoff, HandoffTool};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称，在合并注册表内唯一
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认为无约束对象
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具；取消令牌由实现自行在合适的检查点响应
    async fn execute(&self, args: Value, cancel: CancellationToken) -> Result<Value, String>;

    /// 原始结果转展示文本：字符串原样返回，其余序列化为紧凑 JSON
    fn return_value_as_string(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// 合并注册表：普通工具在前、Handoff 工具在后，保持注册顺序
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    handoffs: HashMap<String, Handoff>,
    index: HashMap<String, usize>,
    tool_count: usize,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 构造合并注册表，依次校验：工具名唯一、Handoff 名唯一、Handoff 名不与工具名冲突
    pub fn build(tools: Vec<Arc<dyn Tool>>, handoffs: Vec<Handoff>) -> Result<Self, AgentError> {
        let tool_names: Vec<String> = tools.iter().map(|t| t.name().to_string()).collect();
        if has_duplicates(&tool_names) {
            return Err(AgentError::Configuration(format!(
                "Tool names must be unique: {:?}",
                tool_names
            )));
        }

        let handoff_names: Vec<String> = handoffs.iter().map(|h| h.name.clone()).collect();
        if has_duplicates(&handoff_names) {
            return Err(AgentError::Configuration(format!(
                "Handoff names must be unique: {:?}",
                handoff_names
            )));
        }

        if handoff_names.iter().any(|n| tool_names.contains(n)) {
            return Err(AgentError::Configuration(format!(
                "Handoff names must be unique from tool names. Handoff names: {:?}; tool names: {:?}",
                handoff_names, tool_names
            )));
        }

        let mut registry = Self::new();
        registry.tool_count = tools.len();
        for tool in tools {
            registry.insert(tool);
        }
        for handoff in handoffs {
            registry.insert(Arc::new(HandoffTool::new(handoff.clone())));
            registry.handoffs.insert(handoff.name.clone(), handoff);
        }
        Ok(registry)
    }

    fn insert(&mut self, tool: Arc<dyn Tool>) {
        self.index.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// 名称对应的 Handoff（仅 Handoff 工具）
    pub fn handoff(&self, name: &str) -> Option<&Handoff> {
        self.handoffs.get(name)
    }

    pub fn has_tools(&self) -> bool {
        self.tool_count > 0
    }

    pub fn has_handoffs(&self) -> bool {
        !self.handoffs.is_empty()
    }

    /// 合并注册表是否为空
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// 发给模型的工具描述（普通工具 + Handoff 工具）
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }
}

fn has_duplicates(names: &[String]) -> bool {
    let mut seen = std::collections::HashSet::new();
    names.iter().any(|n| !seen.insert(n.as_str()))
}
