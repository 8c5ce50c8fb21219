//! 诊断观察者：按 Agent 实例注入，接收非致命诊断（如多个 Handoff）

use std::fmt;

/// 非致命诊断
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// 同一批工具调用命中多个 Handoff；只执行第一个
    MultipleHandoffs { targets: Vec<String> },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MultipleHandoffs { targets } => write!(
                f,
                "Multiple handoffs detected, only the first is executed: {:?}",
                targets
            ),
        }
    }
}

pub trait AgentObserver: Send + Sync {
    fn on_diagnostic(&self, agent: &str, diagnostic: &Diagnostic);
}

/// 默认观察者：写入 tracing 日志
#[derive(Debug, Default)]
pub struct TracingObserver;

impl AgentObserver for TracingObserver {
    fn on_diagnostic(&self, agent: &str, diagnostic: &Diagnostic) {
        tracing::warn!(agent = %agent, "{}", diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_names_all_targets() {
        let d = Diagnostic::MultipleHandoffs {
            targets: vec!["agentA".into(), "agentB".into()],
        };
        let text = d.to_string();
        assert!(text.contains("agentA") && text.contains("agentB"));
    }
}
