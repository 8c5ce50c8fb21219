//! 工具执行器
//!
//! execute_all 并发执行一批工具调用并等待全部完成，结果与请求等长同序。
//! 查找失败、参数解析失败、工具返回 Err、panic 或被取消都转为 "Error: ..." 结果，不会中断整批；
//! 每次调用输出结构化审计日志（JSON）。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use futures_util::FutureExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::llm::ToolCallRequest;
use crate::memory::ToolExecutionResult;
use crate::tools::ToolRegistry;

/// 单个工具调用失败的原因；只在执行器内部出现，最终渲染为结果文本
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolExecutionError {
    #[error("No tools are available.")]
    NoTools,

    #[error("The tool '{0}' is not available.")]
    NotAvailable(String),

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{0}")]
    Failed(String),

    #[error("Tool call '{0}' was cancelled")]
    Cancelled(String),

    #[error("Tool '{0}' panicked")]
    Panicked(String),
}

/// 工具执行器：持有合并注册表，对每批调用做并发扇出 + 汇合
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 并发执行全部请求；返回与 requests 等长、同序的结果
    pub async fn execute_all(
        &self,
        requests: &[ToolCallRequest],
        cancel: &CancellationToken,
    ) -> Vec<ToolExecutionResult> {
        join_all(
            requests
                .iter()
                .map(|call| self.execute(call, cancel.clone())),
        )
        .await
    }

    /// 执行单个请求，任何失败都收敛为 is_error 结果
    pub async fn execute(
        &self,
        call: &ToolCallRequest,
        cancel: CancellationToken,
    ) -> ToolExecutionResult {
        let start = Instant::now();
        let outcome = AssertUnwindSafe(self.run(call, cancel))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(ToolExecutionError::Panicked(call.name.clone())));

        let label = match &outcome {
            Ok(_) => "ok",
            Err(ToolExecutionError::Cancelled(_)) => "cancelled",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call.id,
            "ok": outcome.is_ok(),
            "outcome": label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.arguments),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match outcome {
            Ok(content) => ToolExecutionResult::success(&call.id, content),
            Err(e) => ToolExecutionResult::error(&call.id, format!("Error: {}", e)),
        }
    }

    async fn run(
        &self,
        call: &ToolCallRequest,
        cancel: CancellationToken,
    ) -> Result<String, ToolExecutionError> {
        if self.registry.is_empty() {
            return Err(ToolExecutionError::NoTools);
        }
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ToolExecutionError::NotAvailable(call.name.clone()))?;
        let args: serde_json::Value = serde_json::from_str(&call.arguments).map_err(|e| {
            ToolExecutionError::InvalidArguments {
                tool: call.name.clone(),
                reason: e.to_string(),
            }
        })?;

        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ToolExecutionError::Cancelled(call.id.clone())),
            result = tool.execute(args, cancel.clone()) => {
                result.map_err(ToolExecutionError::Failed)?
            }
        };
        Ok(tool.return_value_as_string(&value))
    }
}

fn args_preview(args: &str) -> String {
    if args.chars().count() > 200 {
        format!("{}...", args.chars().take(200).collect::<String>())
    } else {
        args.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, FunctionTool, Handoff, Tool};
    use serde_json::Value;
    use std::time::Duration;

    fn executor(tools: Vec<Arc<dyn Tool>>) -> ToolExecutor {
        ToolExecutor::new(Arc::new(ToolRegistry::build(tools, vec![]).unwrap()))
    }

    fn sleeper(name: &'static str) -> Arc<dyn Tool> {
        Arc::new(FunctionTool::new(name, "sleep then echo", |args: Value, _cancel| async move {
            let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<Value, String>(Value::String(format!("slept {}", ms)))
        }))
    }

    #[tokio::test]
    async fn test_results_follow_request_order() {
        let exec = executor(vec![sleeper("sleep")]);
        let requests = vec![
            ToolCallRequest::new("a", "sleep", r#"{"ms": 60}"#),
            ToolCallRequest::new("b", "sleep", r#"{"ms": 1}"#),
            ToolCallRequest::new("c", "sleep", r#"{"ms": 30}"#),
        ];
        let results = exec.execute_all(&requests, &CancellationToken::new()).await;
        let ids: Vec<&str> = results.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(results[0].content, "slept 60");
        assert_eq!(results[1].content, "slept 1");
    }

    #[tokio::test]
    async fn test_calls_run_concurrently() {
        let exec = executor(vec![sleeper("sleep")]);
        let requests: Vec<_> = (0..4)
            .map(|i| ToolCallRequest::new(i.to_string(), "sleep", r#"{"ms": 100}"#))
            .collect();
        let start = Instant::now();
        let results = exec.execute_all(&requests, &CancellationToken::new()).await;
        assert_eq!(results.len(), 4);
        assert!(start.elapsed() < Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_errors_are_contained() {
        let failing: Arc<dyn Tool> = Arc::new(FunctionTool::new(
            "fail",
            "always fails",
            |_args: Value, _cancel| async move { Err::<Value, String>("disk on fire".to_string()) },
        ));
        let exec = executor(vec![Arc::new(EchoTool), failing]);
        let requests = vec![
            ToolCallRequest::new("1", "fail", "{}"),
            ToolCallRequest::new("2", "missing", "{}"),
            ToolCallRequest::new("3", "echo", "not json"),
            ToolCallRequest::new("4", "echo", r#"{"text": "fine"}"#),
        ];
        let results = exec.execute_all(&requests, &CancellationToken::new()).await;
        assert_eq!(results[0].content, "Error: disk on fire");
        assert_eq!(results[1].content, "Error: The tool 'missing' is not available.");
        assert!(results[2].content.starts_with("Error: Invalid arguments"));
        assert!(results[..3].iter().all(|r| r.is_error));
        assert_eq!(results[3], ToolExecutionResult::success("4", "fine"));
    }

    #[tokio::test]
    async fn test_panicking_tool_is_contained() {
        let panicking: Arc<dyn Tool> = Arc::new(FunctionTool::new(
            "boom",
            "panics",
            |_args: Value, _cancel| async move {
                if true {
                    panic!("tool bug");
                }
                Ok::<Value, String>(Value::Null)
            },
        ));
        let exec = executor(vec![panicking, Arc::new(EchoTool)]);
        let requests = vec![
            ToolCallRequest::new("1", "boom", "{}"),
            ToolCallRequest::new("2", "echo", r#"{"text": "still here"}"#),
        ];
        let results = exec.execute_all(&requests, &CancellationToken::new()).await;
        assert_eq!(results[0].content, "Error: Tool 'boom' panicked");
        assert_eq!(results[1].content, "still here");
    }

    #[tokio::test]
    async fn test_empty_registry_reports_no_tools() {
        let exec = ToolExecutor::new(Arc::new(ToolRegistry::new()));
        let results = exec
            .execute_all(
                &[ToolCallRequest::new("1", "anything", "{}")],
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(results[0].content, "Error: No tools are available.");
    }

    #[tokio::test]
    async fn test_cancel_aborts_outstanding_calls() {
        let exec = executor(vec![sleeper("sleep")]);
        let token = CancellationToken::new();
        let requests = vec![
            ToolCallRequest::new("1", "sleep", r#"{"ms": 5000}"#),
            ToolCallRequest::new("2", "sleep", r#"{"ms": 5000}"#),
        ];
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let results = exec.execute_all(&requests, &token).await;
        assert!(results
            .iter()
            .all(|r| r.is_error && r.content.contains("cancelled")));
    }

    #[tokio::test]
    async fn test_handoff_tool_executes_through_registry() {
        let registry = ToolRegistry::build(vec![], vec![Handoff::new("agentA")]).unwrap();
        let exec = ToolExecutor::new(Arc::new(registry));
        let results = exec
            .execute_all(
                &[ToolCallRequest::new("1", "transfer_to_agentA", "{}")],
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(results[0].content, Handoff::new("agentA").message);
    }
}
