//! 流式回合：把一次回合放到后台任务里，通过通道依次产出事件与最终结果

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentEvent, AssistantAgent, ChatMessage, TurnOutput};
use crate::core::AgentError;

/// 启动一个回合；返回的通道先产出若干 Event，最后恰好一个 Response 或 Error，随后关闭
///
/// Agent 由 Mutex 保护，同一实例的回合串行执行。回合内 panic 转为 AgentError::Internal。
pub fn spawn_turn(
    agent: Arc<Mutex<AssistantAgent>>,
    messages: Vec<ChatMessage>,
    cancel: CancellationToken,
) -> mpsc::UnboundedReceiver<TurnOutput> {
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut agent = agent.lock().await;
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AgentEvent>();

        let turn = async {
            let result = AssertUnwindSafe(agent.on_messages_stream(messages, cancel, &event_tx))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(panic = %message, "turn panicked");
                    Err(AgentError::Internal(message))
                });
            drop(event_tx);
            result
        };
        let forward = async {
            while let Some(event) = event_rx.recv().await {
                if out_tx.send(TurnOutput::Event(event)).is_err() {
                    tracing::debug!("turn output receiver dropped");
                }
            }
        };
        let (result, ()) = tokio::join!(turn, forward);

        let last = match result {
            Ok(response) => TurnOutput::Response(response),
            Err(e) => TurnOutput::Error(e),
        };
        let _ = out_tx.send(last);
    });

    out_rx
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "turn panicked".to_string()
    }
}
