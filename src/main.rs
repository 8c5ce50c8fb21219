//! Bee Assistant 命令行演示
//!
//! 使用 MockLlmClient + EchoTool，从 stdin 逐行读取输入，每行作为一次回合；
//! 打印内部事件与最终 Response。配置了 context.state_path 时启动恢复、每回合后保存。

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use bee_assistant::config::load_config;
use bee_assistant::llm::MockLlmClient;
use bee_assistant::memory::ContextPersistence;
use bee_assistant::tools::EchoTool;
use bee_assistant::{
    observability, spawn_turn, AgentState, AssistantAgentBuilder, ChatMessage, TurnOutput,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config = load_config(None).context("Failed to load config")?;
    let persistence = config.context.state_path.as_ref().map(ContextPersistence::new);

    let mut agent = AssistantAgentBuilder::from_config(&config, Arc::new(MockLlmClient))
        .context("Invalid agent config")?
        .with_tool(EchoTool)
        .build()
        .context("Failed to build agent")?;

    if let Some(store) = &persistence {
        let state = store.load().context("Failed to load context state")?;
        tracing::info!(
            path = %store.path().display(),
            messages = state.messages.len(),
            "context restored"
        );
        agent.load_state(AgentState::new(state));
    }

    let agent = Arc::new(Mutex::new(agent));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Bee Assistant ready. Type a message, Ctrl-D to quit.");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c.cancel();
            }
        });

        let mut rx = spawn_turn(
            Arc::clone(&agent),
            vec![ChatMessage::text(line, "user")],
            cancel,
        );
        while let Some(output) = rx.recv().await {
            match output {
                TurnOutput::Event(event) => {
                    println!("  [event] {}", serde_json::to_string(&event)?)
                }
                TurnOutput::Response(response) => {
                    let message = &response.chat_message;
                    println!("{}: {}", message.source(), message.content_text())
                }
                TurnOutput::Error(e) => eprintln!("error: {}", e),
            }
        }
        watcher.abort();

        if let Some(store) = &persistence {
            let state = agent.lock().await.save_state();
            store
                .save(&state.llm_context)
                .context("Failed to save context state")?;
        }
    }

    Ok(())
}
