//! 记忆提供者：在推理前按需向上下文注入检索内容
//!
//! MemoryProvider::update_context 每回合调用一次；返回的条目非空时 Agent 发出 MemoryQuery 事件。
//! ListMemory 为内存实现：按关键词重叠检索与最近一条 User 消息相关的条目，拼成一条 System 消息写入上下文。

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::{ChatContext, LlmMessage};

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory provider '{provider}' failed: {message}")]
    Failed { provider: String, message: String },
}

/// 一条检索到的记忆
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl MemoryItem {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }
}

/// 记忆提供者 trait
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// 可修改上下文；返回本次注入的条目（为空表示无注入）
    async fn update_context(
        &self,
        context: &mut dyn ChatContext,
    ) -> Result<Vec<MemoryItem>, MemoryError>;
}

/// 将文本切分为小写词集合，用于简单相似度（词重叠数）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// 简单内存实现：按关键词重叠检索（无真实向量）
pub struct ListMemory {
    name: String,
    /// (text, 小写词集合)
    store: RwLock<Vec<(MemoryItem, HashSet<String>)>>,
    max_results: usize,
    /// 超出后丢弃最早写入的条目
    max_entries: usize,
}

const DEFAULT_MAX_ENTRIES: usize = 1000;

impl ListMemory {
    pub fn new(name: impl Into<String>, max_results: usize) -> Self {
        Self {
            name: name.into(),
            store: RwLock::new(Vec::new()),
            max_results,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn add(&self, item: MemoryItem) {
        let text = item.content.trim();
        if text.is_empty() {
            return;
        }
        let tokens = tokenize_lower(text);
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.push((item, tokens));
        let n = store.len();
        if n > self.max_entries {
            store.drain(0..n - self.max_entries);
        }
    }

    pub fn len(&self) -> usize {
        self.store.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按词重叠数降序取前 max_results 条；同分保持写入顺序
    pub fn search(&self, query: &str) -> Vec<MemoryItem> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<(usize, usize)> = store
            .iter()
            .enumerate()
            .map(|(i, (_, tokens))| (i, query_tokens.intersection(tokens).count()))
            .filter(|(_, score)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored
            .into_iter()
            .take(self.max_results)
            .map(|(i, _)| store[i].0.clone())
            .collect()
    }
}

#[async_trait]
impl MemoryProvider for ListMemory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn update_context(
        &self,
        context: &mut dyn ChatContext,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        let query = context.messages().iter().rev().find_map(|m| match m {
            LlmMessage::User { content, .. } => Some(content.text()),
            _ => None,
        });
        let Some(query) = query else {
            return Ok(Vec::new());
        };
        let items = self.search(&query);
        if items.is_empty() {
            return Ok(items);
        }
        let body = items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {}", i + 1, item.content))
            .collect::<Vec<_>>()
            .join("\n");
        context.add_message(LlmMessage::system(format!(
            "Relevant memory content:\n{}",
            body
        )));
        Ok(items)
    }
}
