//! 上下文持久化
//!
//! 将 ContextState 写入/从 JSON 文件加载，用于跨进程恢复对话（可选使用）。

use std::path::Path;

use crate::memory::ContextState;

/// 单文件 JSON 持久化
#[derive(Debug)]
pub struct ContextPersistence {
    path: std::path::PathBuf,
}

impl ContextPersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 从 JSON 文件加载；文件不存在时返回空状态
    pub fn load(&self) -> anyhow::Result<ContextState> {
        if !self.path.exists() {
            return Ok(ContextState::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// 写入 JSON 文件；父目录不存在时自动创建
    pub fn save(&self, state: &ContextState) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }
}
