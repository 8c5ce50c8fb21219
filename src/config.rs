//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BEE__*` 覆盖（双下划线表示嵌套，如 `BEE__AGENT__REFLECT_ON_TOOL_USE=true`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::agent::{DEFAULT_DESCRIPTION, DEFAULT_SYSTEM_MESSAGE, DEFAULT_TOOL_CALL_SUMMARY_FORMAT};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub context: ContextSection,
}

/// [agent] 段：名称、描述、system 消息、反思与摘要模板
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub name: String,
    pub description: String,
    /// 空字符串表示不发送 system 消息
    pub system_message: Option<String>,
    pub reflect_on_tool_use: bool,
    /// 支持 {tool_name} / {arguments} / {result}
    pub tool_call_summary_format: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: "assistant".to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            system_message: Some(DEFAULT_SYSTEM_MESSAGE.to_string()),
            reflect_on_tool_use: false,
            tool_call_summary_format: DEFAULT_TOOL_CALL_SUMMARY_FORMAT.to_string(),
        }
    }
}

/// [context] 段：滑动窗口大小与状态文件
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ContextSection {
    /// 设置后使用 BufferedContext，只向模型发送最近 N 条
    pub buffer_size: Option<usize>,
    /// 上下文快照路径；设置后 CLI 启动时恢复、每回合后保存
    pub state_path: Option<PathBuf>,
}

/// 从 config 目录加载配置，环境变量 BEE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BEE__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BEE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置；调用方决定是否据此重建 Agent
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}
