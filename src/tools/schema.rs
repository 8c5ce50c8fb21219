//! 工具参数 JSON Schema 生成（schemars）
//!
//! 由参数结构体派生 JsonSchema，注入 ToolSchema.parameters，减少模型生成错误参数。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 返回 T 的 JSON Schema；序列化失败时退回无约束对象
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}
