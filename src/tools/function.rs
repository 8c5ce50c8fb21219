//! 闭包工具：把任意异步函数注册为工具

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use schemars::JsonSchema;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::tools::{schema::parameters_schema, Tool};

type ToolFn =
    dyn Fn(Value, CancellationToken) -> BoxFuture<'static, Result<Value, String>> + Send + Sync;

/// 由闭包实现的工具；参数 schema 可由 with_parameters::<T>() 从类型派生
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Option<Value>,
    func: Arc<ToolFn>,
}

impl FunctionTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
            func: Arc::new(move |args, cancel| Box::pin(func(args, cancel))),
        }
    }

    pub fn with_parameters<T: JsonSchema>(mut self) -> Self {
        self.parameters = Some(parameters_schema::<T>());
        self
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        match &self.parameters {
            Some(p) => p.clone(),
            None => serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(&self, args: Value, cancel: CancellationToken) -> Result<Value, String> {
        (self.func)(args, cancel).await
    }
}
