//! 工具层：Tool trait、合并注册表（工具 + Handoff）、并发执行器

pub mod echo;
pub mod executor;
pub mod function;
pub mod handoff;
pub mod registry;
pub mod schema;

pub use echo::EchoTool;
pub use executor::{ToolExecutionError, ToolExecutor};
pub use function::FunctionTool;
pub use handoff::{detect_handoff, Handoff, HandoffMatch, HandoffTool};
pub use registry::{Tool, ToolRegistry};
pub use schema::parameters_schema;
