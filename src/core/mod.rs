//! 核心层：错误类型、子目标数据模型、编排状态机

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::AgentError;
pub use orchestrator::Orchestrator;
pub use state::{AgentState, FinalResponse, Subgoal, ToolOutput};
