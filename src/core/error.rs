//! Agent 错误类型
//!
//! 工具与审查层的失败在各自边界被折叠进子目标状态；只有规划失败与
//! 状态机级别的失败会沿 Result 向上传播，由顶层 process_query 统一转为用户可见文案。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（LLM、解析、工具、状态机上限等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 状态机总转移次数超过上限，整次运行失败（区别于普通的空/部分回答）
    #[error("Iteration limit exceeded after {0} transitions")]
    IterationLimitExceeded(usize),

    #[error("Config error: {0}")]
    ConfigError(String),
}
