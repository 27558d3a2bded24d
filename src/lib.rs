//! Wasp - Rust 自主任务编排智能体
//!
//! 模块划分：
//! - **agent**: 无头运行时（process_query 入口，供 CLI / 上层前端调用）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 子目标数据模型与编排状态机（Process/Review/Retry/Next/Synthesize）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、结构化输出解码、速率限制
//! - **memory**: 会话记忆（永久日志、滑动窗口、滚动摘要、相似度索引）
//! - **planning**: Planner（子目标分解）、Reviewer（结果审查与重试决策）、Synthesizer（最终合成）
//! - **tools**: 能力工具（web_search、calculator、code_executor、document_summarizer）与路由、执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod planning;
pub mod tools;
