//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、结构化输出解码、速率限制

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod rate_limit;
pub mod schema;
pub mod traits;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use rate_limit::{RateLimiter, ThrottledClient};
pub use traits::LlmClient;
