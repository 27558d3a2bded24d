//! Synthesizer：把所有完成的子目标结果合成为一个连贯回答
//!
//! 图表结果的展示片段与叙述文本分开返回；未完成/被跳过的子目标静默排除。
//! 合成失败不向上抛，折叠为致歉文本。

use std::sync::Arc;

use crate::core::{AgentError, AgentState, FinalResponse};
use crate::llm::LlmClient;
use crate::memory::{MemoryStore, Message};

const SYNTHESIS_INSTRUCTIONS: &str = "You write the final answer to the user's query using the \
subgoal results and context provided. Answer the query directly and coherently; do not mention \
the internal steps. If the results are insufficient, answer as best you can from context.";

/// 响应合成器
#[derive(Clone)]
pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 终态合成：收集完成的子目标，分离视觉片段，LLM 产出叙述文本
    pub async fn synthesize(&self, state: &AgentState, memory: &MemoryStore) -> FinalResponse {
        let mut text_results = Vec::new();
        let mut visuals = Vec::new();

        for subgoal in &state.subgoals {
            if !subgoal.completed {
                continue;
            }
            let Some(result) = &subgoal.result else {
                continue;
            };
            match result.display_fragment() {
                Some(fragment) => visuals.push(fragment.to_string()),
                None => text_results.push(format!(
                    "Context: {}\nResult: {}",
                    subgoal.description,
                    result.result_text()
                )),
            }
        }

        let context = historical_context(memory, &state.query);

        match self
            .compose(&state.query, &context, &text_results.join("\n\n"))
            .await
        {
            Ok(content) => FinalResponse {
                content,
                display: if visuals.is_empty() {
                    None
                } else {
                    Some(visuals.join("\n\n"))
                },
            },
            Err(e) => {
                tracing::error!(error = %e, "synthesis failed");
                FinalResponse::text(format!("Error synthesizing response: {}", e))
            }
        }
    }

    /// 直接作答路径（规划返回空列表时）：没有子目标结果，仅凭上下文
    pub async fn respond_directly(&self, query: &str, context: &str) -> Result<String, AgentError> {
        self.compose(query, context, "").await
    }

    async fn compose(
        &self,
        query: &str,
        context: &str,
        results: &str,
    ) -> Result<String, AgentError> {
        let payload = format!("Query: {}\n\nContext: {}\n\nResults:\n{}", query, context, results);
        self.llm
            .complete(&[
                Message::system(SYNTHESIS_INSTRUCTIONS.to_string()),
                Message::user(payload),
            ])
            .await
            .map_err(AgentError::LlmError)
    }
}

/// 记忆中的相关历史上下文段落（为空时返回空串）
fn historical_context(memory: &MemoryStore, query: &str) -> String {
    let messages = memory.relevant_context(query);
    if messages.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = messages.iter().map(Message::render).collect();
    format!("Relevant Historical Context:\n{}", lines.join("\n"))
}
