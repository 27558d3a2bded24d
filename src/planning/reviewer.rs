//! Reviewer：审查子目标结果并决定重试或前进
//!
//! review 将当前子目标的结果交 LLM 裁决并原地改写（completed / feedback / query / is_url，
//! 无论 retry 标志如何都改写）；LLM 失败时记日志、保持子目标原状，不向外抛。
//! decide 是纯状态转移函数，不触碰 LLM，任何情况下都能给出 Retry / Continue。

use std::sync::Arc;

use crate::core::{AgentError, AgentState, Subgoal};
use crate::llm::schema::{decode_review, schema_block, ReviewReply};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::DEFAULT_TOOL;

const REVIEW_INSTRUCTIONS: &str = "Today is {date}. You judge whether a tool result fulfils its \
subgoal. If the result is incomplete or wrong, set retry=true and produce a revised query for the \
same tool; set is_url when the revised query is a URL. Leave query null when no revision helps.\n\
Respond with one JSON object matching this schema:\n{schema}";

/// 重试决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Retry,
    Continue,
}

/// 纯状态转移：由刚审查过的子目标决定重试或前进
///
/// - skipped 直接前进
/// - 未完成且 is_url 且反馈未提及 error：抓取成功但内容不相关，不值得重试
/// - 未完成且重试次数未到上限：重试
/// - 其余情况（完成 / 重试耗尽）：前进
pub fn decide(subgoal: &Subgoal, max_retries: u32) -> Verdict {
    if subgoal.skipped {
        return Verdict::Continue;
    }
    if !subgoal.completed {
        if subgoal.is_url && !subgoal.feedback.to_lowercase().contains("error") {
            tracing::info!(
                subgoal = %subgoal.description,
                "fetched content was irrelevant, not retrying"
            );
            return Verdict::Continue;
        }
        if subgoal.retries < max_retries {
            return Verdict::Retry;
        }
        tracing::warn!(
            subgoal = %subgoal.description,
            retries = subgoal.retries,
            "max retries reached, not retrying"
        );
    }
    Verdict::Continue
}

/// 任务审查器
pub struct TaskReviewer {
    llm: Arc<dyn LlmClient>,
}

impl TaskReviewer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 审查当前子目标并原地改写；skipped 的子目标完全跳过
    pub async fn review(&self, state: &mut AgentState) {
        let (description, tool, query, result_text) = match state.current_subgoal() {
            Some(sub) if !sub.skipped => (
                sub.description.clone(),
                sub.tool.clone().unwrap_or_else(|| DEFAULT_TOOL.to_string()),
                sub.query.clone().unwrap_or_default(),
                sub.result
                    .as_ref()
                    .map(|r| r.review_text().to_string())
                    .unwrap_or_default(),
            ),
            _ => return,
        };
        tracing::info!(subgoal = %description, "reviewing subgoal");

        match self.judge(&description, &tool, &query, &result_text).await {
            Ok(reply) => {
                if let Some(sub) = state.current_subgoal_mut() {
                    sub.completed = reply.completed;
                    sub.feedback = reply.feedback;
                    if let Some(revised) = reply.query {
                        sub.query = Some(revised);
                    }
                    sub.is_url = reply.is_url;
                    tracing::debug!(
                        completed = sub.completed,
                        feedback = %sub.feedback,
                        "subgoal after review"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, subgoal = %description, "review failed, leaving subgoal unreviewed");
            }
        }
    }

    async fn judge(
        &self,
        subgoal: &str,
        tool: &str,
        query: &str,
        result: &str,
    ) -> Result<ReviewReply, AgentError> {
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let system = REVIEW_INSTRUCTIONS
            .replace("{date}", &date)
            .replace("{schema}", &schema_block::<ReviewReply>());
        let payload = format!(
            "Subgoal: {}\nTool: {}\nTool input: {}\nResult: {}",
            subgoal, tool, query, result
        );

        let raw = self
            .llm
            .complete(&[Message::system(system), Message::user(payload)])
            .await
            .map_err(AgentError::LlmError)?;
        decode_review(&raw)
    }
}
