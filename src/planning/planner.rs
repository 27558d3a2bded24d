//! Planner：将复杂查询分解为有序、带依赖标注的子目标
//!
//! 一次结构化 LLM 请求，区分三种结果：无法分解（哨兵）、可直接作答（空列表）、子目标列表。
//! 传输/解析失败不在这里吞掉，向上传播由顶层转为用户文案。

use std::sync::Arc;

use crate::core::{AgentError, Subgoal};
use crate::llm::schema::{decode_plan, schema_block, PlanDoc, PlanRecord};
use crate::llm::LlmClient;
use crate::memory::Message;

const PLANNING_INSTRUCTIONS: &str = "Today is {date}. You decompose a user query into an ordered \
list of subgoals, each solvable by one of these tools: web_search, calculator, code_executor, \
document_summarizer.\n\
Rules:\n\
- Number subgoals from 1 in execution order; list prerequisite order numbers in depends_on.\n\
- If the provided context already answers the query, return an empty subgoals list.\n\
- If the query cannot be broken into actionable steps, return null for subgoals.\n\
Respond with one JSON object matching this schema:\n{schema}";

/// 规划结果：无法分解 / 直接作答 / 子目标计划
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    /// 服务判定无法分解，调用方给出固定致歉文案
    Unplannable,
    /// 显式空列表：仅凭上下文即可作答，不需要工具
    Direct,
    /// 一个或多个子目标，已补全生命周期字段
    Plan {
        subgoals: Vec<Subgoal>,
        explanation: String,
    },
}

/// 任务规划器
pub struct TaskPlanner {
    llm: Arc<dyn LlmClient>,
}

impl TaskPlanner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 分解查询；context 可为空串
    pub async fn plan(&self, query: &str, context: &str) -> Result<PlanOutcome, AgentError> {
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let system = PLANNING_INSTRUCTIONS
            .replace("{date}", &date)
            .replace("{schema}", &schema_block::<PlanDoc>());
        let payload = format!("Query: {}\n\nContext: {}", query, context);

        let raw = self
            .llm
            .complete(&[Message::system(system), Message::user(payload)])
            .await
            .map_err(AgentError::LlmError)?;

        let reply = decode_plan(&raw)?;
        match reply.subgoals {
            None => Ok(PlanOutcome::Unplannable),
            Some(records) if records.is_empty() => Ok(PlanOutcome::Direct),
            Some(records) => Ok(PlanOutcome::Plan {
                subgoals: into_subgoals(records),
                explanation: reply.explanation,
            }),
        }
    }
}

/// 规划记录转子目标：按序号排序并补全生命周期字段
fn into_subgoals(mut records: Vec<PlanRecord>) -> Vec<Subgoal> {
    records.sort_by_key(|r| r.order_number);

    let contiguous = records
        .iter()
        .enumerate()
        .all(|(i, r)| r.order_number as usize == i + 1);
    if !contiguous {
        tracing::warn!("subgoal order numbers are not contiguous from 1");
    }

    records
        .into_iter()
        .map(|r| Subgoal::new(r.order_number, r.description, r.depends_on))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn null_sentinel_is_unplannable() {
        let mock = Arc::new(MockLlmClient::with_replies([
            r#"{"subgoals": null, "explanation": "cannot decompose"}"#,
        ]));
        let planner = TaskPlanner::new(mock);
        let outcome = planner.plan("gibberish", "").await.expect("plan");
        assert!(matches!(outcome, PlanOutcome::Unplannable));
    }

    #[tokio::test]
    async fn empty_list_means_direct_answer() {
        let mock = Arc::new(MockLlmClient::with_replies([
            r#"{"subgoals": [], "explanation": "context is sufficient"}"#,
        ]));
        let planner = TaskPlanner::new(mock);
        let outcome = planner
            .plan("what did we compute", "NPV was 12000")
            .await
            .expect("plan");
        assert!(matches!(outcome, PlanOutcome::Direct));
    }

    #[tokio::test]
    async fn records_become_initialized_subgoals() {
        let mock = Arc::new(MockLlmClient::with_replies([
            r#"{"subgoals": [
                {"order_number": 2, "description": "compute npv", "depends_on": ["1"]},
                {"order_number": 1, "description": "find discount rate", "depends_on": []}
            ], "explanation": "rate first"}"#,
        ]));
        let planner = TaskPlanner::new(mock);
        let outcome = planner.plan("npv?", "").await.expect("plan");
        match outcome {
            PlanOutcome::Plan {
                subgoals,
                explanation,
            } => {
                assert_eq!(subgoals.len(), 2);
                // 按序号排序
                assert_eq!(subgoals[0].order_number, 1);
                assert_eq!(subgoals[1].depends_on, vec!["1".to_string()]);
                // 生命周期字段初始化
                assert!(!subgoals[0].completed);
                assert_eq!(subgoals[0].retries, 0);
                assert!(subgoals[0].result.is_none());
                assert_eq!(explanation, "rate first");
            }
            other => panic!("expected plan, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn llm_failure_propagates() {
        let mock = Arc::new(MockLlmClient::new());
        let planner = TaskPlanner::new(mock);
        let err = planner.plan("q", "").await.expect_err("should fail");
        assert!(matches!(err, AgentError::LlmError(_)));
    }

    #[tokio::test]
    async fn unparseable_reply_propagates() {
        let mock = Arc::new(MockLlmClient::with_replies(["I think you should..."]));
        let planner = TaskPlanner::new(mock);
        let err = planner.plan("q", "").await.expect_err("should fail");
        assert!(matches!(err, AgentError::JsonParseError(_)));
    }
}
