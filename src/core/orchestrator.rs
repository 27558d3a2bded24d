//! 编排状态机：子目标生命周期的主控循环
//!
//! Process -> Review -> {Retry -> Review | Next} -> {Process | Synthesize}。
//! Process 解析依赖、拼装复合查询、路由并执行工具；Review 审查后由纯函数 decide 选择转移；
//! Retry 递增计数，达到上限强制 completed=false + skipped=true 且不再调用工具；
//! 整个循环受总转移次数上限保护，超限是整次运行的致命错误。
//!
//! 顺序不变量：游标只会递增，低序号子目标总是先被重试至成功或耗尽，
//! 因此依赖检查在到达时一次判定即可，无需事后复查。

use crate::core::{AgentError, AgentState, Subgoal, ToolOutput};
use crate::memory::{ContextSections, MemoryStore, Message};
use crate::planning::{decide, Synthesizer, TaskReviewer, Verdict};
use crate::tools::{ToolExecutor, ToolRouter, DEFAULT_TOOL};

/// 状态机节点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Process,
    Review,
    Retry,
    Next,
    Synthesize,
}

/// 编排器：驱动子目标循环直到合成终态
pub struct Orchestrator {
    router: ToolRouter,
    executor: ToolExecutor,
    reviewer: TaskReviewer,
    synthesizer: Synthesizer,
    max_retries: u32,
    recursion_limit: usize,
}

impl Orchestrator {
    pub fn new(
        router: ToolRouter,
        executor: ToolExecutor,
        reviewer: TaskReviewer,
        synthesizer: Synthesizer,
        max_retries: u32,
        recursion_limit: usize,
    ) -> Self {
        Self {
            router,
            executor,
            reviewer,
            synthesizer,
            max_retries,
            recursion_limit,
        }
    }

    /// 运行状态机至终态；超过转移上限返回 IterationLimitExceeded
    pub async fn run(
        &self,
        mut state: AgentState,
        memory: &MemoryStore,
    ) -> Result<AgentState, AgentError> {
        let mut step = if state.subgoals.is_empty() {
            Step::Synthesize
        } else {
            Step::Process
        };
        let mut transitions = 0usize;

        loop {
            transitions += 1;
            if transitions > self.recursion_limit {
                tracing::error!(limit = self.recursion_limit, "iteration limit exceeded");
                return Err(AgentError::IterationLimitExceeded(self.recursion_limit));
            }

            step = match step {
                Step::Process => {
                    self.process_subgoal(&mut state, memory).await;
                    Step::Review
                }
                Step::Review => {
                    self.reviewer.review(&mut state).await;
                    match state.current_subgoal() {
                        Some(sub) if decide(sub, self.max_retries) == Verdict::Retry => Step::Retry,
                        _ => Step::Next,
                    }
                }
                Step::Retry => {
                    self.retry_subgoal(&mut state).await;
                    Step::Review
                }
                Step::Next => {
                    state.advance();
                    tracing::info!(
                        current = state.current,
                        total = state.subgoals.len(),
                        "moving to next subgoal"
                    );
                    if state.finished() {
                        Step::Synthesize
                    } else {
                        Step::Process
                    }
                }
                Step::Synthesize => {
                    let response = self.synthesizer.synthesize(&state, memory).await;
                    state.final_response = Some(response);
                    return Ok(state);
                }
            };
        }
    }

    /// 处理当前子目标：依赖检查 -> 复合查询 -> 路由 -> 执行 -> 写回
    ///
    /// 执行成功先临时标记 completed=true，最终完成态由审查裁决改写；
    /// 路由失败或工具返回 Error 封套时 completed=false，审查照常进行。
    async fn process_subgoal(&self, state: &mut AgentState, memory: &MemoryStore) {
        let idx = state.current;
        let Some(sub) = state.subgoals.get(idx) else {
            return;
        };
        let description = sub.description.clone();
        tracing::debug!(subgoal = %description, index = idx, "processing subgoal");

        let prerequisites = match collect_dependencies(&state.subgoals, idx) {
            Some(pairs) => pairs,
            None => {
                if let Some(sub) = state.subgoals.get_mut(idx) {
                    sub.skipped = true;
                }
                tracing::info!(subgoal = %description, "prerequisite incomplete, skipping subgoal");
                return;
            }
        };

        let memory_block = format_memory_context(&memory.context_sections(&description));
        let composite = composite_query(&memory_block, &prerequisites, &description);

        let tool_names = self.executor.tool_names();
        match self.router.route(&composite, &tool_names).await {
            Ok(decision) => {
                if let Some(sub) = state.subgoals.get_mut(idx) {
                    sub.tool = Some(decision.selected_tool.clone());
                    sub.query = Some(decision.query.clone());
                    sub.is_url = decision.is_url;
                }
                let output = self
                    .executor
                    .execute(&decision.selected_tool, &decision.query, decision.is_url)
                    .await;
                let failed = output.is_error();
                if let Some(sub) = state.subgoals.get_mut(idx) {
                    sub.completed = !failed;
                    sub.result = Some(output);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, subgoal = %description, "routing failed");
                if let Some(sub) = state.subgoals.get_mut(idx) {
                    sub.completed = false;
                    sub.result = Some(ToolOutput::error(e.to_string()));
                }
            }
        }
    }

    /// 重试当前子目标：递增计数；到达上限则永久跳过（不再调用工具），
    /// 否则用审查可能修订过的 tool/query 重新执行
    async fn retry_subgoal(&self, state: &mut AgentState) {
        let idx = state.current;
        let Some(sub) = state.subgoals.get_mut(idx) else {
            return;
        };

        sub.retries += 1;
        if sub.retries >= self.max_retries {
            sub.completed = false;
            sub.skipped = true;
            tracing::warn!(
                subgoal = %sub.description,
                retries = sub.retries,
                "max retries reached for subgoal"
            );
            return;
        }

        let tool = sub.tool.clone().unwrap_or_else(|| DEFAULT_TOOL.to_string());
        let query = sub.query.clone().unwrap_or_else(|| sub.description.clone());
        let is_url = sub.is_url;
        tracing::debug!(subgoal = %sub.description, retry = sub.retries, "retrying subgoal");

        let output = self.executor.execute(&tool, &query, is_url).await;
        if let Some(sub) = state.subgoals.get_mut(idx) {
            sub.result = Some(output);
        }
    }
}

/// 收集当前子目标的前置结果；任一前置未完成返回 None（调用方据此跳过）。
/// 只在低序号子目标中查找，依赖后续子目标的标注被忽略。
fn collect_dependencies(subgoals: &[Subgoal], idx: usize) -> Option<Vec<(String, String)>> {
    let current = subgoals.get(idx)?;
    let mut results = Vec::new();
    for prev in &subgoals[..idx] {
        let referenced = current
            .depends_on
            .iter()
            .any(|d| d.trim() == prev.order_number.to_string());
        if !referenced {
            continue;
        }
        if !prev.completed {
            return None;
        }
        let text = prev
            .result
            .as_ref()
            .map(|r| r.result_text().to_string())
            .unwrap_or_default();
        results.push((prev.description.clone(), text));
    }
    Some(results)
}

/// 记忆上下文分段渲染：摘要 / Recent Context / Related Historical Context，空段省略
fn format_memory_context(sections: &ContextSections) -> String {
    let mut parts = Vec::new();
    if let Some(summary) = &sections.summary {
        parts.push(summary.clone());
    }
    if !sections.recent.is_empty() {
        let lines: Vec<String> = sections.recent.iter().map(Message::render).collect();
        parts.push(format!("Recent Context:\n{}", lines.join("\n")));
    }
    if !sections.related.is_empty() {
        let lines: Vec<String> = sections.related.iter().map(Message::render).collect();
        parts.push(format!("Related Historical Context:\n{}", lines.join("\n")));
    }
    parts.join("\n\n")
}

/// 复合查询：记忆上下文 + 前置结果（description: result 行）+ 当前子目标描述
fn composite_query(
    memory_block: &str,
    prerequisites: &[(String, String)],
    description: &str,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !memory_block.is_empty() {
        parts.push(format!("memory_context: {}", memory_block));
    }
    for (desc, result) in prerequisites {
        parts.push(format!("{}: {}", desc, result));
    }
    let mut composite = parts.join("\n\n");
    composite.push_str(&format!("\n\nCurrent Subgoal: {}", description));
    composite
}
