//! 无头 Agent 运行时
//!
//! 供 CLI / 上层前端调用的唯一入口 process_query：记录记忆 -> 规划 -> 编排循环 -> 合成 -> 写回记忆。
//! 这里是用户可见错误文案的唯一产生点；下层组件的失败在各自边界降级，不会让进程崩溃。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{AgentState, FinalResponse, Orchestrator};
use crate::llm::{
    create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient, RateLimiter, ThrottledClient,
};
use crate::memory::{MemoryStore, Message, Role};
use crate::planning::{PlanOutcome, Synthesizer, TaskPlanner, TaskReviewer};
use crate::tools::{
    CalculatorTool, CodeExecutorTool, DocumentSummarizerTool, ToolExecutor, ToolRegistry,
    ToolRouter, WebSearchTool,
};

const UNPLANNABLE_MESSAGE: &str =
    "I couldn't break down your query into actionable steps. Could you please rephrase it?";

const CLARIFICATION_NOTE: &str = "\n\nI may not have fully answered your query. Please let me \
know if you need clarification or want to try a different approach.";

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
pub(crate) fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    // 有 DeepSeek Key 或（配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点）
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .or_else(|| Some(cfg.llm.model.clone()))
            .unwrap_or_else(|| "deepseek-chat".to_string());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(Some(&model)))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let base = cfg.llm.base_url.as_deref();
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            base,
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}

/// 固定的四工具注册表；calculator 与 code_executor 共享同一个代码执行器实例
pub fn default_registry(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> ToolRegistry {
    let code = Arc::new(CodeExecutorTool::new(
        llm.clone(),
        cfg.tools.code.python_bin.clone(),
        cfg.tools.code.timeout_secs,
    ));

    let mut tools = ToolRegistry::new();
    tools.register(WebSearchTool::new(
        llm.clone(),
        cfg.tools.search.timeout_secs,
        cfg.tools.search.max_result_chars,
        cfg.tools.search.max_pages,
    ));
    tools.register(CalculatorTool::new(code.clone()));
    tools.register_arc(code);
    tools.register(DocumentSummarizerTool::new(
        llm,
        cfg.tools.document.timeout_secs,
        cfg.tools.document.max_chars,
    ));
    tools
}

/// 任务编排 Agent：持有规划/编排/合成组件与会话记忆
pub struct TaskAgent {
    planner: TaskPlanner,
    synthesizer: Synthesizer,
    orchestrator: Orchestrator,
    memory: MemoryStore,
    session_id: uuid::Uuid,
}

impl TaskAgent {
    /// 注入 LLM 与工具注册表构造（测试与嵌入场景）
    pub fn new(cfg: &AppConfig, llm: Arc<dyn LlmClient>, tools: ToolRegistry) -> Self {
        let synthesizer = Synthesizer::new(llm.clone());
        let orchestrator = Orchestrator::new(
            ToolRouter::new(llm.clone()),
            ToolExecutor::new(tools, cfg.tools.tool_timeout_secs),
            TaskReviewer::new(llm.clone()),
            synthesizer.clone(),
            cfg.agent.max_retries,
            cfg.agent.recursion_limit,
        );
        Self {
            planner: TaskPlanner::new(llm.clone()),
            synthesizer,
            orchestrator,
            memory: MemoryStore::new(llm, cfg.agent.window_messages, cfg.agent.search_k),
            session_id: uuid::Uuid::new_v4(),
        }
    }

    /// 从配置构造：选择 LLM 后端，套上全进程共享的令牌桶，装配默认工具
    pub fn from_config(cfg: &AppConfig) -> Self {
        let base = create_llm_from_config(cfg);
        let limiter = Arc::new(RateLimiter::new(
            cfg.llm.rate.requests_per_second,
            cfg.llm.rate.max_bucket_size,
        ));
        let llm: Arc<dyn LlmClient> = Arc::new(ThrottledClient::new(base, limiter));
        let tools = default_registry(cfg, llm.clone());
        Self::new(cfg, llm, tools)
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// 处理一条用户查询，返回最终响应；所有内部错误都映射为用户可读文案
    pub async fn process_query(&mut self, query: &str) -> FinalResponse {
        let query = query.trim();
        if query.is_empty() {
            return FinalResponse::text("Please provide a non-empty query.");
        }
        tracing::info!(session = %self.session_id, "processing query");

        self.memory.record(Role::User, query).await;

        let context = self.memory.relevant_context(query);
        let context_str = if context.is_empty() {
            String::new()
        } else {
            format!(
                "\n\nPrevious relevant context:\n{}",
                context
                    .iter()
                    .map(Message::render)
                    .collect::<Vec<_>>()
                    .join("\n")
            )
        };

        let outcome = match self.planner.plan(query, &context_str).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "task planning failed");
                return FinalResponse::text(format!(
                    "I encountered an error while planning how to answer your query: {}",
                    e
                ));
            }
        };

        match outcome {
            PlanOutcome::Unplannable => FinalResponse::text(UNPLANNABLE_MESSAGE),
            PlanOutcome::Direct => {
                tracing::info!("no subgoals generated, answering directly from context");
                match self.synthesizer.respond_directly(query, &context_str).await {
                    Ok(content) => {
                        self.memory.record(Role::Assistant, content.clone()).await;
                        FinalResponse::text(content)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "direct answer failed");
                        FinalResponse::text(format!(
                            "I encountered an error while processing your request: {}. \
                             Please try rephrasing your question.",
                            e
                        ))
                    }
                }
            }
            PlanOutcome::Plan {
                subgoals,
                explanation,
            } => {
                tracing::info!(
                    count = subgoals.len(),
                    explanation = %explanation,
                    "created subgoals for query"
                );
                let state = AgentState::new(
                    query,
                    format!("Context:{}\n\nQuery:{}", context_str, query),
                    subgoals,
                );

                match self.orchestrator.run(state, &self.memory).await {
                    Ok(final_state) => {
                        let mut response = final_state
                            .final_response
                            .unwrap_or_else(|| FinalResponse::text(""));
                        if response.content.to_lowercase().contains("error") {
                            tracing::warn!(content = %response.content, "potentially problematic response");
                            response.content.push_str(CLARIFICATION_NOTE);
                            response.display = None;
                        }
                        self.memory
                            .record(Role::Assistant, response.content.clone())
                            .await;
                        response
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "workflow execution failed");
                        FinalResponse::text(format!(
                            "I encountered an error while processing your request: {}. \
                             Please try rephrasing your question.",
                            e
                        ))
                    }
                }
            }
        }
    }
}
