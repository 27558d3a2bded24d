//! Agent 端到端流程测试：脚本化 Mock LLM + 计数型测试工具

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wasp::agent::TaskAgent;
use wasp::config::AppConfig;
use wasp::core::ToolOutput;
use wasp::llm::MockLlmClient;
use wasp::memory::Role;
use wasp::tools::{Tool, ToolRegistry};

/// 计数型测试工具：记录收到的每个查询，固定返回文本
struct RecordingTool {
    calls: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<String>>>,
    reply: String,
}

#[async_trait::async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "test stub"
    }

    async fn run(&self, query: &str) -> Result<ToolOutput, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        Ok(ToolOutput::Text {
            query: query.to_string(),
            result: self.reply.clone(),
        })
    }
}

struct Harness {
    agent: TaskAgent,
    mock: Arc<MockLlmClient>,
    tool_calls: Arc<AtomicUsize>,
    tool_queries: Arc<Mutex<Vec<String>>>,
}

fn harness<const N: usize>(cfg: AppConfig, replies: [&str; N], tool_reply: &str) -> Harness {
    let mock = Arc::new(MockLlmClient::with_replies(replies));
    let tool_calls = Arc::new(AtomicUsize::new(0));
    let tool_queries = Arc::new(Mutex::new(Vec::new()));

    let mut tools = ToolRegistry::new();
    tools.register(RecordingTool {
        calls: tool_calls.clone(),
        queries: tool_queries.clone(),
        reply: tool_reply.to_string(),
    });

    let agent = TaskAgent::new(&cfg, mock.clone(), tools);
    Harness {
        agent,
        mock,
        tool_calls,
        tool_queries,
    }
}

const REVIEW_OK: &str =
    r#"{"completed": true, "feedback": "good", "retry": false, "query": null, "is_url": false}"#;

#[tokio::test]
async fn direct_answer_bypasses_tool_execution() {
    // 规划返回空列表：上下文足以作答，不触碰任何工具
    let mut h = harness(
        AppConfig::default(),
        [
            r#"{"subgoals": [], "explanation": "context is sufficient"}"#,
            "NPV is 12000 at a 10% discount rate.",
        ],
        "unused",
    );

    let response = h
        .agent
        .process_query(
            "Calculate NPV with investment 100000, cashflows [30000,40000,50000], rate 0.10",
        )
        .await;

    assert_eq!(response.content, "NPV is 12000 at a 10% discount rate.");
    assert!(response.display.is_none());
    assert_eq!(h.tool_calls.load(Ordering::SeqCst), 0);

    // 人类与助手两条消息都进入了永久日志
    let history = h.agent.memory().chat_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
}

#[tokio::test]
async fn two_step_plan_feeds_prerequisite_results_forward() {
    let mut h = harness(
        AppConfig::default(),
        [
            // 规划：第 2 步依赖第 1 步
            r#"{"subgoals": [
                {"order_number": 1, "description": "find the discount rate", "depends_on": []},
                {"order_number": 2, "description": "compute the npv", "depends_on": ["1"]}
            ], "explanation": "rate first, then compute"}"#,
            r#"{"selected_tool": "web_search", "query": "current discount rate", "is_url": false}"#,
            REVIEW_OK,
            r#"{"selected_tool": "web_search", "query": "npv from rate", "is_url": false}"#,
            REVIEW_OK,
            "The NPV is positive.",
        ],
        "the rate is 10%",
    );

    let response = h.agent.process_query("what is the npv of this project").await;

    assert_eq!(response.content, "The NPV is positive.");
    assert_eq!(h.tool_calls.load(Ordering::SeqCst), 2);

    // 第 2 个子目标的路由请求里能看到第 1 步的结果
    assert!(h
        .mock
        .calls()
        .iter()
        .any(|c| c.contains("find the discount rate: the rate is 10%")));
    let queries = h.tool_queries.lock().unwrap();
    assert_eq!(queries.as_slice(), ["current discount rate", "npv from rate"]);
}

#[tokio::test]
async fn failed_first_subgoal_skips_its_dependant() {
    let mut cfg = AppConfig::default();
    cfg.agent.max_retries = 1;

    let mut h = harness(
        cfg,
        [
            r#"{"subgoals": [
                {"order_number": 1, "description": "fetch the report", "depends_on": []},
                {"order_number": 2, "description": "summarize findings", "depends_on": ["1"]}
            ], "explanation": "fetch then summarize"}"#,
            r#"{"selected_tool": "web_search", "query": "annual report", "is_url": false}"#,
            // 审查判定未完成，重试一次后耗尽
            r#"{"completed": false, "feedback": "result does not contain the report", "retry": true, "query": null, "is_url": false}"#,
            "Nothing useful could be gathered.",
        ],
        "irrelevant text",
    );

    let response = h.agent.process_query("summarize the annual report").await;

    assert_eq!(response.content, "Nothing useful could be gathered.");
    // 只有第 1 个子目标的首次执行，依赖方未触发工具
    assert_eq!(h.tool_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.mock.remaining(), 0);
}

#[tokio::test]
async fn error_looking_synthesis_gets_clarification_note() {
    let mut h = harness(
        AppConfig::default(),
        [
            r#"{"subgoals": [
                {"order_number": 1, "description": "one step", "depends_on": []}
            ], "explanation": "single step"}"#,
            r#"{"selected_tool": "web_search", "query": "something", "is_url": false}"#,
            REVIEW_OK,
            "Error: upstream data was unavailable.",
        ],
        "partial data",
    );

    let response = h.agent.process_query("fetch the data").await;
    assert!(response.content.starts_with("Error: upstream data was unavailable."));
    assert!(response.content.contains("clarification"));
    assert!(response.display.is_none());
}

#[tokio::test]
async fn unplannable_query_gets_fixed_apology() {
    let mut h = harness(
        AppConfig::default(),
        [r#"{"subgoals": null, "explanation": "cannot decompose"}"#],
        "unused",
    );

    let response = h.agent.process_query("asdf qwerty").await;
    assert!(response.content.contains("couldn't break down your query"));
    assert_eq!(h.tool_calls.load(Ordering::SeqCst), 0);
    // 失败回复不写入助手记忆
    assert_eq!(h.agent.memory().chat_history().len(), 1);
}

#[tokio::test]
async fn planner_transport_failure_becomes_planning_error_message() {
    // 空回复队列：规划调用直接失败
    let mut h = harness(AppConfig::default(), [], "unused");

    let response = h.agent.process_query("anything at all").await;
    assert!(response
        .content
        .starts_with("I encountered an error while planning"));
    assert_eq!(h.tool_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn iteration_cap_surfaces_as_distinct_error() {
    let mut cfg = AppConfig::default();
    cfg.agent.recursion_limit = 2;

    let mut h = harness(
        cfg,
        [
            r#"{"subgoals": [
                {"order_number": 1, "description": "one step", "depends_on": []}
            ], "explanation": "single step"}"#,
            r#"{"selected_tool": "web_search", "query": "q", "is_url": false}"#,
            REVIEW_OK,
        ],
        "data",
    );

    let response = h.agent.process_query("do the thing").await;
    assert!(response.content.contains("Iteration limit exceeded"));
}

#[tokio::test]
async fn empty_query_is_rejected_without_llm_calls() {
    let mut h = harness(AppConfig::default(), [], "unused");
    let response = h.agent.process_query("   ").await;
    assert!(response.content.contains("non-empty"));
    assert!(h.mock.calls().is_empty());
    assert!(h.agent.memory().chat_history().is_empty());
}
