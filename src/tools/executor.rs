//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool, query, is_url) 在超时内调用工具，
//! 未知工具 / 超时 / 执行失败一律折叠为 Error 封套——该边界永不向编排器抛出异常；
//! 每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::{AgentError, ToolOutput};
use crate::tools::ToolRegistry;

/// 工具执行器：对每次调用施加超时，并将一切失败映射为 Error 封套
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；输出 JSON 审计日志后返回结果封套（失败也以封套形式返回）
    pub async fn execute(&self, tool_name: &str, query: &str, is_url: bool) -> ToolOutput {
        let start = Instant::now();
        let result = self.dispatch(tool_name, query, is_url).await;

        let outcome = match &result {
            Ok(out) if !out.is_error() => "ok",
            Ok(_) => "error",
            Err(AgentError::ToolTimeout(_)) => "timeout",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "query_preview": preview(query),
            "is_url": is_url,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(output) => output,
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }

    async fn dispatch(
        &self,
        tool_name: &str,
        query: &str,
        is_url: bool,
    ) -> Result<ToolOutput, AgentError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| AgentError::UnknownTool(tool_name.to_string()))?;

        match timeout(self.timeout, tool.run_document(query, is_url)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e)),
            Err(_) => Err(AgentError::ToolTimeout(tool_name.to_string())),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.registry.tool_descriptions()
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn run(&self, _query: &str) -> Result<ToolOutput, String> {
            Err("boom".to_string())
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn run(&self, query: &str) -> Result<ToolOutput, String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ToolOutput::Text {
                query: query.to_string(),
                result: "never".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_envelope() {
        let executor = ToolExecutor::new(ToolRegistry::new(), 5);
        let out = executor.execute("ghost", "q", false).await;
        match out {
            ToolOutput::Error { message } => assert!(message.contains("ghost")),
            other => panic!("expected error envelope, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn tool_failure_becomes_error_envelope() {
        let mut registry = ToolRegistry::new();
        registry.register(FailingTool);
        let executor = ToolExecutor::new(registry, 5);
        let out = executor.execute("failing", "q", false).await;
        match out {
            ToolOutput::Error { message } => assert!(message.contains("boom")),
            other => panic!("expected error envelope, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_error_envelope() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let executor = ToolExecutor::new(registry, 1);
        let out = executor.execute("slow", "q", false).await;
        match out {
            ToolOutput::Error { message } => assert!(message.to_lowercase().contains("timeout")),
            other => panic!("expected error envelope, got {:?}", other),
        }
    }
}
