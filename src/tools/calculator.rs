//! 计算器工具
//!
//! 将自然语言算式交给代码执行工具求值，再把结果重新包成文本封套；
//! 与 code_executor 共享同一个执行器实例。

use std::sync::Arc;

use crate::core::ToolOutput;
use crate::tools::{CodeExecutorTool, Tool};

/// 计算器：内部委托代码执行
pub struct CalculatorTool {
    repl: Arc<CodeExecutorTool>,
}

impl CalculatorTool {
    pub fn new(repl: Arc<CodeExecutorTool>) -> Self {
        Self { repl }
    }
}

#[async_trait::async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Performs mathematical calculations like addition, subtraction, percentages etc. Input: the calculation in natural language or as an expression."
    }

    async fn run(&self, query: &str) -> Result<ToolOutput, String> {
        let output = self.repl.run(query).await?;
        match output {
            ToolOutput::Error { message } => Ok(ToolOutput::error(format!(
                "Calculation failed: {}",
                message
            ))),
            other => Ok(ToolOutput::Text {
                query: query.to_string(),
                result: other.result_text().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn delegation_failure_is_wrapped() {
        let mock = Arc::new(MockLlmClient::with_replies(["garbage, not json"]));
        let repl = Arc::new(CodeExecutorTool::new(mock, "python3", 5));
        let calc = CalculatorTool::new(repl);
        let out = calc.run("2 percent of 50").await.expect("run");
        match out {
            ToolOutput::Error { message } => assert!(message.starts_with("Calculation failed")),
            other => panic!("expected error envelope, got {:?}", other),
        }
    }
}
