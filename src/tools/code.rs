//! 代码执行工具
//!
//! 先由 LLM 将输入净化为单行、分号连接、无注释的 Python 语句，再以子进程执行（带超时）。
//! 净化后的代码含绘图调用时追加 savefig，将 PNG 以 data URI 内联为 Plot 封套；
//! 一切失败都折叠为 Error 封套而非向上抛出。

use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tokio::process::Command;

use crate::core::ToolOutput;
use crate::llm::schema::{decode_code, schema_block, SanitizedCode};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::Tool;

const CODE_SANITIZER_INSTRUCTIONS: &str = "Rewrite the user's request as runnable Python. \
Produce a single line of semicolon-joined statements with no comments and no markdown. \
Use print() for any value that should be reported. \
Respond with one JSON object matching this schema:\n{schema}";

/// 净化后的代码是否包含绘图调用（决定封套形态）
fn wants_plot(code: &str) -> bool {
    code.contains("plt.") || code.contains("pyplot") || code.contains("matplotlib")
}

/// 代码执行工具：LLM 净化 + Python 子进程
pub struct CodeExecutorTool {
    llm: Arc<dyn LlmClient>,
    python_bin: String,
    timeout_secs: u64,
}

impl CodeExecutorTool {
    pub fn new(llm: Arc<dyn LlmClient>, python_bin: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            llm,
            python_bin: python_bin.into(),
            timeout_secs,
        }
    }

    async fn sanitize(&self, code: &str) -> Result<String, String> {
        let system =
            CODE_SANITIZER_INSTRUCTIONS.replace("{schema}", &schema_block::<SanitizedCode>());
        let raw = self
            .llm
            .complete(&[Message::system(system), Message::user(code.to_string())])
            .await?;
        decode_code(&raw).map_err(|e| e.to_string())
    }

    /// 执行一段 Python；返回 stdout（失败时 Err 带 stderr）
    async fn execute_python(&self, code: &str) -> Result<String, String> {
        let mut cmd = Command::new(&self.python_bin);
        cmd.args(["-c", code]);

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| format!("Execution timed out after {}s", self.timeout_secs))?
        .map_err(|e| format!("Failed to start {}: {}", self.python_bin, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(format!("Exit {:?}\nstderr: {}", output.status, stderr.trim()));
        }
        Ok(stdout.trim_end().to_string())
    }

    fn plot_path() -> PathBuf {
        std::env::temp_dir().join(format!("wasp-plot-{}.png", uuid::Uuid::new_v4()))
    }
}

#[async_trait::async_trait]
impl Tool for CodeExecutorTool {
    fn name(&self) -> &str {
        "code_executor"
    }

    fn description(&self) -> &str {
        "Executes Python code for analysis and visualization. Input: the computation to perform."
    }

    async fn run(&self, query: &str) -> Result<ToolOutput, String> {
        let sanitized = match self.sanitize(query).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %e, "code sanitization failed");
                return Ok(ToolOutput::error(format!("Code execution failed: {}", e)));
            }
        };
        tracing::debug!(code = %sanitized, "sanitized code");

        if !wants_plot(&sanitized) {
            return match self.execute_python(&sanitized).await {
                Ok(stdout) => Ok(ToolOutput::Text {
                    query: sanitized,
                    result: stdout,
                }),
                Err(e) => Ok(ToolOutput::error(format!("Code execution failed: {}", e))),
            };
        }

        // 绘图路径：追加 savefig，将图片内联为 data URI
        let path = Self::plot_path();
        let code = format!(
            "{};import matplotlib.pyplot as plt;plt.savefig('{}')",
            sanitized,
            path.display()
        );
        let run_result = self.execute_python(&code).await;
        let image = std::fs::read(&path).ok();
        let _ = std::fs::remove_file(&path);

        match (run_result, image) {
            (Ok(stdout), Some(bytes)) => {
                let encoded = BASE64.encode(bytes);
                let display = format!(
                    "\n\n<img src='data:image/png;base64,{}' class='img-fluid'>\n\n",
                    encoded
                );
                Ok(ToolOutput::Plot {
                    query: sanitized,
                    result: stdout,
                    display,
                    data: Some(encoded),
                })
            }
            (Ok(stdout), None) => Ok(ToolOutput::Text {
                query: sanitized,
                result: stdout,
            }),
            (Err(e), _) => Ok(ToolOutput::error(format!("Code execution failed: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn plot_detection() {
        assert!(wants_plot("import matplotlib.pyplot as plt;plt.plot([1])"));
        assert!(wants_plot("from matplotlib import pyplot"));
        assert!(!wants_plot("print(1+1)"));
    }

    #[tokio::test]
    async fn sanitization_failure_becomes_error_envelope() {
        // 回复不是合法 JSON，解码失败应折叠为 Error 封套
        let mock = Arc::new(MockLlmClient::with_replies(["not json"]));
        let tool = CodeExecutorTool::new(mock, "python3", 5);
        let out = tool.run("whatever").await.expect("run");
        match out {
            ToolOutput::Error { message } => assert!(message.contains("Code execution failed")),
            other => panic!("expected error envelope, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_interpreter_becomes_error_envelope() {
        let mock = Arc::new(MockLlmClient::with_replies([r#"{"code": "print(1)"}"#]));
        let tool = CodeExecutorTool::new(mock, "definitely-not-a-python-binary", 5);
        let out = tool.run("print one").await.expect("run");
        assert!(out.is_error());
    }
}
