//! 文档摘要工具
//!
//! is_url 时抓取 URL 并按内容类型抽取文本（PDF / HTML / 纯文本），否则把输入当作字面文本；
//! 抽取结果截断后交 LLM 摘要。失败以 Error 封套返回。

use std::sync::Arc;

use reqwest::Client;

use crate::core::ToolOutput;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::search::{html_to_text, looks_like_html, USER_AGENT};
use crate::tools::Tool;

const DOCUMENT_SUMMARIZER_INSTRUCTIONS: &str = "Summarize the document provided by the user. \
Preserve key figures, names, dates and conclusions. Be concise but complete.";

/// 按 MIME 类型抽取文档文本
fn extract_text(mime_type: &str, bytes: &[u8]) -> Result<String, String> {
    match mime_type {
        "application/pdf" => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| format!("PDF extraction failed: {}", e)),
        "text/html" => Ok(html_to_text(&String::from_utf8_lossy(bytes))),
        _ => {
            let text = String::from_utf8_lossy(bytes).to_string();
            if looks_like_html(&text) {
                Ok(html_to_text(&text))
            } else {
                Ok(text)
            }
        }
    }
}

/// 文档摘要工具：抓取 + 抽取 + LLM 摘要
pub struct DocumentSummarizerTool {
    client: Client,
    llm: Arc<dyn LlmClient>,
    max_chars: usize,
}

impl DocumentSummarizerTool {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64, max_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            llm,
            max_chars,
        }
    }

    async fn fetch_document(&self, url: &str) -> Result<String, String> {
        tracing::debug!(url = %url, "fetching document");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }

        let mime_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap_or("")
            .trim()
            .to_lowercase();

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| format!("Read body: {}", e))?;

        extract_text(&mime_type, &bytes)
    }

    async fn summarize(&self, query: &str, is_url: bool) -> ToolOutput {
        let text = if is_url {
            match self.fetch_document(query).await {
                Ok(t) => t,
                Err(e) => {
                    return ToolOutput::error(format!("Document summarization failed: {}", e))
                }
            }
        } else {
            query.to_string()
        };

        if text.trim().is_empty() {
            return ToolOutput::error("No relevant document found.");
        }

        let truncated: String = text.chars().take(self.max_chars).collect();
        let result = self
            .llm
            .complete(&[
                Message::system(DOCUMENT_SUMMARIZER_INSTRUCTIONS.to_string()),
                Message::user(truncated),
            ])
            .await;

        match result {
            Ok(summary) => ToolOutput::Text {
                query: query.to_string(),
                result: summary,
            },
            Err(e) => ToolOutput::error(format!("Document summarization failed: {}", e)),
        }
    }
}

#[async_trait::async_trait]
impl Tool for DocumentSummarizerTool {
    fn name(&self) -> &str {
        "document_summarizer"
    }

    fn description(&self) -> &str {
        "Summarizes documents, reports and articles. Input: a URL to fetch (is_url=true) or the text to summarize."
    }

    async fn run(&self, query: &str) -> Result<ToolOutput, String> {
        Ok(self.summarize(query, false).await)
    }

    async fn run_document(&self, query: &str, is_url: bool) -> Result<ToolOutput, String> {
        Ok(self.summarize(query, is_url).await)
    }
}
