//! Web 搜索工具
//!
//! DuckDuckGo Instant Answer API（免 Key）取即时答案与相关链接，再抓取若干结果页
//! 用 html2text 提取可读文本，最后由 LLM 按查询浓缩为一段检索结论。
//! 传输失败按运行时错误向上返回（由执行器折叠为 Error 封套）。

use std::sync::Arc;

use html2text::from_read;
use reqwest::Client;
use serde_json::Value;

use crate::core::ToolOutput;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::Tool;

const DDG_API_URL: &str = "https://api.duckduckgo.com/";

const WEB_SEARCH_INSTRUCTIONS: &str = "Today is {today}. Using only the search results provided \
by the user, write a concise, factual answer to the query: {query}\n\
Cite source URLs inline where relevant. If the results do not answer the query, say so.";

/// 简易去除 HTML 标签（html2text 失败时的回退）
pub(crate) fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut prev_whitespace = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => {
                let is_whitespace = c.is_whitespace();
                if is_whitespace && prev_whitespace {
                    continue;
                }
                prev_whitespace = is_whitespace;
                out.push(if is_whitespace { ' ' } else { c });
            }
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// 判断内容是否像 HTML（需提取可读文本）
pub(crate) fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

/// 将 HTML 转为可读文本（去除 script/style 等）
pub(crate) fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_html_tags(html),
    }
}

/// 浏览器 UA，避免被站点拒绝
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// 从即时答案 JSON 中整理文本段落与候选 URL
fn format_instant_answer(body: &Value) -> (String, Vec<String>) {
    let mut sections = Vec::new();
    let mut urls = Vec::new();

    let abstract_text = body["AbstractText"].as_str().unwrap_or("");
    if !abstract_text.is_empty() {
        let source = body["AbstractSource"].as_str().unwrap_or("");
        sections.push(format!("Summary ({}): {}", source, abstract_text));
    }
    if let Some(url) = body["AbstractURL"].as_str() {
        if !url.is_empty() {
            urls.push(url.to_string());
        }
    }

    if let Some(answer) = body["Answer"].as_str() {
        if !answer.is_empty() {
            sections.push(format!("Instant Answer: {}", answer));
        }
    }

    if let Some(definition) = body["Definition"].as_str() {
        if !definition.is_empty() {
            sections.push(format!("Definition: {}", definition));
        }
    }

    if let Some(topics) = body["RelatedTopics"].as_array() {
        let mut lines = Vec::new();
        for topic in topics.iter().take(10) {
            let text = topic["Text"].as_str().unwrap_or("");
            let url = topic["FirstURL"].as_str().unwrap_or("");
            if !text.is_empty() {
                lines.push(format!("- {} ({})", text, url));
            }
            if !url.is_empty() {
                urls.push(url.to_string());
            }
        }
        if !lines.is_empty() {
            sections.push(format!("Related Topics:\n{}", lines.join("\n")));
        }
    }

    (sections.join("\n\n"), urls)
}

/// Web 搜索工具：即时答案 + 结果页抓取 + LLM 浓缩
pub struct WebSearchTool {
    client: Client,
    llm: Arc<dyn LlmClient>,
    max_pages: usize,
    max_result_chars: usize,
}

impl WebSearchTool {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        timeout_secs: u64,
        max_result_chars: usize,
        max_pages: usize,
    ) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            llm,
            max_pages,
            max_result_chars,
        }
    }

    /// 抓取单个结果页并截断
    async fn fetch_page(&self, url: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;

        let text = if looks_like_html(&body) {
            html_to_text(&body)
        } else {
            body
        };

        if text.chars().count() > self.max_result_chars {
            Ok(text.chars().take(self.max_result_chars).collect::<String>() + "\n...[truncated]")
        } else {
            Ok(text)
        }
    }

    async fn condense(&self, query: &str, results: &str) -> Result<String, String> {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let system = WEB_SEARCH_INSTRUCTIONS
            .replace("{today}", &today)
            .replace("{query}", query);
        self.llm
            .complete(&[Message::system(system), Message::user(results.to_string())])
            .await
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web for real-time information, news and market data. Input: a search query."
    }

    async fn run(&self, query: &str) -> Result<ToolOutput, String> {
        tracing::info!(query = %query, "web search");

        let resp = self
            .client
            .get(DDG_API_URL)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| format!("Web search failed: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("Web search failed: HTTP {}", resp.status()));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("Web search failed: {}", e))?;

        let (instant, urls) = format_instant_answer(&body);
        let mut results = Vec::new();
        if !instant.is_empty() {
            results.push(instant);
        }

        for url in urls.iter().take(self.max_pages) {
            match self.fetch_page(url).await {
                Ok(text) => results.push(format!("URL: {}\n{}", url, text)),
                Err(e) => tracing::debug!(url = %url, error = %e, "result page fetch failed"),
            }
        }

        if results.is_empty() {
            results.push("(no search results)".to_string());
        }

        let condensed = self
            .condense(query, &results.join("\n\n"))
            .await
            .map_err(|e| format!("Web search failed: {}", e))?;

        Ok(ToolOutput::Text {
            query: query.to_string(),
            result: condensed,
        })
    }
}
