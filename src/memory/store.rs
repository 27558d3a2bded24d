//! 会话记忆存储
//!
//! 四块状态：只增的永久日志、N 条滑动窗口、滚动摘要（窗口溢出时整体重写）、相似度索引。
//! 所有失败都在公开方法内捕获并记日志，永远返回可用的最佳上下文或静默跳过更新。

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;
use crate::memory::KeywordIndex;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// 上下文行中的角色标签
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "human",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// "role: content" 形式的一行渲染
    pub fn render(&self) -> String {
        format!("{}: {}", self.role.label(), self.content)
    }
}

/// 相关上下文的分组视图：摘要 / 最近窗口 / 相似历史
#[derive(Debug, Clone, Default)]
pub struct ContextSections {
    pub summary: Option<String>,
    pub recent: Vec<Message>,
    pub related: Vec<Message>,
}

impl ContextSections {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.recent.is_empty() && self.related.is_empty()
    }
}

/// 会话记忆：一个会话一个实例，跨多次查询存活
pub struct MemoryStore {
    summarizer: Arc<dyn LlmClient>,
    /// 永久日志，只增
    log: Vec<Message>,
    /// 最近 N 条消息，溢出时先摘要再逐出最旧一条
    window: VecDeque<Message>,
    /// 滚动摘要，每次溢出整体重写
    summary: String,
    index: KeywordIndex,
    window_size: usize,
    search_k: usize,
}

impl MemoryStore {
    pub fn new(summarizer: Arc<dyn LlmClient>, window_size: usize, search_k: usize) -> Self {
        Self {
            summarizer,
            log: Vec::new(),
            window: VecDeque::new(),
            summary: String::new(),
            index: KeywordIndex::new(),
            window_size: window_size.max(1),
            search_k,
        }
    }

    /// 记录一条消息：追加日志与窗口，必要时重写摘要并逐出最旧窗口项，最后进索引。
    /// 摘要重写失败时保留旧摘要（软失败）。
    pub async fn record(&mut self, role: Role, content: impl Into<String>) {
        let message = Message::new(role, content);
        self.log.push(message.clone());

        self.window.push_back(message.clone());
        if self.window.len() > self.window_size {
            match self.summarize_window().await {
                Ok(summary) if !summary.trim().is_empty() => {
                    self.summary = summary.trim().to_string();
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "summary regeneration failed, keeping previous summary");
                }
            }
            self.window.pop_front();
        }

        self.index.insert(message);
    }

    /// 以 LLM 将当前窗口内容并入既有摘要
    async fn summarize_window(&self) -> Result<String, String> {
        let mut prompt = String::from("Summarize the following conversation");
        if !self.summary.is_empty() {
            prompt.push_str(", incorporating this previous summary:\n");
            prompt.push_str(&self.summary);
            prompt.push_str("\n\nNew messages:");
        }
        prompt.push('\n');
        for msg in &self.window {
            prompt.push_str(&msg.render());
            prompt.push('\n');
        }
        prompt.push_str("\nProvide a concise summary that preserves key information and context.");

        self.summarizer.complete(&[Message::user(prompt)]).await
    }

    /// 相关上下文的分组视图：摘要 + 窗口（时间序）+ 去重后的相似历史
    pub fn context_sections(&self, text: &str) -> ContextSections {
        let recent: Vec<Message> = self.window.iter().cloned().collect();

        let related: Vec<Message> = self
            .index
            .search(text, self.search_k)
            .into_iter()
            .filter(|hit| !recent.contains(hit))
            .collect();

        ContextSections {
            summary: if self.summary.is_empty() {
                None
            } else {
                Some(format!("Previous conversation summary: {}", self.summary))
            },
            recent,
            related,
        }
    }

    /// 扁平的相关上下文序列：摘要（system 角色）→ 窗口 → 相似历史，无重复条目
    pub fn relevant_context(&self, text: &str) -> Vec<Message> {
        let sections = self.context_sections(text);
        let mut messages = Vec::new();
        if let Some(summary) = sections.summary {
            messages.push(Message::system(summary));
        }
        messages.extend(sections.recent);
        for related in sections.related {
            if !messages.contains(&related) {
                messages.push(related);
            }
        }
        messages
    }

    /// 完整对话历史（永久日志）
    pub fn chat_history(&self) -> &[Message] {
        &self.log
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}
