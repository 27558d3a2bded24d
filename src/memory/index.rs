//! 相似度索引：按关键词重叠检索历史消息
//!
//! 无真实向量，按小写词集合的交集大小打分；由 MemoryStore 独占持有，随消息写入同步更新。

use std::collections::HashSet;

use crate::memory::Message;

/// 将文本切分为小写词集合，用于简单相似度（词重叠数）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 1)
        .collect()
}

/// 关键词索引：(消息, 词集合) 顺序存储
#[derive(Debug, Default)]
pub struct KeywordIndex {
    entries: Vec<(Message, HashSet<String>)>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 索引一条消息；空内容忽略
    pub fn insert(&mut self, message: Message) {
        if message.content.trim().is_empty() {
            return;
        }
        let tokens = tokenize_lower(&message.content);
        self.entries.push((message, tokens));
    }

    /// 按查询检索最相关的 k 条消息，分数为查询词与消息词的交集大小，0 分不返回
    pub fn search(&self, query: &str, k: usize) -> Vec<Message> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(usize, &Message)> = self
            .entries
            .iter()
            .map(|(msg, tokens)| (query_tokens.intersection(tokens).count(), msg))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(k).map(|(_, m)| m.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Role;

    #[test]
    fn search_ranks_by_overlap() {
        let mut index = KeywordIndex::new();
        index.insert(Message::new(Role::User, "apple banana cherry"));
        index.insert(Message::new(Role::User, "apple banana"));
        index.insert(Message::new(Role::User, "unrelated words here"));

        let hits = index.search("apple banana cherry pie", 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "apple banana cherry");
        assert_eq!(hits[1].content, "apple banana");
    }

    #[test]
    fn zero_overlap_returns_nothing() {
        let mut index = KeywordIndex::new();
        index.insert(Message::new(Role::User, "apple banana"));
        assert!(index.search("zebra", 3).is_empty());
        assert!(index.search("", 3).is_empty());
    }

    #[test]
    fn empty_content_is_not_indexed() {
        let mut index = KeywordIndex::new();
        index.insert(Message::new(Role::User, "   "));
        assert!(index.is_empty());
    }

    #[test]
    fn punctuation_is_stripped_from_tokens() {
        let mut index = KeywordIndex::new();
        index.insert(Message::new(Role::User, "NPV: 12000, rate 0.10"));
        let hits = index.search("what is the npv", 1);
        assert_eq!(hits.len(), 1);
    }
}
