//! 记忆层：永久日志、滑动窗口、滚动摘要、相似度索引

pub mod index;
pub mod store;

pub use index::KeywordIndex;
pub use store::{ContextSections, MemoryStore, Message, Role};
