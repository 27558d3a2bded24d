//! 子目标数据模型与单次运行状态
//!
//! Subgoal 由 Planner 批量创建，编排器/路由/审查在循环中原地修改，最终全部保留给 Synthesizer 读取。

use serde::{Deserialize, Serialize};

/// 工具结果封套：文本 / 图表 / 错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolOutput {
    Text {
        query: String,
        result: String,
    },
    Plot {
        query: String,
        result: String,
        /// 预渲染的展示片段（内联 <img>），与叙述文本分开合成
        display: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
    Error {
        message: String,
    },
}

impl ToolOutput {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// 送入审查的文本：文本结果用 result，图表/代码结果用执行过的 query（代码本身），错误用消息
    pub fn review_text(&self) -> &str {
        match self {
            Self::Text { result, .. } => result,
            Self::Plot { query, .. } => query,
            Self::Error { message } => message,
        }
    }

    /// 合成时的文本部分（图表的 result 是执行输出，同样可读）
    pub fn result_text(&self) -> &str {
        match self {
            Self::Text { result, .. } | Self::Plot { result, .. } => result,
            Self::Error { message } => message,
        }
    }

    /// 视觉片段：仅图表结果携带
    pub fn display_fragment(&self) -> Option<&str> {
        match self {
            Self::Plot { display, .. } => Some(display.as_str()),
            _ => None,
        }
    }
}

/// 子目标：一次查询分解出的最小工作单元
///
/// 不变量：order_number 自 1 起连续且唯一；retries 不超过配置上限；
/// completed 与 skipped 互斥；tool/query 只在首次路由或审查修订时被改写。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subgoal {
    /// 规划时确定的 1 起始序号，之后不再变化
    pub order_number: u32,
    pub description: String,
    /// 前置子目标的序号（字符串形式，与规划输出一致）
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// 首次路由时选定的工具名
    pub tool: Option<String>,
    /// 当前工具输入，审查可在重试时修订
    pub query: Option<String>,
    /// query 是否应按 URL 解释（仅 document_summarizer 关心）
    pub is_url: bool,
    pub completed: bool,
    pub skipped: bool,
    pub retries: u32,
    pub result: Option<ToolOutput>,
    /// 最近一次审查的反馈
    pub feedback: String,
}

impl Subgoal {
    /// 规划记录补全生命周期字段后的初始形态
    pub fn new(order_number: u32, description: impl Into<String>, depends_on: Vec<String>) -> Self {
        Self {
            order_number,
            description: description.into(),
            depends_on,
            tool: None,
            query: None,
            is_url: false,
            completed: false,
            skipped: false,
            retries: 0,
            result: None,
            feedback: String::new(),
        }
    }
}

/// 最终响应：叙述文本 + 可选的视觉片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResponse {
    pub content: String,
    pub display: Option<String>,
}

impl FinalResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            display: None,
        }
    }
}

/// 单次查询的可变上下文，由编排器独占修改
///
/// 不变量：current 始终处于 [0, subgoals.len()]，只会单调递增。
#[derive(Debug, Clone)]
pub struct AgentState {
    /// 原始查询，不变
    pub task: String,
    /// 带上下文前缀的增强查询，本次运行内不变
    pub query: String,
    /// 插入顺序即执行顺序
    pub subgoals: Vec<Subgoal>,
    /// 指向当前子目标的游标
    pub current: usize,
    /// 仅在终态填充
    pub final_response: Option<FinalResponse>,
}

impl AgentState {
    pub fn new(task: impl Into<String>, query: impl Into<String>, subgoals: Vec<Subgoal>) -> Self {
        Self {
            task: task.into(),
            query: query.into(),
            subgoals,
            current: 0,
            final_response: None,
        }
    }

    pub fn current_subgoal(&self) -> Option<&Subgoal> {
        self.subgoals.get(self.current)
    }

    pub fn current_subgoal_mut(&mut self) -> Option<&mut Subgoal> {
        self.subgoals.get_mut(self.current)
    }

    /// 游标前移一格（唯一的移动方式）
    pub fn advance(&mut self) {
        self.current += 1;
    }

    pub fn finished(&self) -> bool {
        self.current >= self.subgoals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_text_picks_code_for_plots() {
        let plot = ToolOutput::Plot {
            query: "import matplotlib.pyplot as plt;plt.plot([1,2])".into(),
            result: "".into(),
            display: "<img src='...'>".into(),
            data: None,
        };
        assert!(plot.review_text().starts_with("import"));

        let text = ToolOutput::Text {
            query: "q".into(),
            result: "r".into(),
        };
        assert_eq!(text.review_text(), "r");
        assert_eq!(ToolOutput::error("boom").review_text(), "boom");
    }

    #[test]
    fn display_fragment_only_for_plots() {
        let text = ToolOutput::Text {
            query: "q".into(),
            result: "r".into(),
        };
        assert!(text.display_fragment().is_none());
        assert!(!text.is_error());
        assert!(ToolOutput::error("x").is_error());
    }

    #[test]
    fn state_cursor_advances_to_finished() {
        let subgoals = vec![
            Subgoal::new(1, "a", vec![]),
            Subgoal::new(2, "b", vec!["1".into()]),
        ];
        let mut state = AgentState::new("t", "q", subgoals);
        assert_eq!(state.current_subgoal().map(|s| s.order_number), Some(1));
        state.advance();
        assert_eq!(state.current_subgoal().map(|s| s.order_number), Some(2));
        assert!(!state.finished());
        state.advance();
        assert!(state.finished());
        assert!(state.current_subgoal().is_none());
    }
}
