//! 工具路由
//!
//! 将子目标文本与已注册工具名交给 LLM 选择工具并产出工具输入；
//! 无决策或工具名无法解析时回落 web_search + 原始子目标文本，LLM/解析异常向上传播。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::schema::{decode_route, schema_block, RouteReply};
use crate::llm::LlmClient;
use crate::memory::Message;

/// 路由失败时的兜底工具
pub const DEFAULT_TOOL: &str = "web_search";

const TOOL_ROUTING_INSTRUCTIONS: &str = "You select the single best tool for a subgoal. \
Available tools:\n{tools}\n\n\
Produce an improved, well-formed input for the selected tool. \
Set is_url to true only when the input is a URL the document_summarizer should fetch.\n\
Respond with one JSON object matching this schema:\n{schema}";

/// 工具路由器：持有 LLM，route 返回规范化后的决策
pub struct ToolRouter {
    llm: Arc<dyn LlmClient>,
}

impl ToolRouter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 为子目标选择工具并产出工具输入；tool_names 为注册表中的全部工具名。
    /// 工具名匹配大小写不敏感；解析不到决策或工具名未注册时回落默认搜索。
    pub async fn route(
        &self,
        subgoal_text: &str,
        tool_names: &[String],
    ) -> Result<RouteReply, AgentError> {
        let system = TOOL_ROUTING_INSTRUCTIONS
            .replace("{tools}", &tool_names.join(", "))
            .replace("{schema}", &schema_block::<RouteReply>());

        let raw = self
            .llm
            .complete(&[Message::system(system), Message::user(subgoal_text)])
            .await
            .map_err(AgentError::LlmError)?;

        let fallback = || RouteReply {
            selected_tool: DEFAULT_TOOL.to_string(),
            query: subgoal_text.to_string(),
            is_url: false,
        };

        let decision = match decode_route(&raw)? {
            Some(d) => d,
            None => {
                tracing::warn!("no tool decision received, defaulting to {}", DEFAULT_TOOL);
                return Ok(fallback());
            }
        };

        let resolved = tool_names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(&decision.selected_tool));

        match resolved {
            Some(name) => Ok(RouteReply {
                selected_tool: name.clone(),
                query: if decision.query.trim().is_empty() {
                    subgoal_text.to_string()
                } else {
                    decision.query
                },
                is_url: decision.is_url,
            }),
            None => {
                tracing::warn!(
                    tool = %decision.selected_tool,
                    "selected tool not registered, defaulting to {}",
                    DEFAULT_TOOL
                );
                Ok(fallback())
            }
        }
    }
}
