//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / run），由 ToolRegistry 按名注册与查找（大小写不敏感）。
//! 注册表固定而小：四个能力工具，无运行时发现机制。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::ToolOutput;

/// 工具 trait：名称、描述（供 LLM 理解）、按查询执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（路由决策中的 "selected_tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 执行工具，返回结果封套；Err 在执行器边界被折叠为 Error 封套
    async fn run(&self, query: &str) -> Result<ToolOutput, String>;

    /// 扩展签名：query 可能是 URL。默认忽略标志退回 run，仅文档工具覆盖。
    async fn run_document(&self, query: &str, _is_url: bool) -> Result<ToolOutput, String> {
        self.run(query).await
    }
}

/// 工具注册表：按小写名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    /// 注册共享实例（calculator 与 code_executor 复用同一个代码执行器时用）
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_lowercase();
        self.tools.insert(name, tool);
    }

    /// 大小写不敏感查找
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(&name.to_lowercase()).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 返回 (name, description) 列表，用于生成路由指令中的工具清单
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        let mut list: Vec<(String, String)> = self
            .tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect();
        list.sort();
        list
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
