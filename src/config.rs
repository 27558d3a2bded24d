//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WASP__*` 覆盖（双下划线表示嵌套，如 `WASP__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [app] 段：应用名
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [agent] 段：重试上限、状态机迭代上限、记忆窗口与检索条数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 单个子目标的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 整个编排状态机的总转移次数上限（防止病态重试/跳过交织不收敛）
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
    /// 记忆滑动窗口保留的最近消息条数
    #[serde(default = "default_window_messages")]
    pub window_messages: usize,
    /// 相似度检索返回的历史消息条数
    #[serde(default = "default_search_k")]
    pub search_k: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            recursion_limit: default_recursion_limit(),
            window_messages: default_window_messages(),
            search_k: default_search_k(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_recursion_limit() -> usize {
    100
}

fn default_window_messages() -> usize {
    5
}

fn default_search_k() -> usize {
    3
}

/// [llm] 段：后端选择与速率限制
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub rate: RateSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            rate: RateSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

/// [llm.rate] 段：全进程共享的请求令牌桶
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateSection {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    #[serde(default = "default_max_bucket_size")]
    pub max_bucket_size: u32,
}

impl Default for RateSection {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            max_bucket_size: default_max_bucket_size(),
        }
    }
}

fn default_requests_per_second() -> f64 {
    10.0
}

fn default_max_bucket_size() -> u32 {
    10
}

/// [tools] 段：工具超时与各工具的专属配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub code: CodeSection,
    #[serde(default)]
    pub document: DocumentSection,
}

fn default_tool_timeout_secs() -> u64 {
    60
}

/// [tools.search] 段：抓取超时、结果大小、补充抓取的页面数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_search_timeout_secs(),
            max_result_chars: default_max_result_chars(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_max_result_chars() -> usize {
    8000
}

fn default_max_pages() -> usize {
    3
}

/// [tools.code] 段：解释器与执行超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodeSection {
    #[serde(default = "default_python_bin")]
    pub python_bin: String,
    #[serde(default = "default_code_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CodeSection {
    fn default() -> Self {
        Self {
            python_bin: default_python_bin(),
            timeout_secs: default_code_timeout_secs(),
        }
    }
}

fn default_python_bin() -> String {
    "python3".to_string()
}

fn default_code_timeout_secs() -> u64 {
    30
}

/// [tools.document] 段：文档抓取超时与送入摘要的最大字符数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentSection {
    #[serde(default = "default_document_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_document_max_chars")]
    pub max_chars: usize,
}

impl Default for DocumentSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_document_timeout_secs(),
            max_chars: default_document_max_chars(),
        }
    }
}

fn default_document_timeout_secs() -> u64 {
    20
}

fn default_document_max_chars() -> usize {
    24000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            agent: AgentSection::default(),
            tools: ToolsSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 WASP__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WASP__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WASP")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_limits() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_retries, 3);
        assert_eq!(cfg.agent.recursion_limit, 100);
        assert_eq!(cfg.agent.window_messages, 5);
        assert_eq!(cfg.agent.search_k, 3);
        assert_eq!(cfg.llm.provider, "deepseek");
    }

    #[test]
    fn load_from_explicit_file() {
        let mut f = tempfile::NamedTempFile::with_suffix(".toml").expect("tempfile");
        writeln!(
            f,
            "[agent]\nmax_retries = 1\nrecursion_limit = 7\n\n[llm]\nprovider = \"openai\"\n"
        )
        .expect("write");

        let cfg = load_config(Some(f.path().to_path_buf())).expect("load");
        assert_eq!(cfg.agent.max_retries, 1);
        assert_eq!(cfg.agent.recursion_limit, 7);
        assert_eq!(cfg.llm.provider, "openai");
        // 未覆盖的键保持默认
        assert_eq!(cfg.agent.window_messages, 5);
    }
}
