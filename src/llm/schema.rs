//! 结构化输出解码
//!
//! LLM 返回的 JSON 存在字段拼写/大小写/加粗包裹等变体，这里做一次容错解码，
//! 内部代码只见到规范结构。解码失败统一转 AgentError::JsonParseError。
//! schema_block 将规范结构的 JSON Schema 渲染进指令文本，约束 LLM 输出格式。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;

/// 规划输出中的单条子目标记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanRecord {
    /// 1 起始的执行序号
    pub order_number: u32,
    pub description: String,
    /// 前置子目标的序号列表（字符串）
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// 规划输出：subgoals 为 None 表示服务判定无法分解
#[derive(Debug, Clone)]
pub struct PlanReply {
    pub subgoals: Option<Vec<PlanRecord>>,
    pub explanation: String,
}

/// 规划输出的规范形态（仅用于向 LLM 渲染 schema）
#[derive(Debug, Serialize, JsonSchema)]
pub struct PlanDoc {
    pub subgoals: Vec<PlanRecord>,
    pub explanation: String,
}

/// 工具路由决策
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteReply {
    /// 从已注册工具名中选出的工具
    pub selected_tool: String,
    /// 传给所选工具的输入
    pub query: String,
    /// query 是否为 URL（document_summarizer 按此决定抓取或直接摘要）
    pub is_url: bool,
}

/// 审查裁决
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewReply {
    /// 子目标是否已成功完成
    pub completed: bool,
    /// 改进输出的反馈意见
    pub feedback: String,
    /// 是否需要重试
    pub retry: bool,
    /// 重试时使用的修订输入；无修订时为 null
    pub query: Option<String>,
    /// 修订输入是否为 URL
    pub is_url: bool,
}

/// 代码净化输出：单行、分号连接、无注释的语句序列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SanitizedCode {
    pub code: String,
}

/// 渲染某个规范结构的 JSON Schema（嵌入指令文本用）
pub fn schema_block<T: JsonSchema>() -> String {
    let schema = schemars::gen::SchemaGenerator::default().into_root_schema_for::<T>();
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}

/// 从 LLM 输出中提取 JSON 对象（```json 围栏或首个 { .. 末个 }）
pub fn extract_json(output: &str) -> Result<Value, AgentError> {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim())
    } else if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            &trimmed[start..=end]
        } else {
            trimmed
        }
    } else {
        trimmed
    };

    serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))
}

/// 键规范化：去掉包裹的 * 与空白、转小写，"**Tool**" 与 "tool" 等价
fn normalize_key(key: &str) -> String {
    key.trim().trim_matches('*').trim().to_lowercase()
}

/// 在对象中按一组同义键名查找字段（规范化后比较）
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    for name in names {
        if let Some(v) = obj.get(*name) {
            return Some(v);
        }
    }
    for (key, v) in obj {
        let normalized = normalize_key(key);
        if names.iter().any(|n| normalized == *n) {
            return Some(v);
        }
    }
    None
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, AgentError> {
    value
        .as_object()
        .ok_or_else(|| AgentError::JsonParseError(format!("expected object, got: {}", value)))
}

fn string_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_of(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn decode_plan_record(value: &Value) -> Result<PlanRecord, AgentError> {
    let obj = as_object(value)?;

    let order_number = field(obj, &["order_number", "order"])
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        })
        .ok_or_else(|| AgentError::JsonParseError(format!("subgoal missing order_number: {}", value)))?;

    let description = field(obj, &["description"])
        .and_then(string_of)
        .ok_or_else(|| AgentError::JsonParseError(format!("subgoal missing description: {}", value)))?;

    let depends_on = field(obj, &["depends_on", "dependencies"])
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(string_of).collect())
        .unwrap_or_default();

    Ok(PlanRecord {
        order_number: order_number as u32,
        description,
        depends_on,
    })
}

/// 解码规划输出：null / "null" / 空串 哨兵表示无法分解，空数组表示可直接作答
pub fn decode_plan(raw: &str) -> Result<PlanReply, AgentError> {
    let value = extract_json(raw)?;
    let obj = as_object(&value)?;

    let explanation = field(obj, &["explanation", "reasoning"])
        .and_then(string_of)
        .unwrap_or_default();

    let subgoals = match field(obj, &["subgoals"]) {
        None | Some(Value::Null) => None,
        Some(Value::String(_)) => None,
        Some(Value::Array(items)) => {
            let records = items
                .iter()
                .map(decode_plan_record)
                .collect::<Result<Vec<_>, _>>()?;
            Some(records)
        }
        Some(other) => {
            return Err(AgentError::JsonParseError(format!(
                "unexpected subgoals value: {}",
                other
            )))
        }
    };

    Ok(PlanReply {
        subgoals,
        explanation,
    })
}

/// 解码路由决策；selected_tool 缺失或为空视为「无决策」，由调用方回落默认工具
pub fn decode_route(raw: &str) -> Result<Option<RouteReply>, AgentError> {
    let value = extract_json(raw)?;
    let obj = as_object(&value)?;

    let selected_tool = match field(obj, &["selected_tool", "tool", "tool_name", "toolname"])
        .and_then(string_of)
    {
        Some(t) if !t.trim().is_empty() => t.trim().to_string(),
        _ => return Ok(None),
    };

    let query = field(obj, &["query", "input"])
        .and_then(string_of)
        .unwrap_or_default();

    let is_url = field(obj, &["is_url", "url"])
        .and_then(bool_of)
        .unwrap_or(false);

    Ok(Some(RouteReply {
        selected_tool,
        query,
        is_url,
    }))
}

/// 解码审查裁决；缺失字段按宽松默认补齐（completed 默认 true）
pub fn decode_review(raw: &str) -> Result<ReviewReply, AgentError> {
    let value = extract_json(raw)?;
    let obj = as_object(&value)?;

    let completed = field(obj, &["completed"]).and_then(bool_of).unwrap_or(true);
    let feedback = field(obj, &["feedback"])
        .and_then(string_of)
        .unwrap_or_default();
    let retry = field(obj, &["retry"]).and_then(bool_of).unwrap_or(false);
    let query = field(obj, &["query", "input"]).and_then(string_of);
    let is_url = field(obj, &["is_url", "url"])
        .and_then(bool_of)
        .unwrap_or(false);

    Ok(ReviewReply {
        completed,
        feedback,
        retry,
        query,
        is_url,
    })
}

/// 解码净化后的代码
pub fn decode_code(raw: &str) -> Result<String, AgentError> {
    let value = extract_json(raw)?;
    let obj = as_object(&value)?;
    field(obj, &["code"])
        .and_then(string_of)
        .ok_or_else(|| AgentError::JsonParseError(format!("missing code field: {}", value)))
}
