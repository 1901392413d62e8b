use crate::domain::model::{RequirementRecord, Severity};
use crate::utils::error::{ExtractorError, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

const REQUIREMENT_KEYS: [&str; 5] = ["requirement", "text", "description", "statement", "title"];
const SEVERITY_KEYS: [&str; 3] = ["severity", "priority", "level"];
const CATEGORY_KEYS: [&str; 3] = ["category", "type", "discipline"];
const RATIONALE_KEYS: [&str; 4] = ["rationale", "reason", "justification", "notes"];
const SOURCE_KEYS: [&str; 4] = ["source", "reference", "section", "page"];

/// 盡力從模型輸出中取出需求陣列並做欄位修正
pub fn parse_model_output(raw: &str, default_source: &str) -> Result<Vec<RequirementRecord>> {
    let body = strip_code_fence(raw);

    let value = candidate_slices(body)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<Value>(candidate.trim()).ok())
        .or_else(|| salvage_truncated_array(body))
        .ok_or_else(|| ExtractorError::ParseError {
            message: format!("no JSON found in model output ({} chars)", raw.len()),
        })?;

    let items = record_values(value)?;
    Ok(items
        .iter()
        .filter_map(|item| coerce_record(item, default_source))
        .collect())
}

fn strip_code_fence(raw: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z]*\s*\n?(.*?)```").expect("static fence pattern")
    });

    fence
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
}

fn candidate_slices(body: &str) -> Vec<&str> {
    let mut candidates = vec![body];
    if let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) {
        if start < end {
            candidates.push(&body[start..=end]);
        }
    }
    if let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) {
        if start < end {
            candidates.push(&body[start..=end]);
        }
    }
    candidates
}

// max_tokens 截斷時陣列沒有結尾，退回到最後一個完整物件
fn salvage_truncated_array(body: &str) -> Option<Value> {
    let start = body.find('[')?;
    let mut end = body.len();
    // 只在 '[' 之後找 '}'
    while let Some(close) = body[start..end].rfind('}').map(|i| start + i) {
        let candidate = format!("{}]", &body[start..=close]);
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            tracing::warn!("Model output was truncated; salvaged a partial requirement list");
            return Some(value);
        }
        end = close;
    }
    None
}

fn record_values(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => {
            if let Some(Value::Array(items)) = object.remove("requirements") {
                return Ok(items);
            }
            if first_string(&object, &REQUIREMENT_KEYS).is_some() {
                return Ok(vec![Value::Object(object)]);
            }
            Err(ExtractorError::ParseError {
                message: "JSON object has no 'requirements' array".to_string(),
            })
        }
        other => Err(ExtractorError::ParseError {
            message: format!("expected a JSON array, got {}", json_type(&other)),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 把任意 JSON 值轉成需求紀錄；沒有需求文字的丟棄
pub fn coerce_record(value: &Value, default_source: &str) -> Option<RequirementRecord> {
    let object = match value {
        Value::Object(object) => object.clone(),
        Value::String(text) => {
            let mut object = Map::new();
            object.insert("requirement".to_string(), Value::String(text.clone()));
            object
        }
        _ => return None,
    };

    let requirement = first_string(&object, &REQUIREMENT_KEYS)?;

    let severity = first_string(&object, &SEVERITY_KEYS)
        .map(|label| Severity::from_label(&label))
        .unwrap_or(Severity::Medium);
    let category =
        first_string(&object, &CATEGORY_KEYS).unwrap_or_else(|| "General".to_string());
    let rationale = first_string(&object, &RATIONALE_KEYS).unwrap_or_default();
    let source =
        first_string(&object, &SOURCE_KEYS).unwrap_or_else(|| default_source.to_string());

    Some(RequirementRecord {
        id: String::new(),
        severity,
        category,
        requirement,
        rationale,
        source,
    })
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .filter_map(value_to_text)
        .find(|text| !text.is_empty())
}

fn value_to_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null | Value::Object(_) => return None,
    };
    Some(text)
}

/// 去重用的正規化：小寫、非英數字元壓成單一空白
pub fn normalize_key(text: &str) -> String {
    let mut key = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_space && !key.is_empty() {
                key.push(' ');
            }
            pending_space = false;
            key.push(c);
        } else {
            pending_space = true;
        }
    }
    key
}

/// 保留第一次出現的需求，回傳 (結果, 移除數量)
pub fn dedupe_requirements(records: Vec<RequirementRecord>) -> (Vec<RequirementRecord>, usize) {
    let mut seen = HashSet::new();
    let before = records.len();
    let unique: Vec<_> = records
        .into_iter()
        .filter(|record| seen.insert(normalize_key(&record.requirement)))
        .collect();
    let removed = before - unique.len();
    (unique, removed)
}

pub fn renumber(records: &mut [RequirementRecord]) {
    for (index, record) in records.iter_mut().enumerate() {
        record.id = format!("REQ-{:03}", index + 1);
    }
}
