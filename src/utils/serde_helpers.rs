/// 宽松的字段反序列化辅助模块
///
/// 商品数据来自表单、电子表格和外部目录源，同一字段可能是数字、字符串或 null。

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 将 JSON 值按 `Number(x) || 0` 的规则转换为数字
pub fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(0.0)
            }
        }
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() { n } else { 0.0 }
}

/// 将 JSON 值转换为文本；null 和空值返回 None
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(format_number(n)),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn format_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// 数字字段：接受数字、数字字符串或 null
pub mod lenient_number {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce_number(&value))
    }
}

/// 可选数字字段，用于部分更新
pub mod lenient_number_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.filter(|v| !v.is_null()).map(|v| coerce_number(&v)))
    }
}

/// 文本字段：接受字符串、数字或 null
pub mod lenient_string {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce_text(&value).unwrap_or_default())
    }
}

/// 可选文本字段：数字和布尔值转成文本，null 和空串视为缺失
pub mod lenient_string_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(coerce_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_number_follows_js_truthiness() {
        assert_eq!(coerce_number(&json!(12.5)), 12.5);
        assert_eq!(coerce_number(&json!("42")), 42.0);
        assert_eq!(coerce_number(&json!("abc")), 0.0);
        assert_eq!(coerce_number(&json!(null)), 0.0);
        assert_eq!(coerce_number(&json!("")), 0.0);
    }

    #[test]
    fn test_coerce_text_formats_integral_numbers_without_fraction() {
        assert_eq!(coerce_text(&json!(1001)), Some("1001".to_string()));
        assert_eq!(coerce_text(&json!(1001.0)), Some("1001".to_string()));
        assert_eq!(coerce_text(&json!("")), None);
        assert_eq!(coerce_text(&json!(null)), None);
    }
}
