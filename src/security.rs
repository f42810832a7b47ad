//! 安全：对外响应与日志的 PII 脱敏
//!
//! 对 JSON 任意嵌套深度的对象 / 数组递归处理，命中 PII 键名的值替换为占位符。
//! 所有离开 HTTP 边界的 payload（成功或失败路径）都必须先过 redact_pii。

use serde_json::Value;

/// 需要脱敏的键名（供应商税号、银行账户、邮箱）
pub const PII_KEYS: [&str; 4] = ["vendor_tax_id", "bank_account", "vendor_email", "buyer_email"];

/// 脱敏占位符
pub const REDACT_PLACEHOLDER: &str = "[REDACTED]";

/// 递归脱敏：对象键命中 PII_KEYS 时整值替换，数组逐元素处理，标量原样返回
pub fn redact_pii(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    if PII_KEYS.contains(&k.as_str()) {
                        (k, Value::String(REDACT_PLACEHOLDER.to_string()))
                    } else {
                        (k, redact_pii(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_pii).collect()),
        other => other,
    }
}
