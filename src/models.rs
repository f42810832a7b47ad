//! 外部系统值对象
//!
//! 发票 / 采购单 / 对账结果 / 支付请求与结果。构造后不可变，
//! 仅作为 WorkflowState 内嵌数据随 checkpoint 持久化，不单独存储。
//! 字段名刻意不含 PII（演示数据安全），金额统一为美元 f64，比较容差 0.01。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ERP / 应付系统中的发票
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// 发票唯一标识
    pub invoice_id: String,
    /// 供应商标识
    pub vendor_id: String,
    #[serde(default)]
    pub vendor_name: String,
    /// 总金额（美元）
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub line_items: Vec<Value>,
    #[serde(default = "default_invoice_status")]
    pub status: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_invoice_status() -> String {
    "pending".to_string()
}

/// 采购单（匹配目标）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub po_id: String,
    #[serde(default)]
    pub vendor_id: String,
    /// 采购单总额（美元）
    pub total_amount: f64,
    #[serde(default = "default_po_status")]
    pub status: String,
    #[serde(default)]
    pub line_items: Vec<Value>,
}

fn default_po_status() -> String {
    "open".to_string()
}

/// 发票与采购单的匹配结果
///
/// match_score 取值：1.0（供应商且金额均匹配）/ 0.5（其余找到记录的情况，
/// 不区分哪一侧不匹配）/ 0.0（发票或采购单不存在）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub invoice_id: String,
    pub po_id: String,
    /// 0-1 匹配置信度
    pub match_score: f64,
    pub amount_match: bool,
    pub message: String,
}

/// 支付执行请求（HITL 审批的对象）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub invoice_id: String,
    pub amount_usd: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub vendor_id: String,
    #[serde(default)]
    pub reference: String,
}

/// 支付执行结果（paid / cancelled）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// "paid" 或 "cancelled"
    pub status: String,
    pub invoice_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    /// 支付凭证号（PAY-{invoice_id}-{4 位随机数}）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// HITL 审批前展示的支付摘要（审计用，不含 PII）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub invoice_id: String,
    pub amount_usd: f64,
    pub currency: String,
    pub requires_approval: bool,
    pub approval_threshold_usd: f64,
}
