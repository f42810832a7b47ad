//! 工具层：对账所需的外部系统调用（typed in/out）
//!
//! 所有工具实现 ReconTools trait（fetch / match / pay / summary），
//! 生产环境替换为真实 ERP 与支付 API 实现，演示与测试用 MockErp。
//! 工具失败以 ToolError 返回，由 worker 的重试包装器做自我纠错。

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::ToolError;
use crate::models::{Invoice, PaymentOutcome, PaymentRequest, PaymentSummary, ReconciliationResult};

pub use mock::MockErp;

/// fetch_pending_invoices 的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchInvoicesInput {
    /// 按供应商过滤，缺省取全部
    #[serde(default)]
    pub vendor_id: Option<String>,
    /// 最多返回的发票数
    #[serde(default = "default_fetch_limit")]
    pub limit: usize,
}

fn default_fetch_limit() -> usize {
    10
}

/// match_invoice_to_po 的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchInvoiceInput {
    /// 待匹配的发票
    pub invoice_id: String,
    /// 匹配目标采购单
    pub po_id: String,
}

/// 对账工具集：按名分方法暴露，trait 边界便于测试替身与真实后端切换
#[async_trait]
pub trait ReconTools: Send + Sync {
    /// 从 ERP 拉取待处理发票（可选供应商过滤）
    async fn fetch_pending_invoices(
        &self,
        input: FetchInvoicesInput,
    ) -> Result<Vec<Invoice>, ToolError>;

    /// 将发票匹配到采购单，返回匹配分与金额是否一致
    async fn match_invoice_to_po(
        &self,
        input: MatchInvoiceInput,
    ) -> Result<ReconciliationResult, ToolError>;

    /// 执行支付；未批准时不产生副作用，返回 cancelled 结果
    async fn execute_payment(
        &self,
        request: PaymentRequest,
        approved: bool,
    ) -> Result<PaymentOutcome, ToolError>;

    /// HITL 审批前的支付摘要（审计用）
    async fn payment_summary(&self, invoice_id: &str, amount_usd: f64) -> PaymentSummary;
}
