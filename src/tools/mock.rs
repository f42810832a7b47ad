//! Mock ERP / 支付后端
//!
//! 固定的发票与采购单数据，fetch 以可配置概率模拟上游超时（演示自我纠错），
//! 概率置 0.0 即完全确定性（测试用）。

use async_trait::async_trait;
use rand::Rng;

use crate::core::ToolError;
use crate::models::{
    Invoice, PaymentOutcome, PaymentRequest, PaymentSummary, PurchaseOrder, ReconciliationResult,
};
use crate::tools::{FetchInvoicesInput, MatchInvoiceInput, ReconTools};

/// 金额比较容差（美元）
const AMOUNT_TOLERANCE_USD: f64 = 0.01;

/// Mock ERP：固定数据 + 可配置故障率
pub struct MockErp {
    /// fetch 模拟超时概率，[0.0, 1.0]
    failure_rate: f64,
    /// 审批阈值，payment_summary 据此标记 requires_approval
    approval_threshold_usd: f64,
}

impl MockErp {
    pub fn new(failure_rate: f64, approval_threshold_usd: f64) -> Self {
        Self {
            failure_rate,
            approval_threshold_usd,
        }
    }

    /// 固定发票数据（模拟 ERP 应付列表）
    fn invoices() -> Vec<Invoice> {
        vec![
            Invoice {
                invoice_id: "INV-001".to_string(),
                vendor_id: "V001".to_string(),
                vendor_name: "Acme Corp".to_string(),
                amount: 10000.00,
                currency: "USD".to_string(),
                due_date: None,
                line_items: Vec::new(),
                status: "pending".to_string(),
            },
            Invoice {
                invoice_id: "INV-002".to_string(),
                vendor_id: "V001".to_string(),
                vendor_name: "Acme Corp".to_string(),
                amount: 500.00,
                currency: "USD".to_string(),
                due_date: None,
                line_items: Vec::new(),
                status: "pending".to_string(),
            },
            Invoice {
                invoice_id: "INV-003".to_string(),
                vendor_id: "V002".to_string(),
                vendor_name: "Beta Inc".to_string(),
                amount: 2500.00,
                currency: "USD".to_string(),
                due_date: None,
                line_items: Vec::new(),
                status: "pending".to_string(),
            },
        ]
    }

    /// 固定采购单数据
    fn purchase_orders() -> Vec<PurchaseOrder> {
        let po = |po_id: &str, vendor_id: &str, total_amount: f64| PurchaseOrder {
            po_id: po_id.to_string(),
            vendor_id: vendor_id.to_string(),
            total_amount,
            status: "open".to_string(),
            line_items: Vec::new(),
        };
        vec![
            po("PO-101", "V001", 10000.00),
            po("PO-102", "V001", 500.00),
            po("PO-201", "V002", 2500.00),
        ]
    }
}

#[async_trait]
impl ReconTools for MockErp {
    async fn fetch_pending_invoices(
        &self,
        input: FetchInvoicesInput,
    ) -> Result<Vec<Invoice>, ToolError> {
        // 模拟偶发的上游超时
        if self.failure_rate > 0.0 && rand::thread_rng().gen::<f64>() < self.failure_rate {
            return Err(ToolError::UpstreamTimeout);
        }
        let mut items = Self::invoices();
        if let Some(ref vid) = input.vendor_id {
            items.retain(|i| &i.vendor_id == vid);
        }
        items.truncate(input.limit);
        Ok(items)
    }

    async fn match_invoice_to_po(
        &self,
        input: MatchInvoiceInput,
    ) -> Result<ReconciliationResult, ToolError> {
        let invoices = Self::invoices();
        let pos = Self::purchase_orders();
        let inv = invoices.iter().find(|i| i.invoice_id == input.invoice_id);
        let po = pos.iter().find(|p| p.po_id == input.po_id);
        let (inv, po) = match (inv, po) {
            (Some(inv), Some(po)) => (inv, po),
            _ => {
                return Ok(ReconciliationResult {
                    invoice_id: input.invoice_id,
                    po_id: input.po_id,
                    match_score: 0.0,
                    amount_match: false,
                    message: "Invoice or PO not found".to_string(),
                });
            }
        };
        let amount_match = (inv.amount - po.total_amount).abs() < AMOUNT_TOLERANCE_USD;
        // 供应商与金额同时匹配才是 1.0，其余一律 0.5（不细分哪一侧不匹配）
        let score = if inv.vendor_id == po.vendor_id && amount_match {
            1.0
        } else {
            0.5
        };
        Ok(ReconciliationResult {
            invoice_id: input.invoice_id,
            po_id: input.po_id,
            match_score: score,
            amount_match,
            message: "Match found".to_string(),
        })
    }

    async fn execute_payment(
        &self,
        request: PaymentRequest,
        approved: bool,
    ) -> Result<PaymentOutcome, ToolError> {
        if !approved {
            return Ok(PaymentOutcome {
                status: "cancelled".to_string(),
                invoice_id: request.invoice_id,
                amount_usd: None,
                vendor_id: None,
                reference: None,
                reason: Some("User did not approve".to_string()),
            });
        }
        let reference = format!(
            "PAY-{}-{}",
            request.invoice_id,
            rand::thread_rng().gen_range(1000..=9999)
        );
        Ok(PaymentOutcome {
            status: "paid".to_string(),
            invoice_id: request.invoice_id,
            amount_usd: Some(request.amount_usd),
            vendor_id: Some(request.vendor_id),
            reference: Some(reference),
            reason: None,
        })
    }

    async fn payment_summary(&self, invoice_id: &str, amount_usd: f64) -> PaymentSummary {
        PaymentSummary {
            invoice_id: invoice_id.to_string(),
            amount_usd,
            currency: "USD".to_string(),
            requires_approval: amount_usd >= self.approval_threshold_usd,
            approval_threshold_usd: self.approval_threshold_usd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erp() -> MockErp {
        MockErp::new(0.0, 5000.0)
    }

    #[tokio::test]
    async fn test_fetch_vendor_filter_and_limit() {
        let invoices = erp()
            .fetch_pending_invoices(FetchInvoicesInput {
                vendor_id: Some("V001".to_string()),
                limit: 1,
            })
            .await
            .unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].invoice_id, "INV-001");
    }

    #[tokio::test]
    async fn test_fetch_always_fails_at_rate_one() {
        let flaky = MockErp::new(1.0, 5000.0);
        let err = flaky
            .fetch_pending_invoices(FetchInvoicesInput {
                vendor_id: None,
                limit: 10,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UpstreamTimeout));
    }

    #[tokio::test]
    async fn test_match_exact() {
        let result = erp()
            .match_invoice_to_po(MatchInvoiceInput {
                invoice_id: "INV-001".to_string(),
                po_id: "PO-101".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(result.match_score, 1.0);
        assert!(result.amount_match);
    }

    #[tokio::test]
    async fn test_match_loose_is_half() {
        // INV-002（V001, 500）对 PO-201（V002, 2500）：供应商和金额都不匹配，仍是 0.5
        let result = erp()
            .match_invoice_to_po(MatchInvoiceInput {
                invoice_id: "INV-002".to_string(),
                po_id: "PO-201".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(result.match_score, 0.5);
        assert!(!result.amount_match);
    }

    #[tokio::test]
    async fn test_match_not_found_is_zero() {
        let result = erp()
            .match_invoice_to_po(MatchInvoiceInput {
                invoice_id: "INV-999".to_string(),
                po_id: "PO-101".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(result.match_score, 0.0);
        assert_eq!(result.message, "Invoice or PO not found");
    }

    #[tokio::test]
    async fn test_payment_requires_approval_flags() {
        let summary = erp().payment_summary("INV-001", 10000.0).await;
        assert!(summary.requires_approval);
        let summary = erp().payment_summary("INV-002", 500.0).await;
        assert!(!summary.requires_approval);
    }

    #[tokio::test]
    async fn test_unapproved_payment_has_no_side_effect() {
        let outcome = erp()
            .execute_payment(
                PaymentRequest {
                    invoice_id: "INV-001".to_string(),
                    amount_usd: 10000.0,
                    currency: "USD".to_string(),
                    vendor_id: "V001".to_string(),
                    reference: String::new(),
                },
                false,
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, "cancelled");
        assert!(outcome.reference.is_none());
    }
}
