//! Worker：自我纠错包装器与对账步骤
//!
//! run_with_retry_and_fallback 是通用组合子：失败重试，预算耗尽后以安全默认值兜底，
//! 本身不打日志也不改共享状态。reconcile_step 组合 fetch → match 为一个工作单元。

use std::future::Future;

use crate::core::ToolError;
use crate::models::{Invoice, ReconciliationResult};
use crate::tools::{FetchInvoicesInput, MatchInvoiceInput, ReconTools};

/// 对账步骤最多处理的发票数
const MAX_RECONCILED_ITEMS: usize = 3;

/// 一条对账记录：发票 + 匹配结果（匹配失败时记录 error，不影响其他条目）
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReconciledItem {
    pub invoice: Invoice,
    #[serde(rename = "match")]
    pub match_result: Option<ReconciliationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 自我纠错组合子：重试至成功或预算耗尽，耗尽后返回兜底值
///
/// - 第 k 次成功：立即返回 (result, None, false)
/// - 全部失败：返回 (fallback, last_error, true)
/// - 尝试之间不加退避延迟（演示规模的刻意取舍）
pub async fn run_with_retry_and_fallback<T, F, Fut>(
    mut op: F,
    max_retries: usize,
    fallback: T,
) -> (T, Option<String>, bool)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ToolError>>,
{
    let mut last_error = None;
    for _ in 0..max_retries {
        match op().await {
            Ok(result) => return (result, None, false),
            Err(e) => last_error = Some(e.to_string()),
        }
    }
    (fallback, last_error, true)
}

/// 一次对账：带重试地拉取发票，再把前几张匹配到采购单
///
/// fetch 失败耗尽重试时立即返回空列表与错误；匹配本身不重试，
/// 单条匹配失败只记录在该条目上，不上升为顶层错误。
pub async fn reconcile_step(
    tools: &dyn ReconTools,
    vendor_id: Option<&str>,
    limit: usize,
    max_retries: usize,
) -> (Vec<ReconciledItem>, Option<String>, bool) {
    let input = FetchInvoicesInput {
        vendor_id: vendor_id.map(str::to_string),
        limit,
    };
    // 兜底为空列表，让状态机自行决定下一步
    let (invoices, err, used_fallback) = run_with_retry_and_fallback(
        || {
            let input = input.clone();
            async move { tools.fetch_pending_invoices(input).await }
        },
        max_retries,
        Vec::new(),
    )
    .await;
    if err.is_some() {
        return (Vec::new(), err, used_fallback);
    }

    let mut reconciled = Vec::new();
    for invoice in invoices.into_iter().take(MAX_RECONCILED_ITEMS) {
        // 演示用的固定供应商→采购单策略（生产中由 worker 或 LLM 选单）
        let po_id = match invoice.vendor_id.as_str() {
            "V001" => "PO-101",
            "V002" => "PO-201",
            _ => "PO-101",
        };
        let matched = tools
            .match_invoice_to_po(MatchInvoiceInput {
                invoice_id: invoice.invoice_id.clone(),
                po_id: po_id.to_string(),
            })
            .await;
        match matched {
            Ok(result) => reconciled.push(ReconciledItem {
                invoice,
                match_result: Some(result),
                error: None,
            }),
            Err(e) => reconciled.push(ReconciledItem {
                invoice,
                match_result: None,
                error: Some(e.to_string()),
            }),
        }
    }
    (reconciled, None, used_fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::MockErp;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_first_attempt() {
        let calls = AtomicUsize::new(0);
        let (value, err, used_fallback) = run_with_retry_and_fallback(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ToolError>(42) }
            },
            3,
            0,
        )
        .await;
        assert_eq!(value, 42);
        assert!(err.is_none());
        assert!(!used_fallback);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let calls = AtomicUsize::new(0);
        let (value, err, used_fallback) = run_with_retry_and_fallback(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ToolError::UpstreamTimeout)
                    } else {
                        Ok(7)
                    }
                }
            },
            3,
            0,
        )
        .await;
        assert_eq!(value, 7);
        assert!(err.is_none());
        assert!(!used_fallback);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_returns_fallback() {
        let calls = AtomicUsize::new(0);
        let (value, err, used_fallback) = run_with_retry_and_fallback(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, _>(ToolError::UpstreamTimeout) }
            },
            3,
            -1,
        )
        .await;
        assert_eq!(value, -1);
        assert_eq!(err.as_deref(), Some("ERP API timeout"));
        assert!(used_fallback);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_reconcile_step_truncates_to_three() {
        let erp = MockErp::new(0.0, 5000.0);
        let (reconciled, err, used_fallback) = reconcile_step(&erp, None, 10, 3).await;
        assert!(err.is_none());
        assert!(!used_fallback);
        assert_eq!(reconciled.len(), 3);
        // fetch 顺序保持不变
        assert_eq!(reconciled[0].invoice.invoice_id, "INV-001");
        assert_eq!(reconciled[2].invoice.invoice_id, "INV-003");
    }

    #[tokio::test]
    async fn test_reconcile_step_po_policy() {
        let erp = MockErp::new(0.0, 5000.0);
        let (reconciled, _, _) = reconcile_step(&erp, Some("V002"), 5, 3).await;
        assert_eq!(reconciled.len(), 1);
        let result = reconciled[0].match_result.as_ref().unwrap();
        assert_eq!(result.po_id, "PO-201");
        assert_eq!(result.match_score, 1.0);
    }

    #[tokio::test]
    async fn test_reconcile_step_fetch_exhausted() {
        let erp = MockErp::new(1.0, 5000.0);
        let (reconciled, err, used_fallback) = reconcile_step(&erp, None, 5, 3).await;
        assert!(reconciled.is_empty());
        assert!(err.is_some());
        assert!(used_fallback);
    }
}
