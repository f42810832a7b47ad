//! 状态机节点
//!
//! 每个节点读当前状态、产出 StateUpdate；check_approval 可能产出 Suspend。
//! 挂起是 NodeOutcome 的一个变体而不是错误，通用错误处理在结构上不可能把它吞掉。

use tracing::{info, warn};

use crate::core::ReconError;
use crate::models::PaymentRequest;
use crate::tools::ReconTools;
use crate::worker::reconcile_step;
use crate::workflow::state::{HitlPrompt, PendingPayment, RunStatus, StateUpdate, WorkflowState};

/// 对账步骤的发票拉取上限
const RECONCILE_FETCH_LIMIT: usize = 5;

/// 节点执行结果：推进或在 HITL 点挂起
pub enum NodeOutcome {
    Advance(StateUpdate),
    Suspend {
        update: StateUpdate,
        prompt: HitlPrompt,
    },
}

/// reconcile 节点：拉取发票并匹配采购单，自我纠错在 reconcile_step 内部完成
///
/// 有可用对账记录时取第一条派生 pending_payment；出错时 retry_count 恰好 +1
/// （按"本节点失败一次"计，不按实际尝试次数计）。
pub async fn reconcile_node(
    tools: &dyn ReconTools,
    max_retries: usize,
    state: &WorkflowState,
) -> StateUpdate {
    let (reconciled, err, used_fallback) = reconcile_step(
        tools,
        state.vendor_id.as_deref(),
        RECONCILE_FETCH_LIMIT,
        max_retries,
    )
    .await;

    let mut update = StateUpdate {
        used_fallback: Some(used_fallback),
        retry_increment: if err.is_some() { 1 } else { 0 },
        last_error: Some(err.clone()),
        ..Default::default()
    };

    if err.is_some() && used_fallback && reconciled.is_empty() {
        // 兜底也救不回来的硬失败：不再尝试支付
        warn!(error = err.as_deref(), "reconcile failed after retries, no fallback data");
        update.status = Some(RunStatus::Failed);
    } else if let Some(first) = reconciled.first() {
        update.pending_payment = Some(PendingPayment {
            invoice_id: first.invoice.invoice_id.clone(),
            amount: first.invoice.amount,
            vendor_id: first.invoice.vendor_id.clone(),
        });
    }
    update.reconciled = Some(reconciled);
    update
}

/// check_approval 节点：低于阈值自动批准，达到阈值构造 HITL 提问并挂起
pub async fn check_approval_node(
    tools: &dyn ReconTools,
    threshold_usd: f64,
    state: &WorkflowState,
) -> NodeOutcome {
    let (invoice_id, amount_usd) = match state.pending_payment {
        Some(ref p) => (p.invoice_id.clone(), p.amount),
        None => (String::new(), 0.0),
    };

    if amount_usd < threshold_usd {
        info!(%invoice_id, amount_usd, "payment below threshold, auto-approved");
        return NodeOutcome::Advance(StateUpdate {
            approval: Some(true),
            status: Some(RunStatus::Pending),
            hitl_prompt: Some(None),
            ..Default::default()
        });
    }

    // 审批前留档支付摘要
    let summary = tools.payment_summary(&invoice_id, amount_usd).await;
    info!(
        %invoice_id,
        requires_approval = summary.requires_approval,
        "payment summary recorded before HITL prompt"
    );

    let prompt = HitlPrompt {
        question: format!("Ready to pay this ${} invoice. Approve?", format_usd(amount_usd)),
        invoice_id,
        amount_usd,
        approval_threshold_usd: threshold_usd,
    };
    NodeOutcome::Suspend {
        update: StateUpdate {
            hitl_prompt: Some(Some(prompt.clone())),
            status: Some(RunStatus::AwaitingApproval),
            ..Default::default()
        },
        prompt,
    }
}

/// resume 时应用人工决定：拒绝置 cancelled，批准回到 pending 继续执行支付
pub fn apply_approval_decision(approved: bool) -> StateUpdate {
    StateUpdate {
        approval: Some(approved),
        status: Some(if approved {
            RunStatus::Pending
        } else {
            RunStatus::Cancelled
        }),
        ..Default::default()
    }
}

/// execute_payment 节点：已批准则执行支付并记录结果，未批准视为取消
pub async fn execute_payment_node(
    tools: &dyn ReconTools,
    state: &WorkflowState,
) -> Result<StateUpdate, ReconError> {
    let (invoice_id, amount_usd, vendor_id) = match state.pending_payment {
        Some(ref p) => (p.invoice_id.clone(), p.amount, p.vendor_id.clone()),
        None => (String::new(), 0.0, String::new()),
    };
    let approved = state.approval.unwrap_or(false);
    let outcome = tools
        .execute_payment(
            PaymentRequest {
                invoice_id,
                amount_usd,
                currency: "USD".to_string(),
                vendor_id,
                reference: String::new(),
            },
            approved,
        )
        .await?;
    let status = if approved {
        // 以支付调用自己报告的状态为准
        if outcome.status == "paid" {
            RunStatus::Paid
        } else {
            RunStatus::Cancelled
        }
    } else {
        RunStatus::Cancelled
    };
    info!(status = ?status, reference = outcome.reference.as_deref(), "payment node finished");
    Ok(StateUpdate {
        result: Some(outcome),
        status: Some(status),
        ..Default::default()
    })
}

/// 千分位美元格式（10000 → "10,000.00"），用于 HITL 提问文本
fn format_usd(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let int_grouped: String = grouped.chars().rev().collect();
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, int_grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::MockErp;

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(10000.0), "10,000.00");
        assert_eq!(format_usd(500.0), "500.00");
        assert_eq!(format_usd(1234567.891), "1,234,567.89");
        assert_eq!(format_usd(0.0), "0.00");
    }

    #[tokio::test]
    async fn test_check_approval_below_threshold_advances() {
        let erp = MockErp::new(0.0, 5000.0);
        let mut state = WorkflowState::new(None);
        state.pending_payment = Some(PendingPayment {
            invoice_id: "INV-002".to_string(),
            amount: 4999.0,
            vendor_id: "V001".to_string(),
        });
        match check_approval_node(&erp, 5000.0, &state).await {
            NodeOutcome::Advance(update) => {
                assert_eq!(update.approval, Some(true));
                assert_eq!(update.status, Some(RunStatus::Pending));
            }
            NodeOutcome::Suspend { .. } => panic!("must auto-approve below threshold"),
        }
    }

    #[tokio::test]
    async fn test_check_approval_at_threshold_suspends() {
        let erp = MockErp::new(0.0, 5000.0);
        let mut state = WorkflowState::new(None);
        state.pending_payment = Some(PendingPayment {
            invoice_id: "INV-001".to_string(),
            amount: 5000.0,
            vendor_id: "V001".to_string(),
        });
        match check_approval_node(&erp, 5000.0, &state).await {
            NodeOutcome::Suspend { update, prompt } => {
                assert_eq!(update.status, Some(RunStatus::AwaitingApproval));
                assert_eq!(prompt.amount_usd, 5000.0);
                assert_eq!(prompt.question, "Ready to pay this $5,000.00 invoice. Approve?");
            }
            NodeOutcome::Advance(_) => panic!("amount == threshold must require approval"),
        }
    }

    #[tokio::test]
    async fn test_reconcile_node_failure_counts_once() {
        let erp = MockErp::new(1.0, 5000.0);
        let state = WorkflowState::new(None);
        let update = reconcile_node(&erp, 3, &state).await;
        assert_eq!(update.retry_increment, 1);
        assert_eq!(update.status, Some(RunStatus::Failed));
        assert_eq!(update.used_fallback, Some(true));
    }
}
