//! 工作流状态与合并语义
//!
//! WorkflowState 是静态类型的持久化记录（不是松散字典）；节点产出 StateUpdate，
//! 由 apply 按字段定义的覆盖 / 累加语义合并：retry_count 累加，status 与各可选
//! 字段按"有值则覆盖"处理，reconciled 整体替换。

use serde::{Deserialize, Serialize};

use crate::models::PaymentOutcome;
use crate::worker::ReconciledItem;

/// 运行状态；paid / cancelled / failed 为终态，之后该线程不再转移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// 进行中（含自动批准后待执行支付）
    Pending,
    /// 已挂起，等待人工审批
    AwaitingApproval,
    /// 支付完成
    Paid,
    /// 人工拒绝或未批准
    Cancelled,
    /// 对账硬失败（fetch 耗尽重试且无兜底结果可用）
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Paid | RunStatus::Cancelled | RunStatus::Failed)
    }
}

/// 等待审批 / 执行的候选支付（每次运行最多取第一条对账记录，策略使然）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPayment {
    pub invoice_id: String,
    pub amount: f64,
    pub vendor_id: String,
}

/// 展示给人工审批者的提问 payload（回显留档）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlPrompt {
    pub question: String,
    pub invoice_id: String,
    pub amount_usd: f64,
    pub approval_threshold_usd: f64,
}

/// 按 thread_id 持久化的工作流状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// 发票拉取的供应商过滤
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    /// 对账步骤输出（fetch 顺序）
    #[serde(default)]
    pub reconciled: Vec<ReconciledItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_payment: Option<PendingPayment>,
    /// 人工决定（自动批准时无人工参与也为 true）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hitl_prompt: Option<HitlPrompt>,
    /// 最近一次工具失败描述
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// 整次运行累计的失败计数
    #[serde(default)]
    pub retry_count: u32,
    /// 重试耗尽并使用了兜底值
    #[serde(default)]
    pub used_fallback: bool,
    pub status: RunStatus,
    /// 支付执行结果
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<PaymentOutcome>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WorkflowState {
    /// 新建一次运行的初始状态
    pub fn new(vendor_id: Option<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            vendor_id,
            reconciled: Vec::new(),
            pending_payment: None,
            approval: None,
            hitl_prompt: None,
            last_error: None,
            retry_count: 0,
            used_fallback: false,
            status: RunStatus::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 合并一次节点的部分更新
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(reconciled) = update.reconciled {
            self.reconciled = reconciled;
        }
        if let Some(pending) = update.pending_payment {
            self.pending_payment = Some(pending);
        }
        if let Some(approval) = update.approval {
            self.approval = Some(approval);
        }
        if let Some(prompt) = update.hitl_prompt {
            self.hitl_prompt = prompt;
        }
        if let Some(last_error) = update.last_error {
            self.last_error = last_error;
        }
        self.retry_count += update.retry_increment;
        if let Some(used_fallback) = update.used_fallback {
            self.used_fallback = used_fallback;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

/// 节点产出的部分更新
///
/// hitl_prompt / last_error 用双层 Option：外层 None 表示不动，
/// 内层 None 表示显式清空。
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub reconciled: Option<Vec<ReconciledItem>>,
    pub pending_payment: Option<PendingPayment>,
    pub approval: Option<bool>,
    pub hitl_prompt: Option<Option<HitlPrompt>>,
    pub last_error: Option<Option<String>>,
    /// 累加而非覆盖
    pub retry_increment: u32,
    pub used_fallback: Option<bool>,
    pub status: Option<RunStatus>,
    pub result: Option<PaymentOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_count_accumulates() {
        let mut state = WorkflowState::new(None);
        state.apply(StateUpdate {
            retry_increment: 1,
            ..Default::default()
        });
        state.apply(StateUpdate {
            retry_increment: 1,
            ..Default::default()
        });
        assert_eq!(state.retry_count, 2);
    }

    #[test]
    fn test_status_overrides_and_terminal() {
        let mut state = WorkflowState::new(None);
        assert_eq!(state.status, RunStatus::Pending);
        state.apply(StateUpdate {
            status: Some(RunStatus::Paid),
            ..Default::default()
        });
        assert!(state.status.is_terminal());
    }

    #[test]
    fn test_prompt_explicit_clear() {
        let mut state = WorkflowState::new(None);
        state.apply(StateUpdate {
            hitl_prompt: Some(Some(HitlPrompt {
                question: "Approve?".to_string(),
                invoice_id: "INV-001".to_string(),
                amount_usd: 10000.0,
                approval_threshold_usd: 5000.0,
            })),
            ..Default::default()
        });
        assert!(state.hitl_prompt.is_some());
        // 外层 Some(None) 显式清空
        state.apply(StateUpdate {
            hitl_prompt: Some(None),
            ..Default::default()
        });
        assert!(state.hitl_prompt.is_none());
        // 外层 None 不触碰
        state.apply(StateUpdate::default());
        assert!(state.hitl_prompt.is_none());
    }

    #[test]
    fn test_untouched_fields_survive_merge() {
        let mut state = WorkflowState::new(Some("V001".to_string()));
        state.apply(StateUpdate {
            approval: Some(true),
            ..Default::default()
        });
        assert_eq!(state.vendor_id.as_deref(), Some("V001"));
        assert_eq!(state.approval, Some(true));
        assert!(!state.used_fallback);
    }
}
