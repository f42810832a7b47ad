//! 工作流引擎
//!
//! 驱动 reconcile → check_approval → execute_payment 的条件路由，
//! 每次节点转移后写 checkpoint；挂起 / 恢复跨进程重启可用。
//! 工作流句柄在服务启动时构建一次并显式传入各 handler，不走隐式全局。

use std::sync::Arc;

use tracing::info;

use crate::core::ReconError;
use crate::persistence::CheckpointStore;
use crate::tools::ReconTools;
use crate::workflow::nodes::{
    apply_approval_decision, check_approval_node, execute_payment_node, reconcile_node, NodeOutcome,
};
use crate::workflow::state::{HitlPrompt, RunStatus, WorkflowState};

/// 一次 run 的结果：跑到终点，或在 HITL 点挂起等待外部决定
pub enum RunOutcome {
    Complete(WorkflowState),
    Suspended {
        state: WorkflowState,
        prompt: HitlPrompt,
    },
}

/// 对账工作流：工具集 + checkpoint 存储 + 审批/重试配置
pub struct ReconWorkflow {
    tools: Arc<dyn ReconTools>,
    store: Arc<dyn CheckpointStore>,
    approval_threshold_usd: f64,
    max_retries: usize,
}

impl ReconWorkflow {
    pub fn new(
        tools: Arc<dyn ReconTools>,
        store: Arc<dyn CheckpointStore>,
        approval_threshold_usd: f64,
        max_retries: usize,
    ) -> Self {
        Self {
            tools,
            store,
            approval_threshold_usd,
            max_retries,
        }
    }

    /// 开始（或对已终止线程重新开始）一次运行
    ///
    /// 路由：reconcile 后，failed 或无候选支付 → 终点；有候选 → check_approval；
    /// 低于阈值自动批准直达 execute_payment，否则挂起返回 HITL 提问。
    /// 对挂起中的线程调用 run 属未定义行为，这里显式拒绝。
    pub async fn run(
        &self,
        thread_id: &str,
        vendor_id: Option<String>,
    ) -> Result<RunOutcome, ReconError> {
        if let Some(existing) = self.store.load(thread_id)? {
            if existing.status == RunStatus::AwaitingApproval {
                return Err(ReconError::AlreadySuspended(thread_id.to_string()));
            }
        }

        info!(%thread_id, vendor_id = vendor_id.as_deref(), "starting reconciliation run");
        let mut state = WorkflowState::new(vendor_id);

        // reconcile
        let update = reconcile_node(self.tools.as_ref(), self.max_retries, &state).await;
        state.apply(update);
        self.store.save(thread_id, &state)?;

        // route_after_reconcile
        if state.status == RunStatus::Failed || state.pending_payment.is_none() {
            return Ok(RunOutcome::Complete(state));
        }

        // check_approval
        match check_approval_node(self.tools.as_ref(), self.approval_threshold_usd, &state).await {
            NodeOutcome::Suspend { update, prompt } => {
                state.apply(update);
                self.store.save(thread_id, &state)?;
                info!(%thread_id, "run suspended awaiting human approval");
                Ok(RunOutcome::Suspended { state, prompt })
            }
            NodeOutcome::Advance(update) => {
                state.apply(update);
                self.store.save(thread_id, &state)?;

                // execute_payment
                let update = execute_payment_node(self.tools.as_ref(), &state).await?;
                state.apply(update);
                self.store.save(thread_id, &state)?;
                Ok(RunOutcome::Complete(state))
            }
        }
    }

    /// 用人工决定恢复挂起的线程，从 check_approval 之后继续（不从头执行）
    pub async fn resume(
        &self,
        thread_id: &str,
        approved: bool,
    ) -> Result<WorkflowState, ReconError> {
        let mut state = self
            .store
            .load(thread_id)?
            .ok_or_else(|| ReconError::ThreadNotFound(thread_id.to_string()))?;
        if state.status != RunStatus::AwaitingApproval {
            return Err(ReconError::NotSuspended(thread_id.to_string()));
        }

        info!(%thread_id, approved, "resuming suspended run");
        state.apply(apply_approval_decision(approved));
        self.store.save(thread_id, &state)?;

        // route_after_approval：拒绝即终点
        if state.status == RunStatus::Cancelled {
            return Ok(state);
        }

        let update = execute_payment_node(self.tools.as_ref(), &state).await?;
        state.apply(update);
        self.store.save(thread_id, &state)?;
        Ok(state)
    }

    /// 读取线程当前持久化状态
    pub fn state(&self, thread_id: &str) -> Result<WorkflowState, ReconError> {
        self.store
            .load(thread_id)?
            .ok_or_else(|| ReconError::ThreadNotFound(thread_id.to_string()))
    }
}
