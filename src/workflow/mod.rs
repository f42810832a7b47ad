//! 对账工作流状态机
//!
//! 三节点：reconcile → check_approval → execute_payment，条件路由 + HITL 挂起点。
//! 状态按 thread_id 持久化，每次节点转移后写 checkpoint，可跨进程重启恢复。

pub mod engine;
pub mod nodes;
pub mod state;

pub use engine::{ReconWorkflow, RunOutcome};
pub use state::{HitlPrompt, PendingPayment, RunStatus, StateUpdate, WorkflowState};
