//! 错误类型
//!
//! ToolError 是工具层（ERP / 支付）的故障；ReconError 是工作流与边界层的统一错误。
//! 注意：挂起（等待人工审批）不是错误，用 NodeOutcome::Suspend 表达，绝不走这里。

use thiserror::Error;

/// 工具调用失败（模拟的上游故障等）
#[derive(Error, Debug)]
pub enum ToolError {
    /// 模拟 ERP 上游超时（重试包装器在此类错误上做自我纠错）
    #[error("ERP API timeout")]
    UpstreamTimeout,

    #[error("Tool backend error: {0}")]
    Backend(String),
}

/// 工作流 / 持久化 / 边界层错误
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    /// resume 的前提是线程处于挂起状态
    #[error("Thread is not awaiting approval: {0}")]
    NotSuspended(String),

    /// 对挂起中的线程再次调用 run 属未定义行为，显式拒绝
    #[error("Thread is suspended awaiting approval, use /resume: {0}")]
    AlreadySuspended(String),

    #[error("Tool execution failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Checkpoint store error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for ReconError {
    fn from(e: rusqlite::Error) -> Self {
        ReconError::Persistence(e.to_string())
    }
}
