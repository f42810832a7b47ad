//! apflow - 发票对账智能体服务
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **models**: 外部系统值对象（发票、采购单、对账结果、支付）
//! - **tools**: 工具层（Mock ERP / 支付，typed in/out）
//! - **worker**: 重试 / 降级组合子与对账步骤
//! - **workflow**: 三节点状态机（reconcile → check_approval → execute_payment）与挂起/恢复
//! - **persistence**: 按 thread_id 的 checkpoint 存储（SQLite / 内存）
//! - **security**: PII 脱敏
//! - **web**: axum HTTP 边界（/run /resume /state）
//! - **observability**: tracing 初始化

pub mod config;
pub mod core;
pub mod models;
pub mod observability;
pub mod persistence;
pub mod security;
pub mod tools;
pub mod web;
pub mod worker;
pub mod workflow;

pub use crate::core::error::{ReconError, ToolError};
