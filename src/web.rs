//! HTTP 边界：/run、/resume、/state
//!
//! AppState 在服务启动时构建一次，经 axum State 显式注入各 handler。
//! 所有出站 payload（成功与失败路径）先经 redact_pii 脱敏。

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::core::ReconError;
use crate::security::redact_pii;
use crate::workflow::{HitlPrompt, ReconWorkflow, RunOutcome, WorkflowState};

/// 所有 handler 共享的应用状态
pub struct AppState {
    pub workflow: Arc<ReconWorkflow>,
}

/// 开始一次对账运行
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// 状态持久化的线程标识
    pub thread_id: String,
    /// 可选的供应商过滤
    #[serde(default)]
    pub vendor_id: Option<String>,
}

/// HITL 挂起后恢复（批准 / 拒绝）
#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    /// 与被挂起的 run 相同的 thread_id
    pub thread_id: String,
    /// true 批准支付，false 拒绝
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct StateQuery {
    pub thread_id: String,
}

pub fn build_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/run", post(api_run))
        .route("/resume", post(api_resume))
        .route("/state", get(api_state))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(app_state)
}

/// POST /run：开始对账，挂起时响应携带 interrupt（HITL 提问）
async fn api_run(
    State(st): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    match st.workflow.run(&req.thread_id, req.vendor_id).await {
        Ok(RunOutcome::Complete(state)) => Ok(Json(redact_pii(state_to_response(&state, None)?))),
        Ok(RunOutcome::Suspended { state, prompt }) => {
            Ok(Json(redact_pii(state_to_response(&state, Some(&prompt))?)))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// POST /resume：用人工决定恢复挂起的线程
async fn api_resume(
    State(st): State<Arc<AppState>>,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let state = st
        .workflow
        .resume(&req.thread_id, req.approved)
        .await
        .map_err(error_response)?;
    Ok(Json(redact_pii(state_to_response(&state, None)?)))
}

/// GET /state?thread_id=...：读取线程当前持久化状态（HITL UI 用）
async fn api_state(
    State(st): State<Arc<AppState>>,
    Query(query): Query<StateQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let state = st.workflow.state(&query.thread_id).map_err(error_response)?;
    Ok(Json(redact_pii(state_to_response(&state, None)?)))
}

/// 状态转响应 JSON；挂起时附加 interrupt 字段回显 HITL 提问
fn state_to_response(
    state: &WorkflowState,
    interrupt: Option<&HitlPrompt>,
) -> Result<Value, (StatusCode, String)> {
    let mut value = serde_json::to_value(state)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if let Some(prompt) = interrupt {
        let prompt_value = serde_json::to_value(prompt)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        if let Value::Object(ref mut map) = value {
            map.insert("interrupt".to_string(), prompt_value);
        }
    }
    Ok(value)
}

fn error_response(e: ReconError) -> (StatusCode, String) {
    let status = match e {
        ReconError::ThreadNotFound(_) | ReconError::NotSuspended(_) => StatusCode::NOT_FOUND,
        ReconError::AlreadySuspended(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}
