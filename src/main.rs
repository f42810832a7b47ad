//! apflow - 发票对账智能体服务
//!
//! 入口：初始化日志、加载配置、构建工作流句柄与 HTTP 服务并监听。

use std::sync::Arc;

use anyhow::Context;

use apflow::config::load_config;
use apflow::persistence::SqliteCheckpointStore;
use apflow::tools::MockErp;
use apflow::web::{build_router, AppState};
use apflow::workflow::ReconWorkflow;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    apflow::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;

    // 工作流与持久化句柄在启动时构建一次，显式传入 handler
    let store = SqliteCheckpointStore::new(&cfg.persistence.db_path)
        .context("Failed to open checkpoint store")?;
    let tools = MockErp::new(cfg.tools.erp_failure_rate, cfg.approval.threshold_usd);
    let workflow = Arc::new(ReconWorkflow::new(
        Arc::new(tools),
        Arc::new(store),
        cfg.approval.threshold_usd,
        cfg.tools.max_retries,
    ));

    let app = build_router(Arc::new(AppState { workflow }));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.app.port));
    tracing::info!("apflow listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listener")?;
    axum::serve(listener, app).await.context("Server failed")?;

    Ok(())
}
