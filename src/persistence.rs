//! 状态持久化：按 thread_id 的 checkpoint 存储
//!
//! 统一的存储接口，SQLite（默认，跨重启可恢复）与内存（测试）两种实现。
//! 并发契约：调用方保证同一 thread_id 同时只有一个写者，存储本身不做业务级锁。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::ReconError;
use crate::workflow::WorkflowState;

/// checkpoint 存储接口：按 key 读写最新状态
pub trait CheckpointStore: Send + Sync {
    fn save(&self, thread_id: &str, state: &WorkflowState) -> Result<(), ReconError>;
    fn load(&self, thread_id: &str) -> Result<Option<WorkflowState>, ReconError>;
}

/// SQLite checkpoint 存储（状态序列化为 JSON 存单表）
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    /// 打开（必要时创建）数据库与 checkpoints 表
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, ReconError> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ReconError::Persistence(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id  TEXT PRIMARY KEY,
                state      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn save(&self, thread_id: &str, state: &WorkflowState) -> Result<(), ReconError> {
        let json = serde_json::to_string(state)?;
        let conn = self
            .conn
            .lock()
            .map_err(|_| ReconError::Persistence("checkpoint lock poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO checkpoints (thread_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(thread_id) DO UPDATE SET state = ?2, updated_at = ?3",
            params![thread_id, json, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn load(&self, thread_id: &str) -> Result<Option<WorkflowState>, ReconError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ReconError::Persistence("checkpoint lock poisoned".to_string()))?;
        let json: Option<String> = conn
            .query_row(
                "SELECT state FROM checkpoints WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

/// 内存 checkpoint 存储（测试用，进程退出即失）
#[derive(Default)]
pub struct MemoryCheckpointStore {
    states: Mutex<HashMap<String, WorkflowState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, thread_id: &str, state: &WorkflowState) -> Result<(), ReconError> {
        self.states
            .lock()
            .map_err(|_| ReconError::Persistence("checkpoint lock poisoned".to_string()))?
            .insert(thread_id.to_string(), state.clone());
        Ok(())
    }

    fn load(&self, thread_id: &str) -> Result<Option<WorkflowState>, ReconError> {
        Ok(self
            .states
            .lock()
            .map_err(|_| ReconError::Persistence("checkpoint lock poisoned".to_string()))?
            .get(thread_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::RunStatus;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryCheckpointStore::new();
        assert!(store.load("t1").unwrap().is_none());
        let state = WorkflowState::new(Some("V001".to_string()));
        store.save("t1", &state).unwrap();
        let loaded = store.load("t1").unwrap().unwrap();
        assert_eq!(loaded.vendor_id.as_deref(), Some("V001"));
        assert_eq!(loaded.status, RunStatus::Pending);
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("checkpoints.db");

        let mut state = WorkflowState::new(None);
        state.status = RunStatus::AwaitingApproval;
        {
            let store = SqliteCheckpointStore::new(&db).unwrap();
            store.save("t1", &state).unwrap();
        }
        // 模拟进程重启：重新打开同一数据库
        let store = SqliteCheckpointStore::new(&db).unwrap();
        let loaded = store.load("t1").unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::AwaitingApproval);
        assert!(store.load("other").unwrap().is_none());
    }

    #[test]
    fn test_sqlite_store_upsert_keeps_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCheckpointStore::new(dir.path().join("c.db")).unwrap();
        let mut state = WorkflowState::new(None);
        store.save("t1", &state).unwrap();
        state.status = RunStatus::Paid;
        store.save("t1", &state).unwrap();
        assert_eq!(store.load("t1").unwrap().unwrap().status, RunStatus::Paid);
    }
}
