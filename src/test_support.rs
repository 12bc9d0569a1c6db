//! 测试辅助：基于临时快照文件构建路由器

use serde_json::Value;
use std::sync::Arc;

use crate::models::Record;
use crate::models::common::record_from_value;
use crate::storage::{PersistenceRouter, RoutingTable, SnapshotStore};

pub(crate) fn record(value: Value) -> Record {
    record_from_value(value).expect("test record must be an object")
}

/// 写入快照文件并以 `FallbackActive` 打开
pub(crate) async fn snapshot_router(content: Value) -> (tempfile::TempDir, Arc<PersistenceRouter>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("db.json");
    std::fs::write(&path, serde_json::to_vec(&content).expect("json")).expect("write snapshot");
    let snapshot = SnapshotStore::open(&path).await.expect("open snapshot");
    let router = PersistenceRouter::fallback_active(None, Arc::new(snapshot), RoutingTable::default());
    (dir, Arc::new(router))
}

pub(crate) fn ids(records: &[Record]) -> Vec<String> {
    let mut ids: Vec<String> = records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_str).map(str::to_string))
        .collect();
    ids.sort();
    ids
}
