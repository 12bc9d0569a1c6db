//! 快照文件存储
//!
//! 整个文件是一个 JSON 对象：集合名 -> 记录数组，另有 `settings` 键保存单条设置记录。
//! 内存中持有完整副本，每次写操作先写临时文件再原子替换。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{DeleteOutcome, InsertOutcome, StorageBackend, UpdateOutcome};
use crate::errors::{Result, SchoolError};
use crate::models::common::{merge_fields, record_id};
use crate::models::{Collection, Record};

/// 快照文件内容（备份文件同样使用此格式）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnapshotDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Record>,
    #[serde(flatten)]
    pub collections: BTreeMap<String, Vec<Record>>,
}

impl SnapshotDocument {
    /// 读取集合记录；单例集合返回 0 或 1 条
    pub fn records(&self, collection: Collection) -> Vec<Record> {
        if collection.is_singleton() {
            return self.settings.clone().into_iter().collect();
        }
        self.collections
            .get(collection.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// 整体替换集合内容
    pub fn set_records(&mut self, collection: Collection, records: Vec<Record>) -> Result<()> {
        if collection.is_singleton() {
            if records.len() > 1 {
                return Err(SchoolError::validation(format!(
                    "集合 {collection} 只能保存一条记录，收到 {} 条",
                    records.len()
                )));
            }
            self.settings = records.into_iter().next();
            return Ok(());
        }
        self.collections
            .insert(collection.as_str().to_string(), records);
        Ok(())
    }

    fn records_mut(&mut self, collection: Collection) -> &mut Vec<Record> {
        self.collections
            .entry(collection.as_str().to_string())
            .or_default()
    }

    pub async fn read_from(path: &Path) -> Result<Self> {
        let content = tokio::fs::read(path).await.map_err(|e| {
            SchoolError::file_operation(format!("读取 {} 失败: {e}", path.display()))
        })?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// 写入文件（先写临时文件再 rename）
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await.map_err(|e| {
            SchoolError::file_operation(format!("写入 {} 失败: {e}", tmp_path.display()))
        })?;
        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            SchoolError::file_operation(format!("替换 {} 失败: {e}", path.display()))
        })?;
        Ok(())
    }
}

/// 快照文件后端
pub struct SnapshotStore {
    path: PathBuf,
    data: RwLock<SnapshotDocument>,
}

impl SnapshotStore {
    /// 打开快照文件，不存在时以空快照启动（首次写入时创建）
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if tokio::fs::try_exists(&path).await? {
            SnapshotDocument::read_from(&path)
                .await
                .map_err(|e| SchoolError::snapshot_operation(format!("快照文件无法解析: {e}")))?
        } else {
            info!(
                "Snapshot file {} not found, starting with an empty snapshot",
                path.display()
            );
            SnapshotDocument::default()
        };

        debug!(
            "Snapshot store opened at {} ({} collections)",
            path.display(),
            data.collections.len()
        );

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 当前快照内容的副本
    pub async fn document(&self) -> SnapshotDocument {
        self.data.read().await.clone()
    }

    /// 在副本上执行修改，落盘成功后才替换内存状态
    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SnapshotDocument) -> Result<T>,
    {
        let mut guard = self.data.write().await;
        let mut next = guard.clone();
        let output = f(&mut next)?;
        next.write_to(&self.path).await?;
        *guard = next;
        Ok(output)
    }
}

#[async_trait]
impl StorageBackend for SnapshotStore {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Record>> {
        Ok(self.data.read().await.records(collection))
    }

    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        Ok(self
            .data
            .read()
            .await
            .records(collection)
            .into_iter()
            .find(|r| record_id(r) == Some(id)))
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<InsertOutcome> {
        let id = record_id(&record)
            .ok_or_else(|| SchoolError::validation("记录缺少 id 字段"))?
            .to_string();

        self.mutate(|doc| {
            if collection.is_singleton() {
                if doc.settings.is_some() {
                    return Err(SchoolError::validation(format!(
                        "集合 {collection} 已存在记录"
                    )));
                }
                doc.settings = Some(record);
                return Ok(());
            }
            let records = doc.records_mut(collection);
            if records.iter().any(|r| record_id(r) == Some(id.as_str())) {
                return Err(SchoolError::validation(format!(
                    "集合 {collection} 中已存在 id 为 {id} 的记录"
                )));
            }
            records.push(record);
            Ok(())
        })
        .await?;

        Ok(InsertOutcome { id })
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Record,
    ) -> Result<UpdateOutcome> {
        // 未命中时不写文件
        if self.get_by_id(collection, id).await?.is_none() {
            return Ok(UpdateOutcome { matched: 0 });
        }

        let matched = self
            .mutate(|doc| {
                let target = if collection.is_singleton() {
                    doc.settings.as_mut()
                } else {
                    doc.records_mut(collection)
                        .iter_mut()
                        .find(|r| record_id(r) == Some(id))
                };
                Ok(match target {
                    Some(record) => {
                        merge_fields(record, fields);
                        1
                    }
                    None => 0,
                })
            })
            .await?;

        Ok(UpdateOutcome { matched })
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<DeleteOutcome> {
        if self.get_by_id(collection, id).await?.is_none() {
            return Ok(DeleteOutcome { removed: 0 });
        }

        let removed = self
            .mutate(|doc| {
                if collection.is_singleton() {
                    return Ok(u64::from(doc.settings.take().is_some()));
                }
                let records = doc.records_mut(collection);
                let before = records.len();
                records.retain(|r| record_id(r) != Some(id));
                Ok((before - records.len()) as u64)
            })
            .await?;

        Ok(DeleteOutcome { removed })
    }

    async fn insert_many(&self, collection: Collection, records: Vec<Record>) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        if records.iter().any(|r| record_id(r).is_none()) {
            return Err(SchoolError::validation(format!(
                "批量写入 {collection} 时存在缺少 id 的记录"
            )));
        }

        self.mutate(|doc| {
            let mut existing = doc.records(collection);
            for record in &records {
                let id = record_id(record);
                if existing.iter().any(|r| record_id(r) == id) {
                    return Err(SchoolError::validation(format!(
                        "集合 {collection} 中已存在 id 为 {} 的记录",
                        id.unwrap_or_default()
                    )));
                }
                existing.push(record.clone());
            }
            let inserted = records.len() as u64;
            doc.set_records(collection, existing)?;
            Ok(inserted)
        })
        .await
    }

    async fn clear(&self, collection: Collection) -> Result<u64> {
        self.mutate(|doc| {
            let removed = doc.records(collection).len() as u64;
            doc.set_records(collection, Vec::new())?;
            Ok(removed)
        })
        .await
    }

    async fn replace_all(&self, collection: Collection, records: Vec<Record>) -> Result<u64> {
        let mut seen = std::collections::HashSet::new();
        for record in &records {
            let id = record_id(record).ok_or_else(|| {
                SchoolError::validation(format!("替换 {collection} 时存在缺少 id 的记录"))
            })?;
            if !seen.insert(id) {
                return Err(SchoolError::validation(format!(
                    "替换 {collection} 时 id {id} 重复"
                )));
            }
        }

        let count = records.len() as u64;
        self.mutate(|doc| doc.set_records(collection, records)).await?;
        Ok(count)
    }
}
