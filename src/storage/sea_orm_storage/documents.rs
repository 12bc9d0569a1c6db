//! 文档存储操作

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use super::SeaOrmStore;
use crate::entity::documents::{ActiveModel, Column, Entity as Documents};
use crate::errors::{Result, SchoolError};
use crate::models::common::{merge_fields, record_id};
use crate::models::{Collection, Record};
use crate::storage::{DeleteOutcome, InsertOutcome, StorageBackend, UpdateOutcome};

impl SeaOrmStore {
    fn active_model(collection: Collection, id: &str, record: &Record) -> Result<ActiveModel> {
        Ok(ActiveModel {
            collection: Set(collection.as_str().to_string()),
            record_id: Set(id.to_string()),
            data: Set(serde_json::to_string(record)?),
            updated_at: Set(chrono::Utc::now().timestamp()),
        })
    }

    fn require_id(collection: Collection, record: &Record) -> Result<String> {
        record_id(record)
            .map(str::to_string)
            .ok_or_else(|| SchoolError::validation(format!("写入 {collection} 的记录缺少 id 字段")))
    }
}

#[async_trait]
impl StorageBackend for SeaOrmStore {
    fn name(&self) -> &'static str {
        "primary"
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Record>> {
        let models = Documents::find()
            .filter(Column::Collection.eq(collection.as_str()))
            .order_by_asc(Column::RecordId)
            .all(&self.db)
            .await
            .map_err(|e| SchoolError::database_operation(format!("查询 {collection} 失败: {e}")))?;

        models.into_iter().map(|m| m.into_record()).collect()
    }

    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        let model = Documents::find_by_id((collection.as_str().to_string(), id.to_string()))
            .one(&self.db)
            .await
            .map_err(|e| SchoolError::database_operation(format!("查询 {collection} 失败: {e}")))?;

        model.map(|m| m.into_record()).transpose()
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<InsertOutcome> {
        let id = Self::require_id(collection, &record)?;

        if collection.is_singleton() && self.count(collection).await? > 0 {
            return Err(SchoolError::validation(format!("集合 {collection} 已存在记录")));
        }
        if self.get_by_id(collection, &id).await?.is_some() {
            return Err(SchoolError::validation(format!(
                "集合 {collection} 中已存在 id 为 {id} 的记录"
            )));
        }

        Self::active_model(collection, &id, &record)?
            .insert(&self.db)
            .await
            .map_err(|e| SchoolError::database_operation(format!("写入 {collection} 失败: {e}")))?;

        Ok(InsertOutcome { id })
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Record,
    ) -> Result<UpdateOutcome> {
        // 先检查记录是否存在
        let Some(mut existing) = self.get_by_id(collection, id).await? else {
            return Ok(UpdateOutcome { matched: 0 });
        };
        merge_fields(&mut existing, fields);

        Self::active_model(collection, id, &existing)?
            .update(&self.db)
            .await
            .map_err(|e| SchoolError::database_operation(format!("更新 {collection} 失败: {e}")))?;

        Ok(UpdateOutcome { matched: 1 })
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<DeleteOutcome> {
        let result = Documents::delete_by_id((collection.as_str().to_string(), id.to_string()))
            .exec(&self.db)
            .await
            .map_err(|e| SchoolError::database_operation(format!("删除 {collection} 失败: {e}")))?;

        Ok(DeleteOutcome {
            removed: result.rows_affected,
        })
    }

    async fn count(&self, collection: Collection) -> Result<u64> {
        Documents::find()
            .filter(Column::Collection.eq(collection.as_str()))
            .count(&self.db)
            .await
            .map_err(|e| SchoolError::database_operation(format!("统计 {collection} 失败: {e}")))
    }

    async fn insert_many(&self, collection: Collection, records: Vec<Record>) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        if collection.is_singleton() && records.len() > 1 {
            return Err(SchoolError::validation(format!(
                "集合 {collection} 只能保存一条记录，收到 {} 条",
                records.len()
            )));
        }

        let models = records
            .iter()
            .map(|r| Self::active_model(collection, &Self::require_id(collection, r)?, r))
            .collect::<Result<Vec<_>>>()?;

        // 同一集合的批量写入在单个事务内完成
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| SchoolError::database_operation(format!("开启事务失败: {e}")))?;
        for model in models {
            model.insert(&txn).await.map_err(|e| {
                SchoolError::database_operation(format!("批量写入 {collection} 失败: {e}"))
            })?;
        }
        txn.commit()
            .await
            .map_err(|e| SchoolError::database_operation(format!("提交事务失败: {e}")))?;

        Ok(records.len() as u64)
    }

    async fn clear(&self, collection: Collection) -> Result<u64> {
        let result = Documents::delete_many()
            .filter(Column::Collection.eq(collection.as_str()))
            .exec(&self.db)
            .await
            .map_err(|e| SchoolError::database_operation(format!("清空 {collection} 失败: {e}")))?;

        Ok(result.rows_affected)
    }

    async fn replace_all(&self, collection: Collection, records: Vec<Record>) -> Result<u64> {
        if collection.is_singleton() && records.len() > 1 {
            return Err(SchoolError::validation(format!(
                "集合 {collection} 只能保存一条记录，收到 {} 条",
                records.len()
            )));
        }

        let models = records
            .iter()
            .map(|r| Self::active_model(collection, &Self::require_id(collection, r)?, r))
            .collect::<Result<Vec<_>>>()?;

        // 删除与写入同在一个事务内，未提交的事务在 drop 时回滚
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| SchoolError::database_operation(format!("开启事务失败: {e}")))?;
        Documents::delete_many()
            .filter(Column::Collection.eq(collection.as_str()))
            .exec(&txn)
            .await
            .map_err(|e| SchoolError::database_operation(format!("清空 {collection} 失败: {e}")))?;
        for model in models {
            model.insert(&txn).await.map_err(|e| {
                SchoolError::database_operation(format!("替换 {collection} 失败: {e}"))
            })?;
        }
        txn.commit()
            .await
            .map_err(|e| SchoolError::database_operation(format!("提交事务失败: {e}")))?;

        Ok(records.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::super::memory_store;
    use super::*;
    use crate::models::common::record_from_value;
    use crate::storage::Filter;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        record_from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_get_by_id_round_trip() {
        let store = memory_store().await;
        let admin = record(json!({
            "id": "1",
            "name": "Root Admin",
            "email": "root@school",
            "isPrimary": true
        }));
        store.insert(Collection::Admins, admin.clone()).await.unwrap();

        assert_eq!(
            store.get_by_id(Collection::Admins, "1").await.unwrap(),
            Some(admin.clone())
        );
        assert_eq!(store.get_all(Collection::Admins).await.unwrap(), vec![admin]);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = memory_store().await;
        store
            .insert(Collection::Teachers, record(json!({"id": "x"})))
            .await
            .unwrap();
        store
            .insert(Collection::Students, record(json!({"id": "x", "classId": "c1"})))
            .await
            .unwrap();

        assert_eq!(store.count(Collection::Teachers).await.unwrap(), 1);
        assert_eq!(store.delete(Collection::Teachers, "x").await.unwrap().removed, 1);
        assert!(store.get_by_id(Collection::Students, "x").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = memory_store().await;
        store
            .insert(
                Collection::Classes,
                record(json!({"id": "c1", "name": "6eA", "level": "6e"})),
            )
            .await
            .unwrap();

        let outcome = store
            .update(Collection::Classes, "c1", record(json!({"name": "6eB"})))
            .await
            .unwrap();
        assert_eq!(outcome.matched, 1);

        let class = store.get_by_id(Collection::Classes, "c1").await.unwrap().unwrap();
        assert_eq!(class["name"], "6eB");
        assert_eq!(class["level"], "6e");

        let missing = store
            .update(Collection::Classes, "c9", record(json!({"name": "x"})))
            .await
            .unwrap();
        assert_eq!(missing.matched, 0);
    }

    #[tokio::test]
    async fn test_find_with_equality_filter() {
        let store = memory_store().await;
        store
            .insert_many(
                Collection::Grades,
                vec![
                    record(json!({"id": "g1", "studentId": "s1"})),
                    record(json!({"id": "g2", "studentId": "s2"})),
                    record(json!({"id": "g3", "studentId": "s1"})),
                ],
            )
            .await
            .unwrap();

        let found = store
            .find(Collection::Grades, &Filter::eq("studentId", "s1"))
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["g1", "g3"]);
    }

    #[tokio::test]
    async fn test_duplicate_and_singleton_rejected() {
        let store = memory_store().await;
        store
            .insert(Collection::Settings, record(json!({"id": "settings"})))
            .await
            .unwrap();
        assert!(
            store
                .insert(Collection::Settings, record(json!({"id": "another"})))
                .await
                .is_err()
        );
        store
            .insert(Collection::Messages, record(json!({"id": "m1"})))
            .await
            .unwrap();
        assert!(
            store
                .insert(Collection::Messages, record(json!({"id": "m1"})))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_clear_removes_only_collection() {
        let store = memory_store().await;
        store
            .insert_many(
                Collection::Submissions,
                vec![record(json!({"id": "a"})), record(json!({"id": "b"}))],
            )
            .await
            .unwrap();
        store
            .insert(Collection::Exercises, record(json!({"id": "e1"})))
            .await
            .unwrap();

        assert_eq!(store.clear(Collection::Submissions).await.unwrap(), 2);
        assert_eq!(store.count(Collection::Submissions).await.unwrap(), 0);
        assert_eq!(store.count(Collection::Exercises).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_all_rolls_back_on_failure() {
        let store = memory_store().await;
        store
            .insert_many(
                Collection::Grades,
                vec![record(json!({"id": "old1"})), record(json!({"id": "old2"}))],
            )
            .await
            .unwrap();

        // 重复 id 使第二条写入失败，整个替换回滚
        assert!(
            store
                .replace_all(
                    Collection::Grades,
                    vec![record(json!({"id": "g1"})), record(json!({"id": "g1"}))],
                )
                .await
                .is_err()
        );
        let grades = store.get_all(Collection::Grades).await.unwrap();
        let ids: Vec<_> = grades.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["old1", "old2"]);

        assert_eq!(
            store
                .replace_all(Collection::Grades, vec![record(json!({"id": "g1"}))])
                .await
                .unwrap(),
            1
        );
        let grades = store.get_all(Collection::Grades).await.unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0]["id"], "g1");
    }
}
