//! 全校设置（单例记录，固定 id）

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::errors::{Result, SchoolError};
use crate::models::common::{from_record, merge_fields, to_record};
use crate::models::system::entities::{SETTINGS_ID, Settings};
use crate::models::{Collection, Record};
use crate::storage::PersistenceRouter;

pub struct SettingsService {
    router: Arc<PersistenceRouter>,
}

impl SettingsService {
    pub fn new(router: Arc<PersistenceRouter>) -> Self {
        Self { router }
    }

    async fn current_record(&self) -> Option<Record> {
        self.router
            .get_all(Collection::Settings)
            .await
            .into_iter()
            .next()
    }

    /// 读取设置，不存在时返回 None
    pub async fn get(&self) -> Option<Settings> {
        let record = self.current_record().await?;
        from_record(record).ok()
    }

    /// 合并更新设置，返回更新后的结果
    pub async fn update(&self, fields: Record) -> Result<Settings> {
        let Some(mut record) = self.current_record().await else {
            return Err(SchoolError::not_found("设置尚未初始化"));
        };

        let mut fields = fields;
        fields.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        merge_fields(&mut record, fields.clone());
        // 先校验合并结果，再写入
        let settings: Settings = from_record(record)?;

        self.router
            .update(Collection::Settings, &settings.id, fields)
            .await?;
        Ok(settings)
    }

    /// 不存在时写入默认设置
    pub async fn ensure_default(&self, school_name: &str) -> Result<Settings> {
        if let Some(settings) = self.get().await {
            return Ok(settings);
        }

        let settings = Settings::with_school_name(school_name);
        self.router
            .insert(Collection::Settings, to_record(&settings)?)
            .await?;
        info!("Default settings seeded with id {}", SETTINGS_ID);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, snapshot_router};
    use serde_json::json;

    #[tokio::test]
    async fn test_ensure_default_is_idempotent() {
        let (_dir, router) = snapshot_router(json!({})).await;
        let service = SettingsService::new(router.clone());

        assert!(service.get().await.is_none());
        let first = service.ensure_default("Collège Jean Moulin").await.unwrap();
        assert_eq!(first.id, SETTINGS_ID);

        let second = service.ensure_default("Autre").await.unwrap();
        assert_eq!(second.school_name, "Collège Jean Moulin");
        assert_eq!(router.count(Collection::Settings).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_custom_fields() {
        let (_dir, router) = snapshot_router(json!({
            "settings": {"id": "settings", "schoolName": "Old", "theme": "dark"}
        }))
        .await;
        let service = SettingsService::new(router);

        let updated = service
            .update(record(json!({"schoolName": "New", "schoolYear": "2025-2026"})))
            .await
            .unwrap();
        assert_eq!(updated.school_name, "New");

        let stored = service.get().await.unwrap();
        assert_eq!(stored.school_name, "New");
        assert_eq!(stored.school_year.as_deref(), Some("2025-2026"));
        assert_eq!(stored.extra.get("theme"), Some(&json!("dark")));
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_update_without_settings_is_not_found() {
        let (_dir, router) = snapshot_router(json!({})).await;
        let service = SettingsService::new(router);
        let err = service.update(record(json!({"schoolName": "x"}))).await.unwrap_err();
        assert!(matches!(err, SchoolError::NotFound(_)));
    }
}
