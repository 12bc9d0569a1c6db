use serde_json::json;
use tracing::warn;

use super::MessageService;
use crate::access::{Actor, resolver};
use crate::errors::{Result, SchoolError};
use crate::models::Collection;
use crate::models::common::{from_record, record_from_value};
use crate::models::messages::entities::Message;
use crate::storage::Filter;

/// 请求方作为发送方或接收方的消息，按时间排序
pub async fn conversation_for(service: &MessageService, actor: &Actor) -> Vec<Message> {
    let filter = Filter::any([
        Filter::eq("senderId", actor.id.as_str()).and("senderRole", actor.role.as_str()),
        Filter::eq("receiverId", actor.id.as_str()).and("receiverRole", actor.role.as_str()),
    ]);

    let mut messages: Vec<Message> = service
        .router()
        .find(Collection::Messages, &filter)
        .await
        .into_iter()
        .filter_map(|record| match from_record(record) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping unparsable message: {}", e);
                None
            }
        })
        .collect();
    messages.sort_by_key(|m| m.created_at);
    messages
}

pub async fn mark_read(service: &MessageService, actor: &Actor, message_id: &str) -> Result<()> {
    service
        .guard
        .can_access_message(actor, message_id)
        .await
        .into_result()?;

    let record = service
        .router()
        .get_by_id(Collection::Messages, message_id)
        .await
        .ok_or_else(|| SchoolError::not_found(format!("消息 {message_id} 不存在")))?;
    let message: Message = from_record(record)?;

    // 发送方可以查看但不能标记已读
    let receiver = resolver::can_access_own_record(
        &actor.id,
        actor.role,
        &message.receiver_id,
        message.receiver_role,
    );
    if !receiver.is_allowed() {
        return Err(SchoolError::authorization("只有接收方可以标记已读"));
    }
    if message.read {
        return Ok(());
    }

    service
        .router()
        .update(
            Collection::Messages,
            message_id,
            record_from_value(json!({ "read": true }))?,
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::test_support::snapshot_router;

    async fn service() -> (tempfile::TempDir, MessageService) {
        let (dir, router) = snapshot_router(json!({
            "messages": [
                {"id": "m1", "senderId": "T1", "senderRole": "teacher", "receiverId": "P1",
                 "receiverRole": "parent", "subject": "a", "content": "a",
                 "createdAt": "2025-01-02T00:00:00Z"},
                {"id": "m2", "senderId": "P1", "senderRole": "parent", "receiverId": "T1",
                 "receiverRole": "teacher", "subject": "b", "content": "b",
                 "createdAt": "2025-01-01T00:00:00Z"},
                {"id": "m3", "senderId": "T2", "senderRole": "teacher", "receiverId": "S1",
                 "receiverRole": "student", "subject": "c", "content": "c"},
                {"id": "m4", "senderId": "A1", "senderRole": "admin", "receiverId": "P1",
                 "receiverRole": "student", "subject": "d", "content": "d"}
            ]
        }))
        .await;
        (dir, MessageService::new(router))
    }

    #[tokio::test]
    async fn test_conversation_matches_either_side() {
        let (_dir, service) = service().await;
        let ids: Vec<String> = service
            .conversation_for(&Actor::new("P1", Role::Guardian))
            .await
            .into_iter()
            .map(|m| m.id)
            .collect();
        // m4 的接收方 id 相同但角色不同
        assert_eq!(ids, vec!["m2", "m1"]);
    }

    #[tokio::test]
    async fn test_mark_read_only_by_receiver() {
        let (_dir, service) = service().await;

        let err = service
            .mark_read(&Actor::new("T1", Role::Teacher), "m1")
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolError::Authorization(_)));

        service.mark_read(&Actor::new("P1", Role::Guardian), "m1").await.unwrap();
        let stored = service.router().get_by_id(Collection::Messages, "m1").await.unwrap();
        assert_eq!(stored["read"], true);

        let err = service
            .mark_read(&Actor::new("S1", Role::Student), "m1")
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolError::Authorization(_)));

        let err = service
            .mark_read(&Actor::new("P1", Role::Guardian), "m404")
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolError::NotFound(_)));
    }
}
