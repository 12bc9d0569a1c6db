use chrono::Utc;
use tracing::info;

use super::MessageService;
use crate::access::Actor;
use crate::errors::{Result, SchoolError};
use crate::models::common::{new_record_id, to_record};
use crate::models::messages::entities::Message;
use crate::models::messages::requests::SendMessageRequest;
use crate::storage::InsertOutcome;

pub async fn send_message(
    service: &MessageService,
    actor: &Actor,
    request: SendMessageRequest,
) -> Result<InsertOutcome> {
    if request.subject.trim().is_empty() || request.content.trim().is_empty() {
        return Err(SchoolError::validation("消息主题和内容不能为空"));
    }

    if service
        .router()
        .get_by_id(actor.role.collection(), &actor.id)
        .await
        .is_none()
    {
        return Err(SchoolError::authorization("发送方账户不存在"));
    }
    if service
        .router()
        .get_by_id(request.receiver_role.collection(), &request.receiver_id)
        .await
        .is_none()
    {
        return Err(SchoolError::not_found(format!(
            "接收方 {}/{} 不存在",
            request.receiver_role, request.receiver_id
        )));
    }

    let message = Message {
        id: new_record_id(),
        sender_id: actor.id.clone(),
        sender_role: actor.role,
        receiver_id: request.receiver_id,
        receiver_role: request.receiver_role,
        subject: request.subject,
        content: request.content,
        read: false,
        created_at: Some(Utc::now()),
    };
    let outcome = service
        .router()
        .insert(crate::models::Collection::Messages, to_record(&message)?)
        .await?;
    info!(
        "Message {} sent from {} to {}",
        outcome.id, message.sender_id, message.receiver_id
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Collection, Role};
    use crate::test_support::snapshot_router;
    use serde_json::json;

    fn request(receiver_id: &str, receiver_role: Role) -> SendMessageRequest {
        SendMessageRequest {
            receiver_id: receiver_id.to_string(),
            receiver_role,
            subject: "Réunion".to_string(),
            content: "Rendez-vous jeudi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_requires_existing_receiver() {
        let (_dir, router) = snapshot_router(json!({
            "teachers": [{"id": "T1", "name": "T", "email": "t@s"}],
            "parents": [{"id": "P1", "name": "P", "email": "p@s"}]
        }))
        .await;
        let service = MessageService::new(router.clone());
        let teacher = Actor::new("T1", Role::Teacher);

        let outcome = service.send(&teacher, request("P1", Role::Guardian)).await.unwrap();
        let stored = router.get_by_id(Collection::Messages, &outcome.id).await.unwrap();
        assert_eq!(stored["receiverRole"], "parent");
        assert_eq!(stored["read"], false);

        // id 存在但角色不对
        let err = service.send(&teacher, request("P1", Role::Student)).await.unwrap_err();
        assert!(matches!(err, SchoolError::NotFound(_)));

        let err = service
            .send(&Actor::new("T9", Role::Teacher), request("P1", Role::Guardian))
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolError::Authorization(_)));
    }
}
