pub mod conversation;
pub mod send;

use std::sync::Arc;

use crate::access::{AccessGuard, Actor};
use crate::errors::Result;
use crate::models::messages::entities::Message;
use crate::models::messages::requests::SendMessageRequest;
use crate::storage::{InsertOutcome, PersistenceRouter};

pub struct MessageService {
    router: Arc<PersistenceRouter>,
    guard: AccessGuard,
}

impl MessageService {
    pub fn new(router: Arc<PersistenceRouter>) -> Self {
        Self {
            guard: AccessGuard::new(router.clone()),
            router,
        }
    }

    pub(crate) fn router(&self) -> &PersistenceRouter {
        &self.router
    }

    // 发送消息
    pub async fn send(&self, actor: &Actor, request: SendMessageRequest) -> Result<InsertOutcome> {
        send::send_message(self, actor, request).await
    }

    // 请求方收发的全部消息
    pub async fn conversation_for(&self, actor: &Actor) -> Vec<Message> {
        conversation::conversation_for(self, actor).await
    }

    // 标记已读（仅接收方）
    pub async fn mark_read(&self, actor: &Actor, message_id: &str) -> Result<()> {
        conversation::mark_read(self, actor, message_id).await
    }
}
