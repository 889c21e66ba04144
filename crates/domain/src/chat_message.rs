use uuid::Uuid;

use crate::audit::Auditable;
use crate::lifecycle::SoftDeletable;
use crate::value_objects::{MessageContent, MessageId, Timestamp, UserId};

/// 公共聊天板上的一条消息，发布后内容不可修改。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub author_id: UserId,
    pub content: MessageContent,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl ChatMessage {
    pub fn post(
        id: MessageId,
        author_id: UserId,
        content: MessageContent,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            author_id,
            content,
            created_at: now,
            deleted_at: None,
        }
    }
}

impl SoftDeletable for ChatMessage {
    fn id(&self) -> Uuid {
        self.id.into()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn deleted_at(&self) -> Option<Timestamp> {
        self.deleted_at
    }

    fn mark_deleted(&mut self, at: Timestamp) {
        self.deleted_at = Some(at);
    }
}

impl Auditable for ChatMessage {
    fn audit_kind() -> &'static str {
        "chat_message"
    }

    fn audit_message(&self) -> String {
        self.id.to_string()
    }
}
