//! 聊天消息服务
//!
//! 发帖、删帖、按时间线列出消息。消息一经发出不可修改，
//! 删除是软删除，由存储层连同审计事件一起提交。

use std::sync::Arc;

use uuid::Uuid;

use domain::{ActorId, ChatMessage, DomainError, MessageContent, MessageId, UserId};

use crate::{
    clock::Clock,
    dto::ChatMessageDto,
    error::ApplicationError,
    repository::{ChatMessageRepository, UserRepository},
};

#[derive(Debug, Clone)]
pub struct PostMessageRequest {
    pub author_id: Uuid,
    pub content: String,
}

pub struct ChatServiceDependencies {
    pub message_repository: Arc<dyn ChatMessageRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn post_message(
        &self,
        request: PostMessageRequest,
    ) -> Result<ChatMessageDto, ApplicationError> {
        let content = MessageContent::new(request.content)?;

        // 作者必须是活跃用户
        let author = self
            .deps
            .user_repository
            .find_active_by_id(UserId::from(request.author_id))
            .await?
            .ok_or(ApplicationError::Domain(DomainError::NotFound))?;

        let now = self.deps.clock.now();
        let message = ChatMessage::post(MessageId::from(Uuid::new_v4()), author.id, content, now);

        let stored = self
            .deps
            .message_repository
            .create(message, ActorId::from(author.id))
            .await?;
        Ok(ChatMessageDto::new(&stored, &author.username, &author.email))
    }

    /// 重复删除同一条消息会得到 NotFound。
    pub async fn delete_message(
        &self,
        message_id: Uuid,
        actor: ActorId,
    ) -> Result<(), ApplicationError> {
        let id = MessageId::from(message_id);
        self.deps
            .message_repository
            .find_active_by_id(id)
            .await?
            .ok_or(ApplicationError::Domain(DomainError::NotFound))?;

        // 条件删除兜底并发窗口：活跃行已经没了就报 NotFound
        let now = self.deps.clock.now();
        self.deps.message_repository.soft_delete(id, actor, now).await?;
        Ok(())
    }

    /// 活跃消息按创建时间升序。
    pub async fn list_messages(&self) -> Result<Vec<ChatMessageDto>, ApplicationError> {
        let rows = self.deps.message_repository.list_active().await?;
        Ok(rows.iter().map(ChatMessageDto::from).collect())
    }
}
