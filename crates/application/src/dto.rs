use data_encoding::HEXLOWER;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use domain::{GuestRequest, UserEmail, Username};

use crate::repository::ChatMessageWithAuthor;

/// 聊天消息视图，时间为 Unix 毫秒。
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessageDto {
    pub id: Uuid,
    pub content: String,
    pub creator: String,
    pub creator_gravatar: String,
    pub create_date: i64,
}

impl ChatMessageDto {
    pub fn new(
        message: &domain::ChatMessage,
        author_name: &Username,
        author_email: &UserEmail,
    ) -> Self {
        Self {
            id: message.id.into(),
            content: message.content.as_str().to_owned(),
            creator: author_name.to_string(),
            creator_gravatar: gravatar_hash(author_email.as_str()),
            create_date: message.created_at.timestamp_millis(),
        }
    }
}

impl From<&ChatMessageWithAuthor> for ChatMessageDto {
    fn from(value: &ChatMessageWithAuthor) -> Self {
        Self::new(&value.message, &value.author_name, &value.author_email)
    }
}

/// 注册请求视图。
#[derive(Debug, Clone, Serialize)]
pub struct GuestRequestDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub create_date: i64,
    pub deleted: bool,
    pub approved: bool,
}

impl From<&GuestRequest> for GuestRequestDto {
    fn from(value: &GuestRequest) -> Self {
        Self {
            id: value.id.into(),
            username: value.username.to_string(),
            email: value.email.to_string(),
            create_date: value.created_at.timestamp_millis(),
            deleted: value.deleted_at.is_some(),
            approved: value.is_approved(),
        }
    }
}

/// 头像服务使用的邮箱指纹：小写去空白后的 SHA-256 十六进制。
fn gravatar_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    HEXLOWER.encode(&digest)
}
