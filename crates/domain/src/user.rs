use uuid::Uuid;

use crate::audit::Auditable;
use crate::lifecycle::SoftDeletable;
use crate::value_objects::{PasswordHash, Timestamp, UserEmail, UserId, Username};

/// 新开通账号的默认角色。
pub const DEFAULT_USER_ROLE: &str = "user";

/// 平台用户账号。
///
/// 本子系统只负责审批通过后的开通，账号管理属于平台其他模块。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: UserEmail,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password: PasswordHash,
    pub role: String,
    pub storage_quota: i64,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl User {
    /// 开通账号：默认角色，零存储配额。
    pub fn provision(
        id: UserId,
        username: Username,
        email: UserEmail,
        password: PasswordHash,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            email,
            password,
            role: DEFAULT_USER_ROLE.to_owned(),
            storage_quota: 0,
            created_at: now,
            deleted_at: None,
        }
    }
}

impl SoftDeletable for User {
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

impl Auditable for User {
    fn audit_kind() -> &'static str {
        "user"
    }

    fn audit_message(&self) -> String {
        self.username.to_string()
    }
}
