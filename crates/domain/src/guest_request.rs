use uuid::Uuid;

use crate::audit::Auditable;
use crate::lifecycle::SoftDeletable;
use crate::value_objects::{PasswordHash, RequestId, Timestamp, UserEmail, Username};

/// 访客提交的注册请求。
///
/// 删除时间戳为空表示待裁决；裁决后请求关闭，approved 记录裁决结果。
/// 历史数据中 approved 可能缺失，按未批准处理。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GuestRequest {
    pub id: RequestId,
    pub username: Username,
    pub email: UserEmail,
    #[serde(skip_serializing)] // 密码哈希不暴露给客户端
    pub password: PasswordHash,
    pub approved: Option<bool>,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl GuestRequest {
    pub fn submit(
        id: RequestId,
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
            approved: Some(false),
            created_at: now,
            deleted_at: None,
        }
    }

    /// 请求尚未被裁决。
    pub fn is_pending(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn is_approved(&self) -> bool {
        self.approved.unwrap_or(false)
    }

    /// 批准：置批准标记并关闭请求。
    pub fn approve(&mut self, at: Timestamp) {
        self.approved = Some(true);
        self.deleted_at = Some(at);
    }

    /// 驳回：直接关闭请求，approved 保持未批准。
    pub fn reject(&mut self, at: Timestamp) {
        self.deleted_at = Some(at);
    }
}

impl SoftDeletable for GuestRequest {
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

impl Auditable for GuestRequest {
    fn audit_kind() -> &'static str {
        "guest_request"
    }

    fn audit_message(&self) -> String {
        self.username.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pending_request() -> GuestRequest {
        GuestRequest::submit(
            RequestId::new(Uuid::new_v4()),
            Username::parse("bob").unwrap(),
            UserEmail::parse("bob@example.com").unwrap(),
            PasswordHash::new("$2b$04$fakefakefakefakefakefake").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn submitted_request_starts_pending_and_unapproved() {
        let request = pending_request();
        assert!(request.is_pending());
        assert!(!request.is_approved());
        assert_eq!(request.approved, Some(false));
    }

    #[test]
    fn approve_closes_the_request() {
        let mut request = pending_request();
        request.approve(Utc::now());

        assert!(!request.is_pending());
        assert!(request.is_approved());
    }

    #[test]
    fn reject_closes_without_approving() {
        let mut request = pending_request();
        request.reject(Utc::now());

        assert!(!request.is_pending());
        assert!(!request.is_approved());
    }

    #[test]
    fn missing_approved_flag_counts_as_unapproved() {
        let mut request = pending_request();
        request.approved = None;
        assert!(!request.is_approved());
    }
}
