use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::SoftDeletable;
use crate::value_objects::{ActorId, Timestamp};

/// 审计动作类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AuditAction {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            other => Err(format!("unknown audit action: {}", other)),
        }
    }
}

/// 可以写入审计日志的实体。
pub trait Auditable: SoftDeletable {
    /// 实体类型标签。
    fn audit_kind() -> &'static str;

    /// 写入日志的实体快照描述。
    fn audit_message(&self) -> String;
}

/// 一条审计事件：实体快照、动作、操作者。
///
/// 与触发它的实体变更在同一个工作单元内落库。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub entity_id: Uuid,
    pub entity_kind: String,
    pub action: AuditAction,
    pub actor: ActorId,
    pub message: String,
    pub created_at: Timestamp,
}

impl AuditEvent {
    /// 为实体的一次变更生成审计事件。
    pub fn capture<E: Auditable>(
        entity: &E,
        action: AuditAction,
        actor: ActorId,
        at: Timestamp,
    ) -> Self {
        Self {
            entity_id: entity.id(),
            entity_kind: E::audit_kind().to_owned(),
            action,
            actor,
            message: entity.audit_message(),
            created_at: at,
        }
    }
}
