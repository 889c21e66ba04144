use domain::{ActorId, AuditAction, AuditEvent, RepositoryError, Timestamp};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::soft_delete::{invalid_data, map_sqlx_err};

/// 追加一条审计事件。
///
/// 调用方负责把它放进和实体变更相同的事务；seq 由序列分配，
/// 同一事务内按写入顺序递增。
pub(crate) async fn append_event(
    conn: &mut PgConnection,
    event: &AuditEvent,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (entity_id, entity_kind, action, actor_id, message, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(event.entity_id)
    .bind(&event.entity_kind)
    .bind(event.action.as_str())
    .bind(event.actor.as_str())
    .bind(&event.message)
    .bind(event.created_at)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;
    Ok(())
}

#[derive(Debug, FromRow)]
struct AuditLogRecord {
    entity_id: Uuid,
    entity_kind: String,
    action: String,
    actor_id: String,
    message: String,
    created_at: Timestamp,
}

impl TryFrom<AuditLogRecord> for AuditEvent {
    type Error = RepositoryError;

    fn try_from(value: AuditLogRecord) -> Result<Self, Self::Error> {
        let action = AuditAction::try_from(value.action.as_str()).map_err(invalid_data)?;
        Ok(AuditEvent {
            entity_id: value.entity_id,
            entity_kind: value.entity_kind,
            action,
            actor: ActorId::new(value.actor_id),
            message: value.message,
            created_at: value.created_at,
        })
    }
}

/// 一个实体的全部审计事件，按写入顺序返回。
pub async fn list_events_for_entity(
    pool: &PgPool,
    entity_id: Uuid,
) -> Result<Vec<AuditEvent>, RepositoryError> {
    let records = sqlx::query_as::<_, AuditLogRecord>(
        r#"
        SELECT entity_id, entity_kind, action, actor_id, message, created_at
        FROM audit_log
        WHERE entity_id = $1
        ORDER BY seq
        "#,
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_err)?;
    records.into_iter().map(AuditEvent::try_from).collect()
}
