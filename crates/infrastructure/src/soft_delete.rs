use domain::{ActorId, AuditAction, AuditEvent, Auditable, RepositoryError, Timestamp};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::audit::append_event;

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        other => RepositoryError::storage(other.to_string()),
    }
}

pub(crate) fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

/// 软删除表的行映射：表名、列清单、行到实体的转换。
///
/// 三张实体表共用同一套「活跃行查询 + 条件打删除戳」的 SQL，
/// 每张表只声明差异部分。
pub(crate) trait SoftDeleteRow: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    type Entity: Auditable + Send;

    const TABLE: &'static str;
    const COLUMNS: &'static str;

    fn into_entity(self) -> Result<Self::Entity, RepositoryError>;
}

/// 按主键取活跃行，已删除的行视为不存在。
pub(crate) async fn fetch_active<R: SoftDeleteRow>(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<R::Entity>, RepositoryError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = $1 AND deleted_at IS NULL",
        R::COLUMNS,
        R::TABLE,
    );
    let record = sqlx::query_as::<_, R>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_err)?;
    record.map(R::into_entity).transpose()
}

/// 给活跃行打删除戳并返回删除后的实体。
///
/// 条件更新就是并发删除的裁决点：同一行的第二次删除
/// 看不到活跃行，返回 [`RepositoryError::NotFound`]。
pub(crate) async fn delete_active<R: SoftDeleteRow>(
    conn: &mut PgConnection,
    id: Uuid,
    at: Timestamp,
) -> Result<R::Entity, RepositoryError> {
    let sql = format!(
        "UPDATE {} SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
        R::TABLE,
        R::COLUMNS,
    );
    let record = sqlx::query_as::<_, R>(&sql)
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;
    record.into_entity()
}

/// 软删除加审计 DELETE，两条写入在同一个事务里提交。
pub(crate) async fn soft_delete_with_audit<R: SoftDeleteRow>(
    pool: &PgPool,
    id: Uuid,
    actor: ActorId,
    at: Timestamp,
) -> Result<R::Entity, RepositoryError> {
    let mut tx = pool.begin().await.map_err(map_sqlx_err)?;
    let entity = delete_active::<R>(&mut tx, id, at).await?;
    let event = AuditEvent::capture(&entity, AuditAction::Delete, actor, at);
    append_event(&mut tx, &event).await?;
    tx.commit().await.map_err(map_sqlx_err)?;
    Ok(entity)
}
