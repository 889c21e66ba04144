use std::sync::Arc;

use async_trait::async_trait;
use application::{NewUser, PasswordHasher, ProvisionError, UserProvisioner};
use domain::{
    ActorId, AuditAction, AuditEvent, PasswordHash, RepositoryError, Timestamp, User, UserId,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::audit::append_event;
use crate::soft_delete::map_sqlx_err;

/// 在调用方的事务里写入用户行和对应的审计 CREATE 事件。
///
/// 活跃用户名的唯一索引兜底并发窗口，约束冲突映射为
/// [`RepositoryError::Conflict`]。
pub(crate) async fn store_user(
    conn: &mut PgConnection,
    user: &User,
    actor: &ActorId,
    at: Timestamp,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash, role, storage_quota, created_at, deleted_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::from(user.id))
    .bind(user.username.as_str())
    .bind(user.email.as_str())
    .bind(user.password.as_str())
    .bind(&user.role)
    .bind(user.storage_quota)
    .bind(user.created_at)
    .bind(user.deleted_at)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;

    let event = AuditEvent::capture(user, AuditAction::Create, actor.clone(), at);
    append_event(conn, &event).await
}

/// 基于 Postgres 的账号开通。
///
/// 审批路径在请求仓储的事务里直接落用户行；
/// 这里是给其余开通场景用的独立入口。
#[derive(Clone)]
pub struct PgUserProvisioner {
    pool: PgPool,
    hasher: Arc<dyn PasswordHasher>,
}

impl PgUserProvisioner {
    pub fn new(pool: PgPool, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { pool, hasher }
    }
}

#[async_trait]
impl UserProvisioner for PgUserProvisioner {
    async fn provision_prehashed(
        &self,
        new_user: NewUser,
        password: PasswordHash,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<User, ProvisionError> {
        let user = User::provision(
            UserId::from(Uuid::new_v4()),
            new_user.username,
            new_user.email,
            password,
            at,
        );

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        store_user(&mut tx, &user, &actor, at).await?;
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(user)
    }

    async fn provision_with_password(
        &self,
        new_user: NewUser,
        password: &str,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<User, ProvisionError> {
        let hash = self
            .hasher
            .hash(password)
            .await
            .map_err(|err| ProvisionError::Failed(err.to_string()))?;
        self.provision_prehashed(new_user, hash, actor, at).await
    }
}
