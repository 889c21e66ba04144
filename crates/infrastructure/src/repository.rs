use std::sync::Arc;

use async_trait::async_trait;
use application::{
    ChatMessageRepository, ChatMessageWithAuthor, GuestRequestQuery, GuestRequestRepository,
    UserRepository,
};
use domain::{
    ActorId, AuditAction, AuditEvent, ChatMessage, GuestRequest, MessageContent, MessageId,
    PasswordHash, RepositoryError, RequestId, Timestamp, User, UserEmail, UserId, Username,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::audit::append_event;
use crate::provisioner::store_user;
use crate::soft_delete::{
    fetch_active, invalid_data, map_sqlx_err, soft_delete_with_audit, SoftDeleteRow,
};

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    storage_quota: i64,
    created_at: Timestamp,
    deleted_at: Option<Timestamp>,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let email =
            UserEmail::parse(value.email).map_err(|err| invalid_data(err.to_string()))?;
        let password = PasswordHash::new(value.password_hash)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(User {
            id: UserId::from(value.id),
            username,
            email,
            password,
            role: value.role,
            storage_quota: value.storage_quota,
            created_at: value.created_at,
            deleted_at: value.deleted_at,
        })
    }
}

impl SoftDeleteRow for UserRecord {
    type Entity = User;

    const TABLE: &'static str = "users";
    const COLUMNS: &'static str =
        "id, username, email, password_hash, role, storage_quota, created_at, deleted_at";

    fn into_entity(self) -> Result<User, RepositoryError> {
        User::try_from(self)
    }
}

#[derive(Debug, FromRow)]
struct GuestRequestRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    approved: Option<bool>,
    created_at: Timestamp,
    deleted_at: Option<Timestamp>,
}

impl TryFrom<GuestRequestRecord> for GuestRequest {
    type Error = RepositoryError;

    fn try_from(value: GuestRequestRecord) -> Result<Self, Self::Error> {
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let email =
            UserEmail::parse(value.email).map_err(|err| invalid_data(err.to_string()))?;
        let password = PasswordHash::new(value.password_hash)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(GuestRequest {
            id: RequestId::from(value.id),
            username,
            email,
            password,
            approved: value.approved,
            created_at: value.created_at,
            deleted_at: value.deleted_at,
        })
    }
}

impl SoftDeleteRow for GuestRequestRecord {
    type Entity = GuestRequest;

    const TABLE: &'static str = "guest_requests";
    const COLUMNS: &'static str =
        "id, username, email, password_hash, approved, created_at, deleted_at";

    fn into_entity(self) -> Result<GuestRequest, RepositoryError> {
        GuestRequest::try_from(self)
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: Timestamp,
    deleted_at: Option<Timestamp>,
}

impl TryFrom<MessageRecord> for ChatMessage {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;

        Ok(ChatMessage {
            id: MessageId::from(value.id),
            author_id: UserId::from(value.author_id),
            content,
            created_at: value.created_at,
            deleted_at: value.deleted_at,
        })
    }
}

impl SoftDeleteRow for MessageRecord {
    type Entity = ChatMessage;

    const TABLE: &'static str = "chat_messages";
    const COLUMNS: &'static str = "id, author_id, content, created_at, deleted_at";

    fn into_entity(self) -> Result<ChatMessage, RepositoryError> {
        ChatMessage::try_from(self)
    }
}

#[derive(Debug, FromRow)]
struct MessageWithAuthorRecord {
    id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: Timestamp,
    deleted_at: Option<Timestamp>,
    author_name: String,
    author_email: String,
}

impl TryFrom<MessageWithAuthorRecord> for ChatMessageWithAuthor {
    type Error = RepositoryError;

    fn try_from(value: MessageWithAuthorRecord) -> Result<Self, Self::Error> {
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        let author_name =
            Username::parse(value.author_name).map_err(|err| invalid_data(err.to_string()))?;
        let author_email =
            UserEmail::parse(value.author_email).map_err(|err| invalid_data(err.to_string()))?;

        Ok(ChatMessageWithAuthor {
            message: ChatMessage {
                id: MessageId::from(value.id),
                author_id: UserId::from(value.author_id),
                content,
                created_at: value.created_at,
                deleted_at: value.deleted_at,
            },
            author_name,
            author_email,
        })
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[derive(Clone)]
pub struct PgChatMessageRepository {
    pool: PgPool,
}

impl PgChatMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatMessageRepository for PgChatMessageRepository {
    async fn create(
        &self,
        message: ChatMessage,
        actor: ActorId,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO chat_messages (id, author_id, content, created_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, author_id, content, created_at, deleted_at
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.author_id))
        .bind(message.content.as_str())
        .bind(message.created_at)
        .bind(message.deleted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;
        let stored = ChatMessage::try_from(record)?;

        let event = AuditEvent::capture(&stored, AuditAction::Create, actor, stored.created_at);
        append_event(&mut tx, &event).await?;
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(stored)
    }

    async fn soft_delete(
        &self,
        id: MessageId,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        soft_delete_with_audit::<MessageRecord>(&self.pool, id.into(), actor, at).await?;
        Ok(())
    }

    async fn find_active_by_id(
        &self,
        id: MessageId,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        fetch_active::<MessageRecord>(&self.pool, id.into()).await
    }

    async fn list_active(&self) -> Result<Vec<ChatMessageWithAuthor>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageWithAuthorRecord>(
            r#"
            SELECT m.id, m.author_id, m.content, m.created_at, m.deleted_at,
                   u.username AS author_name, u.email AS author_email
            FROM chat_messages m
            JOIN users u ON u.id = m.author_id
            WHERE m.deleted_at IS NULL
            ORDER BY m.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records
            .into_iter()
            .map(ChatMessageWithAuthor::try_from)
            .collect()
    }
}

#[derive(Clone)]
pub struct PgGuestRequestRepository {
    pool: PgPool,
}

impl PgGuestRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GuestRequestRepository for PgGuestRequestRepository {
    async fn create(
        &self,
        request: GuestRequest,
        actor: ActorId,
    ) -> Result<GuestRequest, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        // 同名提交在锁上排队，占用检查和插入之间没有窗口
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(request.username.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        let taken: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM users WHERE username = $1 AND deleted_at IS NULL
            UNION ALL
            SELECT 1 FROM guest_requests WHERE username = $1 AND deleted_at IS NULL
            LIMIT 1
            "#,
        )
        .bind(request.username.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;
        if taken.is_some() {
            return Err(RepositoryError::Conflict);
        }

        let record = sqlx::query_as::<_, GuestRequestRecord>(
            r#"
            INSERT INTO guest_requests (id, username, email, password_hash, approved, created_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, password_hash, approved, created_at, deleted_at
            "#,
        )
        .bind(Uuid::from(request.id))
        .bind(request.username.as_str())
        .bind(request.email.as_str())
        .bind(request.password.as_str())
        .bind(request.approved)
        .bind(request.created_at)
        .bind(request.deleted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;
        let stored = GuestRequest::try_from(record)?;

        let event = AuditEvent::capture(&stored, AuditAction::Create, actor, stored.created_at);
        append_event(&mut tx, &event).await?;
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(stored)
    }

    async fn find_by_id(&self, id: RequestId) -> Result<Option<GuestRequest>, RepositoryError> {
        let record = sqlx::query_as::<_, GuestRequestRecord>(
            r#"
            SELECT id, username, email, password_hash, approved, created_at, deleted_at
            FROM guest_requests
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        record.map(GuestRequest::try_from).transpose()
    }

    async fn find_active_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<GuestRequest>, RepositoryError> {
        let record = sqlx::query_as::<_, GuestRequestRecord>(
            r#"
            SELECT id, username, email, password_hash, approved, created_at, deleted_at
            FROM guest_requests
            WHERE username = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        record.map(GuestRequest::try_from).transpose()
    }

    async fn soft_delete(
        &self,
        id: RequestId,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        soft_delete_with_audit::<GuestRequestRecord>(&self.pool, id.into(), actor, at).await?;
        Ok(())
    }

    async fn approve(
        &self,
        id: RequestId,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<(GuestRequest, User), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        // 条件更新锁定活跃行，也是并发裁决的串行化点：
        // 输家等到锁释放后看不到活跃行，得到 NotFound
        let record = sqlx::query_as::<_, GuestRequestRecord>(
            r#"
            UPDATE guest_requests
            SET approved = TRUE, deleted_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, username, email, password_hash, approved, created_at, deleted_at
            "#,
        )
        .bind(Uuid::from(id))
        .bind(at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;
        let approved = GuestRequest::try_from(record)?;

        // 哈希照搬请求行；用户名冲突让整个事务回滚，请求保持待处理
        let user = User::provision(
            UserId::from(Uuid::new_v4()),
            approved.username.clone(),
            approved.email.clone(),
            approved.password.clone(),
            at,
        );
        store_user(&mut tx, &user, &actor, at).await?;

        let update = AuditEvent::capture(&approved, AuditAction::Update, actor.clone(), at);
        append_event(&mut tx, &update).await?;
        let delete = AuditEvent::capture(&approved, AuditAction::Delete, actor, at);
        append_event(&mut tx, &delete).await?;

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok((approved, user))
    }

    async fn list(&self, query: GuestRequestQuery) -> Result<Vec<GuestRequest>, RepositoryError> {
        let column = match query.sort_column {
            Some(0) => "id",
            Some(1) => "username",
            Some(2) => "email",
            Some(4) => "deleted_at IS NOT NULL",
            Some(5) => "COALESCE(approved, FALSE)",
            _ => "created_at",
        };
        let direction = if query.ascending.unwrap_or(true) {
            "ASC"
        } else {
            "DESC"
        };
        let filter = if query.search.is_some() {
            "WHERE username ILIKE $1"
        } else {
            ""
        };
        let sql = format!(
            "SELECT id, username, email, password_hash, approved, created_at, deleted_at \
             FROM guest_requests {filter} ORDER BY {column} {direction}",
        );

        let records = match &query.search {
            Some(search) => {
                let pattern = format!("%{}%", escape_like(search));
                sqlx::query_as::<_, GuestRequestRecord>(&sql)
                    .bind(pattern)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, GuestRequestRecord>(&sql)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx_err)?;

        records.into_iter().map(GuestRequest::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_active_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        fetch_active::<UserRecord>(&self.pool, id.into()).await
    }

    async fn find_active_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, password_hash, role, storage_quota, created_at, deleted_at
            FROM users
            WHERE username = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        record.map(User::try_from).transpose()
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub message_repository: Arc<PgChatMessageRepository>,
    pub guest_request_repository: Arc<PgGuestRequestRepository>,
    pub user_repository: Arc<PgUserRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            message_repository: Arc::new(PgChatMessageRepository::new(pool.clone())),
            guest_request_repository: Arc::new(PgGuestRequestRepository::new(pool.clone())),
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
