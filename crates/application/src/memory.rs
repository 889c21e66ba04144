//! 内存存储适配器（用于测试和本地开发）。
//!
//! 与 Postgres 适配器实现相同的端口契约：软删除、审计事件、
//! 用户名占用检查的语义保持一致。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use domain::{
    ActorId, AuditAction, AuditEvent, Auditable, ChatMessage, GuestRequest, MessageId,
    PasswordHash, RepositoryError, RequestId, SoftDeletable, Timestamp, User, UserId, Username,
};

use crate::password::PasswordHasher;
use crate::provisioner::{NewUser, ProvisionError, UserProvisioner};
use crate::repository::{
    ChatMessageRepository, ChatMessageWithAuthor, GuestRequestQuery, GuestRequestRepository,
    UserRepository,
};

/// 软删除实体的通用内存货架。
#[derive(Debug)]
struct Shelf<E> {
    items: Vec<E>,
}

impl<E> Default for Shelf<E> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<E: SoftDeletable + Clone> Shelf<E> {
    fn insert(&mut self, entity: E) -> E {
        self.items.push(entity.clone());
        entity
    }

    /// 按ID查找，包含已删除的行。
    fn find(&self, id: Uuid) -> Option<&E> {
        self.items.iter().find(|entity| entity.id() == id)
    }

    fn find_active(&self, id: Uuid) -> Option<&E> {
        self.items
            .iter()
            .find(|entity| entity.id() == id && entity.is_active())
    }

    /// 给活跃行打删除戳，没有活跃行时返回 NotFound。
    fn soft_delete(&mut self, id: Uuid, at: Timestamp) -> Result<E, RepositoryError> {
        let entity = self
            .items
            .iter_mut()
            .find(|entity| entity.id() == id && entity.is_active())
            .ok_or(RepositoryError::NotFound)?;
        entity.mark_deleted(at);
        Ok(entity.clone())
    }

    fn active(&self) -> impl Iterator<Item = &E> {
        self.items.iter().filter(|entity| entity.is_active())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    users: Shelf<User>,
    requests: Shelf<GuestRequest>,
    messages: Shelf<ChatMessage>,
    audit_log: Vec<AuditEvent>,
}

impl MemoryState {
    fn record<E: Auditable>(
        &mut self,
        entity: &E,
        action: AuditAction,
        actor: ActorId,
        at: Timestamp,
    ) {
        self.audit_log
            .push(AuditEvent::capture(entity, action, actor, at));
    }

    /// 用户名占用检查：活跃用户和活跃注册请求共享同一个命名空间。
    fn username_taken(&self, username: &Username) -> bool {
        self.users
            .active()
            .any(|user| user.username == *username)
            || self
                .requests
                .active()
                .any(|request| request.username == *username)
    }

    /// 落一个新用户并记审计 CREATE，用户名撞上活跃用户时返回 Conflict。
    fn store_user(
        &mut self,
        user: User,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<User, RepositoryError> {
        let taken = self
            .users
            .active()
            .any(|existing| existing.username == user.username);
        if taken {
            return Err(RepositoryError::Conflict);
        }
        let stored = self.users.insert(user);
        self.record(&stored, AuditAction::Create, actor, at);
        Ok(stored)
    }
}

/// 全部端口的内存实现，内部用一把锁保证检查加写入的原子性。
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接塞入一个用户，测试准备数据用，不产生审计事件。
    pub async fn insert_user(&self, user: User) {
        let mut state = self.state.lock().await;
        state.users.insert(user);
    }

    /// 当前累计的审计事件，按写入顺序。
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.state.lock().await.audit_log.clone()
    }
}

#[async_trait]
impl ChatMessageRepository for MemoryStorage {
    async fn create(
        &self,
        message: ChatMessage,
        actor: ActorId,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut state = self.state.lock().await;
        let stored = state.messages.insert(message);
        let at = stored.created_at;
        state.record(&stored, AuditAction::Create, actor, at);
        Ok(stored)
    }

    async fn soft_delete(
        &self,
        id: MessageId,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let deleted = state.messages.soft_delete(id.into(), at)?;
        state.record(&deleted, AuditAction::Delete, actor, at);
        Ok(())
    }

    async fn find_active_by_id(
        &self,
        id: MessageId,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.messages.find_active(id.into()).cloned())
    }

    async fn list_active(&self) -> Result<Vec<ChatMessageWithAuthor>, RepositoryError> {
        let state = self.state.lock().await;
        let mut rows: Vec<ChatMessageWithAuthor> = state
            .messages
            .active()
            .filter_map(|message| {
                state
                    .users
                    .find(Uuid::from(message.author_id))
                    .map(|author| ChatMessageWithAuthor {
                        message: message.clone(),
                        author_name: author.username.clone(),
                        author_email: author.email.clone(),
                    })
            })
            .collect();
        rows.sort_by_key(|row| row.message.created_at);
        Ok(rows)
    }
}

#[async_trait]
impl GuestRequestRepository for MemoryStorage {
    async fn create(
        &self,
        request: GuestRequest,
        actor: ActorId,
    ) -> Result<GuestRequest, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.username_taken(&request.username) {
            return Err(RepositoryError::Conflict);
        }
        let stored = state.requests.insert(request);
        let at = stored.created_at;
        state.record(&stored, AuditAction::Create, actor, at);
        Ok(stored)
    }

    async fn find_by_id(&self, id: RequestId) -> Result<Option<GuestRequest>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.requests.find(id.into()).cloned())
    }

    async fn find_active_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<GuestRequest>, RepositoryError> {
        let state = self.state.lock().await;
        let found = state
            .requests
            .active()
            .find(|request| request.username == *username)
            .cloned();
        Ok(found)
    }

    async fn soft_delete(
        &self,
        id: RequestId,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let deleted = state.requests.soft_delete(id.into(), at)?;
        state.record(&deleted, AuditAction::Delete, actor, at);
        Ok(())
    }

    async fn approve(
        &self,
        id: RequestId,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<(GuestRequest, User), RepositoryError> {
        let mut state = self.state.lock().await;
        let request = state
            .requests
            .items
            .iter()
            .find(|request| request.id == id && request.is_pending())
            .cloned()
            .ok_or(RepositoryError::NotFound)?;

        // 先开通账号：冲突时请求保持待处理，不做任何改动
        let user = User::provision(
            UserId::from(Uuid::new_v4()),
            request.username.clone(),
            request.email.clone(),
            request.password.clone(),
            at,
        );
        let user = state.store_user(user, actor.clone(), at)?;

        let stored = state
            .requests
            .items
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(RepositoryError::NotFound)?;
        stored.approve(at);
        let approved = stored.clone();
        state.record(&approved, AuditAction::Update, actor.clone(), at);
        state.record(&approved, AuditAction::Delete, actor, at);
        Ok((approved, user))
    }

    async fn list(&self, query: GuestRequestQuery) -> Result<Vec<GuestRequest>, RepositoryError> {
        let state = self.state.lock().await;
        let mut rows: Vec<GuestRequest> = state
            .requests
            .items
            .iter()
            .filter(|request| match &query.search {
                Some(search) => request
                    .username
                    .as_str()
                    .to_lowercase()
                    .contains(&search.to_lowercase()),
                None => true,
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| match query.sort_column {
            Some(0) => a.id.to_string().cmp(&b.id.to_string()),
            Some(1) => a.username.as_str().cmp(b.username.as_str()),
            Some(2) => a.email.as_str().cmp(b.email.as_str()),
            Some(4) => a.deleted_at.is_some().cmp(&b.deleted_at.is_some()),
            Some(5) => a.is_approved().cmp(&b.is_approved()),
            _ => a.created_at.cmp(&b.created_at),
        });
        if !query.ascending.unwrap_or(true) {
            rows.reverse();
        }
        Ok(rows)
    }
}

#[async_trait]
impl UserRepository for MemoryStorage {
    async fn find_active_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.find_active(id.into()).cloned())
    }

    async fn find_active_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        let found = state
            .users
            .active()
            .find(|user| user.username == *username)
            .cloned();
        Ok(found)
    }
}

/// 内存版账号开通，组合方式与 Postgres 版一致：存储加哈希器。
pub struct MemoryUserProvisioner {
    storage: MemoryStorage,
    hasher: Arc<dyn PasswordHasher>,
}

impl MemoryUserProvisioner {
    pub fn new(storage: MemoryStorage, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { storage, hasher }
    }
}

#[async_trait]
impl UserProvisioner for MemoryUserProvisioner {
    async fn provision_prehashed(
        &self,
        new_user: NewUser,
        password: PasswordHash,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<User, ProvisionError> {
        let mut state = self.storage.state.lock().await;
        let user = User::provision(
            UserId::from(Uuid::new_v4()),
            new_user.username,
            new_user.email,
            password,
            at,
        );
        Ok(state.store_user(user, actor, at)?)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::PasswordHasherError;
    use domain::UserEmail;

    struct EchoHasher;

    #[async_trait]
    impl PasswordHasher for EchoHasher {
        async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
            Ok(PasswordHash::new(format!("hashed::{plaintext}")).unwrap())
        }

        async fn verify(
            &self,
            plaintext: &str,
            hashed: &PasswordHash,
        ) -> Result<bool, PasswordHasherError> {
            Ok(hashed.as_str() == format!("hashed::{plaintext}"))
        }
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: Username::parse(username).unwrap(),
            email: UserEmail::parse(format!("{username}@example.com")).unwrap(),
        }
    }

    #[tokio::test]
    async fn provision_with_password_hashes_before_store() {
        let storage = MemoryStorage::new();
        let provisioner = MemoryUserProvisioner::new(storage.clone(), Arc::new(EchoHasher));

        let user = provisioner
            .provision_with_password(
                new_user("alice"),
                "s3cret-pass",
                ActorId::new("admin"),
                chrono::Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(user.password.as_str(), "hashed::s3cret-pass");

        let events = storage.audit_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entity_kind, "user");
        assert_eq!(events[0].action, AuditAction::Create);
    }

    #[tokio::test]
    async fn provision_prehashed_stores_hash_verbatim() {
        let storage = MemoryStorage::new();
        let provisioner = MemoryUserProvisioner::new(storage.clone(), Arc::new(EchoHasher));

        let hash = PasswordHash::new("hashed::already").unwrap();
        let user = provisioner
            .provision_prehashed(
                new_user("bob"),
                hash.clone(),
                ActorId::new("admin"),
                chrono::Utc::now(),
            )
            .await
            .unwrap();

        // 哈希原样写入，没有被再哈希一遍
        assert_eq!(user.password, hash);
    }

    #[tokio::test]
    async fn provisioning_duplicate_username_is_rejected() {
        let storage = MemoryStorage::new();
        let provisioner = MemoryUserProvisioner::new(storage.clone(), Arc::new(EchoHasher));

        provisioner
            .provision_with_password(
                new_user("carol"),
                "pw-one",
                ActorId::new("admin"),
                chrono::Utc::now(),
            )
            .await
            .unwrap();

        let result = provisioner
            .provision_with_password(
                new_user("carol"),
                "pw-two",
                ActorId::new("admin"),
                chrono::Utc::now(),
            )
            .await;

        match result {
            Err(ProvisionError::DuplicateUsername) => {}
            other => panic!("Expected DuplicateUsername, got {other:?}"),
        }
    }
}
