use async_trait::async_trait;
use domain::{
    ActorId, ChatMessage, GuestRequest, MessageId, RepositoryError, RequestId, Timestamp, User,
    UserEmail, UserId, Username,
};

/// 列表展示用的消息行：消息本体加作者信息。
#[derive(Debug, Clone)]
pub struct ChatMessageWithAuthor {
    pub message: ChatMessage,
    pub author_name: Username,
    pub author_email: UserEmail,
}

/// 聊天消息存储。
///
/// 每个变更操作都在自己的工作单元内同时写入审计事件，
/// 两者一起提交或一起回滚。
#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    async fn create(
        &self,
        message: ChatMessage,
        actor: ActorId,
    ) -> Result<ChatMessage, RepositoryError>;

    /// 给活跃行打删除戳；没有活跃行时返回 [`RepositoryError::NotFound`]，
    /// 因此重复删除同一条消息会失败。
    async fn soft_delete(
        &self,
        id: MessageId,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<(), RepositoryError>;

    async fn find_active_by_id(
        &self,
        id: MessageId,
    ) -> Result<Option<ChatMessage>, RepositoryError>;

    /// 活跃消息按创建时间升序，连同作者展示信息。
    async fn list_active(&self) -> Result<Vec<ChatMessageWithAuthor>, RepositoryError>;
}

/// 注册请求列表查询条件。
///
/// 排序列按序号选择：0 id、1 用户名、2 邮箱、3 创建时间、4 删除标记、5 批准标记，
/// 缺省按创建时间升序。
#[derive(Debug, Clone, Default)]
pub struct GuestRequestQuery {
    /// 用户名包含匹配，大小写不敏感。
    pub search: Option<String>,
    pub sort_column: Option<u32>,
    pub ascending: Option<bool>,
}

/// 访客注册请求存储。
#[async_trait]
pub trait GuestRequestRepository: Send + Sync {
    /// 持久化一条新请求。
    ///
    /// 先做用户名占用检查（活跃用户与活跃请求都算占用），
    /// 冲突返回 [`RepositoryError::Conflict`]；检查通过后落库，
    /// 唯一索引兜底并发窗口，约束冲突同样映射为 Conflict。
    async fn create(
        &self,
        request: GuestRequest,
        actor: ActorId,
    ) -> Result<GuestRequest, RepositoryError>;

    /// 按ID查询，包含已关闭的请求。
    async fn find_by_id(&self, id: RequestId) -> Result<Option<GuestRequest>, RepositoryError>;

    async fn find_active_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<GuestRequest>, RepositoryError>;

    async fn soft_delete(
        &self,
        id: RequestId,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// 批准并开通账号，整体是一个工作单元：锁定活跃行，照搬请求里的
    /// 哈希开通用户，置批准标记、打删除戳，依次写入用户 CREATE、
    /// 请求 UPDATE、请求 DELETE 三条审计事件，一起提交或一起回滚。
    ///
    /// 没有活跃行返回 [`RepositoryError::NotFound`]（并发裁决的输家在
    /// 这里被挡住）；用户名撞上现有活跃用户返回
    /// [`RepositoryError::Conflict`]，请求保持待处理。
    async fn approve(
        &self,
        id: RequestId,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<(GuestRequest, User), RepositoryError>;

    /// 所有请求（含已关闭的历史行），按查询条件过滤和排序。
    async fn list(&self, query: GuestRequestQuery) -> Result<Vec<GuestRequest>, RepositoryError>;
}

/// 用户账号只读查询。
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_active_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn find_active_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError>;
}
