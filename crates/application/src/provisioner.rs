use async_trait::async_trait;
use domain::{ActorId, PasswordHash, RepositoryError, Timestamp, User, UserEmail, Username};
use thiserror::Error;

/// 待开通账号的基本信息，凭据单独传递。
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub email: UserEmail,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// 用户名已被活跃用户占用。
    #[error("username already taken")]
    DuplicateUsername,
    #[error("provisioning failed: {0}")]
    Failed(String),
}

impl From<RepositoryError> for ProvisionError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => ProvisionError::DuplicateUsername,
            other => ProvisionError::Failed(other.to_string()),
        }
    }
}

/// 用户账号开通。
///
/// 两个入口刻意分开：凭据要么已经是哈希（原样写入，绝不二次哈希），
/// 要么是明文（先哈希再入库）。审批路径照搬请求里的哈希，
/// 走的就是前一种语义。
#[async_trait]
pub trait UserProvisioner: Send + Sync {
    /// 使用已经完成哈希的凭据开通账号，哈希原样写入。
    async fn provision_prehashed(
        &self,
        new_user: NewUser,
        password: PasswordHash,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<User, ProvisionError>;

    /// 使用明文凭据开通账号。
    async fn provision_with_password(
        &self,
        new_user: NewUser,
        password: &str,
        actor: ActorId,
        at: Timestamp,
    ) -> Result<User, ProvisionError>;
}
