use thiserror::Error;

/// 领域层错误，封闭的变体集合。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },
    /// 用户名已被活跃用户或活跃注册请求占用。
    #[error("username already taken")]
    DuplicateUsername,
    /// 目标实体不存在或已被软删除。
    #[error("entity not found")]
    NotFound,
    /// 注册请求已被处理，无法再次裁决。
    #[error("request already processed")]
    AlreadyProcessed,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 存储层错误。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// 没有满足条件的活跃行。
    #[error("row not found")]
    NotFound,
    /// 唯一约束冲突。
    #[error("conflicting row already exists")]
    Conflict,
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
