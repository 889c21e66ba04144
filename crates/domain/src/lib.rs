//! 领域层：值对象、实体与错误定义
//!
//! 不包含任何 I/O，存储和网络细节由外层实现。

pub mod audit;
pub mod chat_message;
pub mod errors;
pub mod guest_request;
pub mod lifecycle;
pub mod user;
pub mod value_objects;

pub use audit::{AuditAction, AuditEvent, Auditable};
pub use chat_message::ChatMessage;
pub use errors::{DomainError, RepositoryError};
pub use guest_request::GuestRequest;
pub use lifecycle::SoftDeletable;
pub use user::{User, DEFAULT_USER_ROLE};
pub use value_objects::{
    ActorId, MessageContent, MessageId, PasswordHash, RequestId, Timestamp, UserEmail, UserId,
    Username,
};
