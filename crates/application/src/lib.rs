//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，定义持久化与账号开通的端口，
//! 以及对外部适配器（例如密码哈希、时钟）的抽象。

pub mod clock;
pub mod dto;
pub mod error;
pub mod memory;
pub mod password;
pub mod provisioner;
pub mod repository;
pub mod services;

pub use clock::{Clock, SystemClock};
pub use dto::{ChatMessageDto, GuestRequestDto};
pub use error::ApplicationError;
pub use memory::{MemoryStorage, MemoryUserProvisioner};
pub use password::{PasswordHasher, PasswordHasherError};
pub use provisioner::{NewUser, ProvisionError, UserProvisioner};
pub use repository::{
    ChatMessageRepository, ChatMessageWithAuthor, GuestRequestQuery, GuestRequestRepository,
    UserRepository,
};
pub use services::{
    ChatService, ChatServiceDependencies, PostMessageRequest, RegisterGuestRequest,
    RegistrationService, RegistrationServiceDependencies,
};
