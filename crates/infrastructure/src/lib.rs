//! 基础设施层实现。
//!
//! 提供应用层端口的 Postgres 适配：软删除仓储、审计日志、
//! 账号开通，以及 bcrypt 密码哈希。

pub mod audit;
pub mod migrations;
pub mod password;
pub mod provisioner;
pub mod repository;
mod soft_delete;

pub use audit::list_events_for_entity;
pub use migrations::MIGRATOR;
pub use password::BcryptPasswordHasher;
pub use provisioner::PgUserProvisioner;
pub use repository::{
    create_pg_pool, PgChatMessageRepository, PgGuestRequestRepository, PgStorage, PgUserRepository,
};
