use sqlx::migrate::Migrator;

/// 编译期打包的数据库迁移脚本，启动和集成测试共用。
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");
