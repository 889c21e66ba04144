use uuid::Uuid;

use crate::value_objects::Timestamp;

/// 软删除实体的统一契约。
///
/// 实体从不物理删除，打上删除时间戳即视为消失；
/// 各个存储实现基于这个契约共享同一套软删除逻辑。
pub trait SoftDeletable {
    fn id(&self) -> Uuid;

    fn created_at(&self) -> Timestamp;

    fn deleted_at(&self) -> Option<Timestamp>;

    fn mark_deleted(&mut self, at: Timestamp);

    fn is_active(&self) -> bool {
        self.deleted_at().is_none()
    }
}
