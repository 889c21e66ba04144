//! 访客注册服务
//!
//! 访客提交注册请求，管理员裁决：批准则开通账号并关闭请求，
//! 拒绝则只关闭请求。请求关闭后不可再次裁决。

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use domain::{
    ActorId, DomainError, GuestRequest, RepositoryError, RequestId, UserEmail, Username,
};

use crate::{
    clock::Clock,
    dto::GuestRequestDto,
    error::ApplicationError,
    password::PasswordHasher,
    repository::{GuestRequestQuery, GuestRequestRepository, UserRepository},
};

#[derive(Debug, Clone)]
pub struct RegisterGuestRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

pub struct RegistrationServiceDependencies {
    pub guest_request_repository: Arc<dyn GuestRequestRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

pub struct RegistrationService {
    deps: RegistrationServiceDependencies,
}

impl RegistrationService {
    pub fn new(deps: RegistrationServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(
        &self,
        request: RegisterGuestRequest,
    ) -> Result<GuestRequestDto, ApplicationError> {
        let username = Username::parse(request.username)?;
        let email = UserEmail::parse(request.email)?;

        // 预检用户名占用：活跃用户和活跃请求共享同一个命名空间。
        // 权威判定仍在存储层（占用检查加唯一索引兜底）。
        if self
            .deps
            .user_repository
            .find_active_by_username(&username)
            .await?
            .is_some()
            || self
                .deps
                .guest_request_repository
                .find_active_by_username(&username)
                .await?
                .is_some()
        {
            return Err(DomainError::DuplicateUsername.into());
        }

        // 明文密码只在这一个入口被哈希
        let password = self.deps.password_hasher.hash(&request.password).await?;

        let now = self.deps.clock.now();
        let guest = GuestRequest::submit(
            RequestId::from(Uuid::new_v4()),
            username,
            email,
            password,
            now,
        );

        // 注册入口没有登录态，审计操作者固定为 "guest"
        let stored = self
            .deps
            .guest_request_repository
            .create(guest, ActorId::guest())
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ApplicationError::Domain(DomainError::DuplicateUsername),
                other => other.into(),
            })?;

        info!(request_id = %stored.id, username = %stored.username, "guest request submitted");
        Ok(GuestRequestDto::from(&stored))
    }

    /// 裁决一条待处理的注册请求。
    ///
    /// 批准：先用请求里已有的哈希开通账号（原样拷贝，绝不二次哈希），
    /// 再关闭请求。拒绝：只关闭请求。已关闭的请求报 AlreadyProcessed。
    pub async fn judge(
        &self,
        request_id: Uuid,
        approve: bool,
        actor: ActorId,
    ) -> Result<GuestRequestDto, ApplicationError> {
        let id = RequestId::from(request_id);
        let request = self
            .deps
            .guest_request_repository
            .find_by_id(id)
            .await?
            .ok_or(ApplicationError::Domain(DomainError::NotFound))?;
        if !request.is_pending() {
            return Err(DomainError::AlreadyProcessed.into());
        }

        let now = self.deps.clock.now();
        if approve {
            let (approved, user) = self
                .deps
                .guest_request_repository
                .approve(id, actor, now)
                .await
                .map_err(|err| match err {
                    // 预检通过但活跃行没了：另一个裁决抢先关闭了请求
                    RepositoryError::NotFound => {
                        ApplicationError::Domain(DomainError::AlreadyProcessed)
                    }
                    // 请求保持待处理，管理员处理掉占用用户名的账号后可以重试
                    RepositoryError::Conflict => {
                        ApplicationError::Domain(DomainError::DuplicateUsername)
                    }
                    RepositoryError::Storage { message } => {
                        warn!(request_id = %request_id, reason = %message, "user provisioning failed");
                        ApplicationError::Provisioning
                    }
                })?;
            info!(
                request_id = %request_id,
                username = %approved.username,
                user_id = %user.id,
                "guest request approved"
            );
            Ok(GuestRequestDto::from(&approved))
        } else {
            self.deps
                .guest_request_repository
                .soft_delete(id, actor, now)
                .await
                .map_err(already_processed_if_missing)?;
            info!(request_id = %request_id, "guest request rejected");

            let mut rejected = request;
            rejected.reject(now);
            Ok(GuestRequestDto::from(&rejected))
        }
    }

    /// 历史请求也可以查看，关闭状态体现在返回的标记字段里。
    pub async fn get_request(&self, request_id: Uuid) -> Result<GuestRequestDto, ApplicationError> {
        let request = self
            .deps
            .guest_request_repository
            .find_by_id(RequestId::from(request_id))
            .await?
            .ok_or(ApplicationError::Domain(DomainError::NotFound))?;
        Ok(GuestRequestDto::from(&request))
    }

    /// 撤掉一条活跃请求，不做裁决。重复删除报 NotFound。
    pub async fn delete_request(
        &self,
        request_id: Uuid,
        actor: ActorId,
    ) -> Result<(), ApplicationError> {
        let now = self.deps.clock.now();
        self.deps
            .guest_request_repository
            .soft_delete(RequestId::from(request_id), actor, now)
            .await?;
        Ok(())
    }

    pub async fn list_requests(
        &self,
        query: GuestRequestQuery,
    ) -> Result<Vec<GuestRequestDto>, ApplicationError> {
        let rows = self.deps.guest_request_repository.list(query).await?;
        Ok(rows.iter().map(GuestRequestDto::from).collect())
    }
}

/// 预检时还是待处理、写入时活跃行却没了，说明另一个裁决抢先关闭了请求。
fn already_processed_if_missing(err: RepositoryError) -> ApplicationError {
    match err {
        RepositoryError::NotFound => ApplicationError::Domain(DomainError::AlreadyProcessed),
        other => other.into(),
    }
}
