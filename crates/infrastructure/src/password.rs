use application::{PasswordHasher, PasswordHasherError};
use async_trait::async_trait;
use bcrypt::DEFAULT_COST;
use domain::PasswordHash;

/// bcrypt 单向哈希。
///
/// 明文只在注册入口经过这里一次；工作因子来自配置，
/// 未配置时用 bcrypt 默认值。哈希是 CPU 密集操作，放到
/// 阻塞线程池里跑，不占用异步工作线程。
#[derive(Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: Option<u32>) -> Self {
        Self {
            cost: cost.unwrap_or(DEFAULT_COST),
        }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl PasswordHasher for BcryptPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|err| PasswordHasherError::hash_error(err.to_string()))?
            .map_err(|err| PasswordHasherError::hash_error(err.to_string()))?;

        PasswordHash::new(hashed).map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        let plaintext = plaintext.to_owned();
        let hashed = hashed.as_str().to_owned();
        tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hashed))
            .await
            .map_err(|err| PasswordHasherError::verify_error(err.to_string()))?
            .map_err(|err| PasswordHasherError::verify_error(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 测试用最低工作因子，避免拖慢用例
    fn fast_hasher() -> BcryptPasswordHasher {
        BcryptPasswordHasher::new(Some(4))
    }

    #[tokio::test]
    async fn test_hash_then_verify_roundtrip() {
        let hasher = fast_hasher();

        let hashed = hasher.hash("password123").await.unwrap();
        assert!(hashed.as_str().starts_with("$2"));

        let ok = hasher.verify("password123", &hashed).await.unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_password() {
        let hasher = fast_hasher();

        let hashed = hasher.hash("password123").await.unwrap();
        let ok = hasher.verify("password124", &hashed).await.unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_same_password_hashes_differently() {
        let hasher = fast_hasher();

        let first = hasher.hash("password123").await.unwrap();
        let second = hasher.hash("password123").await.unwrap();
        assert_ne!(first.as_str(), second.as_str());
    }
}
