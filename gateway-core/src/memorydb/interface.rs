use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// A TTL-tagged key/value store. `SessionCache` and `IdentityCache`
/// (see [`crate::cache`]) are typed façades over one instance of this
/// trait, never runtime type assertions over a shared store.
#[async_trait]
pub trait MemoryDB: Clone + Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn get_del(&self, key: &str) -> Result<Option<String>>;

    async fn get_ex(&self, key: &str, ttl: &Duration) -> Result<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: &Duration) -> Result<()>;

    /// Set only if `key` is not already present. Returns `false` without
    /// writing if the key exists.
    async fn set_ex_nx(&self, key: &str, value: &str, ttl: &Duration) -> Result<bool>;

    async fn del(&self, key: &str) -> Result<bool>;

    async fn expire(&self, key: &str, ttl: i64) -> Result<bool>;

    async fn flush(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use crate::memorydb::default::DefaultBackend;

    use super::*;

    async fn setup_default() -> impl MemoryDB {
        DefaultBackend::new(None)
    }

    #[tokio::test]
    async fn test_normal() {
        let r = setup_default().await;
        let key = "_gateway_key1";
        let value1 = "value1";
        let value2 = "value2";

        let _ = r.del(key).await;

        assert_eq!(r.get(key).await.unwrap(), None);

        r.set(key, value1).await.unwrap();
        assert_eq!(r.get(key).await.unwrap().unwrap(), value1);
        r.set(key, value2).await.unwrap();
        assert_eq!(r.get(key).await.unwrap().unwrap(), value2);

        assert!(r.del(key).await.unwrap());
        assert!(!r.del(key).await.unwrap());
        assert_eq!(r.get(key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_ex_nx() {
        let r = setup_default().await;
        let key = "_gateway_key_nx";

        let _ = r.del(key).await;
        assert!(
            r.set_ex_nx(key, "first", &Duration::from_secs(2))
                .await
                .unwrap()
        );
        assert!(
            !r.set_ex_nx(key, "second", &Duration::from_secs(2))
                .await
                .unwrap()
        );
        assert_eq!(r.get(key).await.unwrap().unwrap(), "first");
    }

    #[tokio::test]
    async fn test_ex() {
        let r = setup_default().await;
        let key = "_gateway_key2";
        let value = "value";

        let _ = r.del(key).await;

        r.set(key, value).await.unwrap();
        assert_eq!(r.get_del(key).await.unwrap().unwrap(), value);
        assert_eq!(r.get(key).await.unwrap(), None);

        r.set_ex(key, value, &Duration::from_secs(2)).await.unwrap();
        assert_eq!(r.get(key).await.unwrap().unwrap(), value);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(
            r.get_ex(key, &Duration::from_secs(2))
                .await
                .unwrap()
                .unwrap(),
            value
        );
        sleep(Duration::from_secs(1)).await;
        assert_eq!(r.get(key).await.unwrap().unwrap(), value);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(r.get(key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expire() {
        let r = setup_default().await;
        let key = "_gateway_key3";
        let value = "value";

        let _ = r.del(key).await;

        r.set(key, value).await.unwrap();
        assert_eq!(r.get(key).await.unwrap().unwrap(), value);
        assert!(r.expire(key, 1).await.unwrap());
        sleep(Duration::from_secs(2)).await;
        assert_eq!(r.get(key).await.unwrap(), None);
        assert!(!r.expire(key, 1).await.unwrap());
    }
}
