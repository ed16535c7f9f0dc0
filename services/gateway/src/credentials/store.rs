//! 用户委托凭证存储。持久化由实现方决定，这里只提供进程内实现。

use std::{
    collections::HashMap,
    fmt,
    sync::{PoisonError, RwLock},
};

use chrono::{SecondsFormat, Utc};

use super::AccessToken;

/// 存储失败原因。
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct StoreError(pub(crate) String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StoreError {}

/// 已保存凭证的元数据（不含 token）。
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct StoredCredential {
    pub(crate) shop: String,
    pub(crate) scopes: Vec<String>,
    pub(crate) stored_at: String,
}

/// 凭证存储接口。同一店铺再次保存时覆盖旧凭证。
pub(crate) trait CredentialStore: Send + Sync + fmt::Debug {
    fn save(&self, shop: &str, token: AccessToken) -> Result<StoredCredential, StoreError>;

    /// 按店铺名排序的已保存凭证。
    fn list(&self) -> Result<Vec<StoredCredential>, StoreError>;
}

#[derive(Debug)]
struct StoredEntry {
    token: AccessToken,
    stored_at: String,
}

/// 进程内凭证存储，重启即丢失。
#[derive(Debug, Default)]
pub(crate) struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryCredentialStore {
    #[cfg(test)]
    pub(crate) fn token_for(&self, shop: &str) -> Option<AccessToken> {
        self.entries
            .read()
            .ok()?
            .get(shop)
            .map(|entry| entry.token.clone())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, shop: &str, token: AccessToken) -> Result<StoredCredential, StoreError> {
        let stored_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let stored = StoredCredential {
            shop: shop.to_string(),
            scopes: token.scopes.clone(),
            stored_at: stored_at.clone(),
        };
        let mut entries = self.entries.write().map_err(lock_poisoned)?;
        entries.insert(shop.to_string(), StoredEntry { token, stored_at });
        Ok(stored)
    }

    fn list(&self) -> Result<Vec<StoredCredential>, StoreError> {
        let entries = self.entries.read().map_err(lock_poisoned)?;
        let mut list: Vec<StoredCredential> = entries
            .iter()
            .map(|(shop, entry)| StoredCredential {
                shop: shop.clone(),
                scopes: entry.token.scopes.clone(),
                stored_at: entry.stored_at.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.shop.cmp(&b.shop));
        Ok(list)
    }
}

fn lock_poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError("credential store lock poisoned".to_string())
}
