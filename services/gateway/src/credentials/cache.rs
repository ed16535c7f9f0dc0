//! 应用级 token 缓存（client-credentials），过期前 1 小时主动续期。
//!
//! 检查与刷新在同一把互斥锁内完成：并发请求只有一个会访问上游，
//! 其余等待其结果。刷新失败时保留原缓存项。

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::AccessToken;
use crate::{
    api::types::TOKEN_REFRESH_MARGIN_SEC,
    auth::window::unix_now,
    upstream::{TokenSource, UpstreamError},
};

/// 缓存项。
#[derive(Debug, Clone)]
struct CachedToken {
    token: AccessToken,
    expires_at: u64,
}

/// 缓存状态快照（不含 token）。
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct CacheStatus {
    pub(crate) cached: bool,
    pub(crate) expires_at: Option<u64>,
}

/// 单店铺应用级 token 缓存。
#[derive(Debug)]
pub(crate) struct AppTokenCache<S> {
    source: S,
    shop: String,
    slot: Mutex<Option<CachedToken>>,
}

impl<S: TokenSource> AppTokenCache<S> {
    pub(crate) fn new(source: S, shop: impl Into<String>) -> Self {
        Self {
            source,
            shop: shop.into(),
            slot: Mutex::new(None),
        }
    }

    /// 缓存所属店铺。
    pub(crate) fn shop(&self) -> &str {
        &self.shop
    }

    /// 获取可用 token：命中则不访问上游。
    pub(crate) async fn get_token(&self) -> Result<AccessToken, UpstreamError> {
        self.get_token_at(unix_now()).await
    }

    async fn get_token_at(&self, now: u64) -> Result<AccessToken, UpstreamError> {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref()
            && now < cached.expires_at
        {
            return Ok(cached.token.clone());
        }

        let grant = match self.source.client_credentials(&self.shop).await {
            Ok(grant) => grant,
            Err(err) => {
                warn!("app token refresh for {} failed: {err}", self.shop);
                return Err(err);
            }
        };
        if grant.expires_in.is_none_or(|ttl| ttl <= TOKEN_REFRESH_MARGIN_SEC) {
            warn!(
                "app token for {} declares no usable ttl ({:?}); it will not be reused",
                self.shop, grant.expires_in
            );
        }
        let expires_at = cache_expiry(now, grant.expires_in);
        let token = grant.into_access_token();
        *slot = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        info!("app token for {} refreshed, reusable until {expires_at}", self.shop);
        Ok(token)
    }

    /// 当前缓存状态。
    pub(crate) async fn status(&self) -> CacheStatus {
        self.status_at(unix_now()).await
    }

    async fn status_at(&self, now: u64) -> CacheStatus {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(cached) => CacheStatus {
                cached: now < cached.expires_at,
                expires_at: Some(cached.expires_at),
            },
            None => CacheStatus {
                cached: false,
                expires_at: None,
            },
        }
    }
}

/// 缓存截止时间：`now + (ttl - 余量)`；未声明 ttl 时立即过期。
fn cache_expiry(now: u64, expires_in: Option<u64>) -> u64 {
    now.saturating_add(
        expires_in
            .unwrap_or(0)
            .saturating_sub(TOKEN_REFRESH_MARGIN_SEC),
    )
}
