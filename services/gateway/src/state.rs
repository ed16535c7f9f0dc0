//! Gateway 共享状态：配置、签名校验器、nonce 登记表与凭证句柄。

use std::sync::Arc;

use tracing::info;

use crate::{
    auth::{nonce::NonceStore, signature::SignatureVerifier},
    config::Config,
    credentials::{
        cache::AppTokenCache,
        store::{CredentialStore, MemoryCredentialStore},
    },
    upstream::client::ShopifyClient,
};

/// Gateway 共享状态，克隆成本为若干 `Arc`。
#[derive(Clone, Debug)]
pub(crate) struct AppState {
    pub(crate) config: Arc<Config>,
    pub(crate) verifier: SignatureVerifier,
    /// 安装 nonce（内存，一次性消费）。
    pub(crate) nonces: NonceStore,
    pub(crate) shopify: ShopifyClient,
    /// 配置了 `SHOPIFY_SHOP` 时才有应用级 token 缓存。
    pub(crate) app_token: Option<Arc<AppTokenCache<ShopifyClient>>>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
}

impl AppState {
    /// 按配置装配共享状态。
    pub(crate) fn new(config: Config) -> anyhow::Result<Self> {
        let shopify = ShopifyClient::new(&config)?;
        let app_token = config.shop.as_ref().map(|shop| {
            info!("app token cache enabled for {shop}");
            Arc::new(AppTokenCache::new(shopify.clone(), shop.clone()))
        });
        Ok(Self {
            verifier: SignatureVerifier::new(config.client_secret.clone()),
            nonces: NonceStore::default(),
            shopify,
            app_token,
            credentials: Arc::new(MemoryCredentialStore::default()),
            config: Arc::new(config),
        })
    }
}
