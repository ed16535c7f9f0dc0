//! 配置模块职责：
//! 1. 从环境变量读取应用凭证、scope 与公开地址，并提供默认值。
//! 2. 校验公开地址、店铺域名与上游覆盖地址，启动期即失败。
//! 3. 以 `AppSecret` 包裹应用密钥，确保不进入日志与响应。

use std::{fmt, sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use url::Url;

use crate::{
    api::types::{CALLBACK_PATH, DEFAULT_HTTP_TIMEOUT_SEC},
    oauth::{scopes::parse_scope_list, shop::is_valid_shop_domain},
};

/// 默认监听地址。
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:18090";
/// 默认公开地址（本机开发）。
const DEFAULT_PUBLIC_BASE_URL: &str = "http://127.0.0.1:18090";
/// 默认申请的 scope。
const DEFAULT_SCOPES: &str = "write_orders,read_orders";
/// 默认必须授予的 scope。
const DEFAULT_REQUIRED_SCOPES: &str = "write_orders";

/// 应用密钥（HMAC key 与 client_secret）。
#[derive(Clone)]
pub(crate) struct AppSecret(Arc<str>);

impl AppSecret {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self(Arc::from(raw.into()))
    }

    /// 明文访问，仅用于签名计算与上游表单。
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AppSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppSecret([REDACTED])")
    }
}

/// 网关运行时配置。
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// 平台应用 client_id。
    pub(crate) client_id: String,
    /// 平台应用密钥。
    pub(crate) client_secret: AppSecret,
    /// 安装时申请的 scope。
    pub(crate) scopes: Vec<String>,
    /// 回调时必须授予的 scope。
    pub(crate) required_scopes: Vec<String>,
    /// 部署公开地址。
    pub(crate) public_base_url: Url,
    /// OAuth 回调完整地址（由公开地址推导）。
    pub(crate) callback_url: String,
    /// client-credentials 缓存所用店铺（可选）。
    pub(crate) shop: Option<String>,
    /// 上游请求超时。
    pub(crate) http_timeout: Duration,
    /// 上游 origin 覆盖（本地 mock 用）。
    pub(crate) upstream_origin: Option<Url>,
    /// HTTP 监听地址。
    pub(crate) listen_addr: String,
}

impl Config {
    /// 从进程环境变量构建配置。
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源构建配置；空白值视为未设置。
    pub(crate) fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let client_id =
            read("SHOPIFY_CLIENT_ID").ok_or_else(|| anyhow!("SHOPIFY_CLIENT_ID is required"))?;
        let client_secret = read("SHOPIFY_CLIENT_SECRET")
            .map(AppSecret::new)
            .ok_or_else(|| anyhow!("SHOPIFY_CLIENT_SECRET is required"))?;

        let scopes = parse_scope_list(
            &read("SHOPIFY_SCOPES").unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
        );
        if scopes.is_empty() {
            return Err(anyhow!("SHOPIFY_SCOPES must list at least one scope"));
        }
        let required_scopes = parse_scope_list(
            &read("SHOPIFY_REQUIRED_SCOPES").unwrap_or_else(|| DEFAULT_REQUIRED_SCOPES.to_string()),
        );

        let raw_base = read("PUBLIC_BASE_URL")
            .or_else(|| read("URL"))
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());
        let public_base_url = parse_http_url(&raw_base)
            .with_context(|| format!("invalid public base url: {raw_base}"))?;
        let callback_url = derive_callback_url(&public_base_url);

        let shop = read("SHOPIFY_SHOP");
        if let Some(shop) = shop.as_deref()
            && !is_valid_shop_domain(shop)
        {
            return Err(anyhow!(
                "SHOPIFY_SHOP must look like <name>.myshopify.com, got {shop}"
            ));
        }

        let http_timeout = Duration::from_secs(
            read("SHOPIFY_HTTP_TIMEOUT_SEC")
                .and_then(|raw| raw.parse::<u64>().ok())
                .filter(|sec| *sec > 0)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SEC),
        );

        let upstream_origin = read("SHOPIFY_UPSTREAM_ORIGIN")
            .map(|raw| {
                parse_http_url(&raw).with_context(|| format!("invalid upstream origin: {raw}"))
            })
            .transpose()?;

        Ok(Self {
            client_id,
            client_secret,
            scopes,
            required_scopes,
            public_base_url,
            callback_url,
            shop,
            http_timeout,
            upstream_origin,
            listen_addr: read("GATEWAY_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
        })
    }
}

/// 解析 http(s) 地址。
fn parse_http_url(raw: &str) -> anyhow::Result<Url> {
    let parsed = Url::parse(raw)?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(anyhow!("unsupported scheme: {other}")),
    }
}

/// 公开地址 + 回调路径；保留部署前缀路径。
fn derive_callback_url(base: &Url) -> String {
    format!("{}{}", base.as_str().trim_end_matches('/'), CALLBACK_PATH)
}

#[cfg(test)]
pub(crate) fn test_config(upstream_origin: Option<Url>) -> Config {
    Config {
        client_id: "test-client-id".to_string(),
        client_secret: AppSecret::new("test-app-secret"),
        scopes: vec!["write_orders".to_string(), "read_orders".to_string()],
        required_scopes: vec!["write_orders".to_string()],
        public_base_url: Url::parse("https://gateway.example.com").expect("static url"),
        callback_url: "https://gateway.example.com/auth/callback".to_string(),
        shop: Some("test-shop.myshopify.com".to_string()),
        http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SEC),
        upstream_origin,
        listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
    }
}
