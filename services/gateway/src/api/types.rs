//! API 请求/响应类型与流程常量。

use std::collections::BTreeMap;

use serde::Serialize;

/// 平台签名字段名。
pub(crate) const SIGNATURE_FIELD: &str = "hmac";
/// 防伪 nonce cookie 名。
pub(crate) const NONCE_COOKIE_NAME: &str = "oauth_nonce";
/// nonce 有效期（秒），同时作为 cookie Max-Age。
pub(crate) const NONCE_TTL_SEC: u64 = 600;
/// nonce 随机字节数（hex 后 32 字符）。
pub(crate) const NONCE_BYTES: usize = 16;
/// 进程内待消费 nonce 上限。
pub(crate) const MAX_PENDING_NONCES: usize = 10_000;
/// 回调请求允许的时间偏差（秒，含边界）。
pub(crate) const MAX_CLOCK_SKEW_SEC: u64 = 300;
/// 应用级 token 提前续期余量（秒）。
pub(crate) const TOKEN_REFRESH_MARGIN_SEC: u64 = 3600;
/// 安装入口路径。
pub(crate) const INSTALL_PATH: &str = "/auth/install";
/// OAuth 回调路径。
pub(crate) const CALLBACK_PATH: &str = "/auth/callback";
/// 上游 token 接口默认超时（秒）。
pub(crate) const DEFAULT_HTTP_TIMEOUT_SEC: u64 = 10;
/// 上游错误体写入诊断信息时的最大字符数。
pub(crate) const UPSTREAM_BODY_PREVIEW_CHARS: usize = 512;

/// 平台入站 query（安装与回调共用）。
///
/// `raw` 保留未解码的原始键值，仅供签名规范化使用；
/// 其余字段为解码后的具名参数，供业务校验使用。
#[derive(Debug, Default, Clone)]
pub(crate) struct AuthorizationRequest {
    raw: BTreeMap<String, String>,
    pub(crate) shop: Option<String>,
    pub(crate) hmac: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) code: Option<String>,
    pub(crate) timestamp: Option<String>,
    pub(crate) host: Option<String>,
}

impl AuthorizationRequest {
    /// 从原始 query 字符串解析；重复键以最后一次出现为准。
    pub(crate) fn from_raw_query(raw_query: &str) -> Self {
        let mut raw = BTreeMap::new();
        for pair in raw_query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            raw.insert(key.to_string(), value.to_string());
        }

        let mut query = Self {
            raw,
            ..Self::default()
        };
        for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "shop" => query.shop = value,
                "hmac" => query.hmac = value,
                "state" => query.state = value,
                "code" => query.code = value,
                "timestamp" => query.timestamp = value,
                "host" => query.host = value,
                _ => {}
            }
        }
        query
    }

    /// 原始键值对（未解码），用于签名规范化。
    pub(crate) fn raw_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.raw.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 是否携带非空签名。
    pub(crate) fn has_signature(&self) -> bool {
        self.hmac
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }
}

/// 回调成功返回数据（不回显 token 本身）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CallbackData {
    pub(crate) shop: String,
    pub(crate) scopes: Vec<String>,
    pub(crate) stored_at: String,
}

/// 应用级 token 缓存状态。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AppTokenStatusData {
    pub(crate) configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) shop: Option<String>,
    pub(crate) cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) expires_at: Option<u64>,
}

/// 经缓存取得的应用级 token（仅掩码形式）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AppTokenData {
    pub(crate) shop: String,
    pub(crate) token: String,
    pub(crate) scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) expires_at: Option<u64>,
}

/// 已保存凭证列表项。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CredentialEntry {
    pub(crate) shop: String,
    pub(crate) scopes: Vec<String>,
    pub(crate) stored_at: String,
}

/// 已保存凭证列表。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CredentialsData {
    pub(crate) credentials: Vec<CredentialEntry>,
}

#[cfg(test)]
mod tests {
    use super::AuthorizationRequest;

    #[test]
    fn raw_pairs_keep_encoded_values_while_fields_are_decoded() {
        let query = AuthorizationRequest::from_raw_query(
            "shop=demo.myshopify.com&host=YWRtaW4%3D&hmac=abc&state=",
        );

        let raw: Vec<(&str, &str)> = query.raw_pairs().collect();
        assert!(raw.contains(&("host", "YWRtaW4%3D")));
        assert!(raw.contains(&("state", "")));
        assert_eq!(query.host.as_deref(), Some("YWRtaW4="));
        assert_eq!(query.shop.as_deref(), Some("demo.myshopify.com"));
        assert_eq!(query.state.as_deref(), Some(""));
        assert!(query.code.is_none());
    }

    #[test]
    fn blank_signature_counts_as_absent() {
        assert!(!AuthorizationRequest::from_raw_query("hmac=%20%20").has_signature());
        assert!(!AuthorizationRequest::from_raw_query("shop=a.myshopify.com").has_signature());
        assert!(AuthorizationRequest::from_raw_query("hmac=00ff").has_signature());
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        let query =
            AuthorizationRequest::from_raw_query("shop=a.myshopify.com&shop=b.myshopify.com");
        assert_eq!(query.shop.as_deref(), Some("b.myshopify.com"));
        let raw: Vec<(&str, &str)> = query.raw_pairs().collect();
        assert_eq!(raw, vec![("shop", "b.myshopify.com")]);
    }
}
