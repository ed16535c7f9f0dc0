//! 平台 token 接口客户端（`POST https://<shop>/admin/oauth/access_token`）。

use anyhow::Context;
use reqwest::Url;

use super::{TokenGrant, TokenSource, UpstreamError};
use crate::{
    api::types::UPSTREAM_BODY_PREVIEW_CHARS,
    config::{AppSecret, Config},
};

/// token 接口相对路径。
const TOKEN_ENDPOINT_PATH: &str = "admin/oauth/access_token";

/// 平台 token 接口客户端。
#[derive(Debug, Clone)]
pub(crate) struct ShopifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: AppSecret,
    origin_override: Option<Url>,
}

impl ShopifyClient {
    /// 按配置构建客户端（带超时）。
    pub(crate) fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("build upstream http client failed")?;
        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            origin_override: config.upstream_origin.clone(),
        })
    }

    /// 用授权码换取用户委托 token（授权码只消费一次）。
    pub(crate) async fn exchange_code(
        &self,
        shop: &str,
        code: &str,
    ) -> Result<TokenGrant, UpstreamError> {
        self.request_token(
            shop,
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose()),
                ("code", code),
            ],
        )
        .await
    }

    /// 店铺 token 接口地址；配置了 origin 覆盖时改写到覆盖地址。
    fn token_endpoint(&self, shop: &str) -> Result<Url, UpstreamError> {
        let origin = match self.origin_override.as_ref() {
            Some(origin) => origin.clone(),
            None => Url::parse(&format!("https://{shop}"))
                .map_err(|err| UpstreamError::Transport(format!("shop origin 无效: {err}")))?,
        };
        origin
            .join(TOKEN_ENDPOINT_PATH)
            .map_err(|err| UpstreamError::Transport(format!("构造 token 接口地址失败: {err}")))
    }

    /// 单次 form 请求，不做重试。
    async fn request_token(
        &self,
        shop: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenGrant, UpstreamError> {
        let endpoint = self.token_endpoint(shop)?;
        let resp = self
            .http
            .post(endpoint)
            .form(form)
            .send()
            .await
            .map_err(|err| UpstreamError::Transport(self.redact(&err.to_string())))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            // 先脱敏再截断，避免密钥跨越截断点时残留前缀。
            let preview: String = self
                .redact(&body)
                .chars()
                .take(UPSTREAM_BODY_PREVIEW_CHARS)
                .collect();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: preview,
            });
        }

        resp.json::<TokenGrant>()
            .await
            .map_err(|err| UpstreamError::Decode(self.redact(&err.to_string())))
    }

    /// 去除文本中的应用密钥（原文与 form 编码两种形态）。
    fn redact(&self, text: &str) -> String {
        let secret = self.client_secret.expose();
        if secret.is_empty() {
            return text.to_string();
        }
        let encoded: String = url::form_urlencoded::byte_serialize(secret.as_bytes()).collect();
        text.replace(secret, "[REDACTED]")
            .replace(&encoded, "[REDACTED]")
    }
}

impl TokenSource for ShopifyClient {
    async fn client_credentials(&self, shop: &str) -> Result<TokenGrant, UpstreamError> {
        self.request_token(
            shop,
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose()),
                ("grant_type", "client_credentials"),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    use super::ShopifyClient;
    use crate::{
        config::{AppSecret, test_config},
        upstream::{TokenSource, UpstreamError},
    };

    fn client_for(server: &MockServer) -> ShopifyClient {
        let origin = Url::parse(&server.uri()).expect("mock server uri");
        ShopifyClient::new(&test_config(Some(origin))).expect("client builds")
    }

    #[test]
    fn endpoint_defaults_to_shop_origin() {
        let client = ShopifyClient::new(&test_config(None)).expect("client builds");
        let endpoint = client
            .token_endpoint("demo.myshopify.com")
            .expect("endpoint builds");
        assert_eq!(
            endpoint.as_str(),
            "https://demo.myshopify.com/admin/oauth/access_token"
        );
    }

    #[tokio::test]
    async fn exchange_code_posts_form_and_decodes_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .and(body_string_contains("client_id=test-client-id"))
            .and(body_string_contains("code=auth-code-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "shpat_user",
                "scope": "write_orders,read_orders"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = client_for(&server)
            .exchange_code("demo.myshopify.com", "auth-code-1")
            .await
            .expect("exchange succeeds");
        let token = grant.into_access_token();
        assert_eq!(token.token, "shpat_user");
        assert_eq!(token.scopes, vec!["write_orders", "read_orders"]);
    }

    #[tokio::test]
    async fn client_credentials_sends_grant_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "shpat_app",
                "scope": "write_orders",
                "expires_in": 86399
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = client_for(&server)
            .client_credentials("demo.myshopify.com")
            .await
            .expect("grant succeeds");
        assert_eq!(grant.expires_in, Some(86399));
    }

    #[tokio::test]
    async fn non_success_status_folds_body_without_secret() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string("bad client_secret test-app-secret for code"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .exchange_code("demo.myshopify.com", "used-code")
            .await
            .expect_err("400 must fail");
        match &err {
            UpstreamError::Status { status, body } => {
                assert_eq!(*status, 400);
                assert!(body.contains("bad client_secret"));
                assert!(!body.contains("test-app-secret"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.to_string().contains("test-app-secret"));
    }

    #[tokio::test]
    async fn secret_crossing_preview_limit_is_fully_scrubbed() {
        let server = MockServer::start().await;
        let body = format!("{}test-app-secret", "x".repeat(505));
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(body))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .exchange_code("demo.myshopify.com", "code-1")
            .await
            .expect_err("400 must fail");
        match err {
            UpstreamError::Status { body, .. } => {
                assert!(body.chars().count() <= 512);
                assert!(!body.contains("test-ap"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn form_encoded_secret_is_scrubbed() {
        let mut config = test_config(None);
        config.client_secret = AppSecret::new("s3cr3t+/=value");
        let client = ShopifyClient::new(&config).expect("client builds");
        let text = client.redact("client_secret=s3cr3t%2B%2F%3Dvalue&raw=s3cr3t+/=value");
        assert_eq!(text, "client_secret=[REDACTED]&raw=[REDACTED]");
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .client_credentials("demo.myshopify.com")
            .await
            .expect_err("html must not decode");
        assert!(matches!(err, UpstreamError::Decode(_)));
    }
}
