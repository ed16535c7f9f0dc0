//! 安装入口：校验请求、签发 nonce 并生成授权页跳转。

use tracing::info;

use crate::{
    api::types::{AuthorizationRequest, NONCE_COOKIE_NAME, NONCE_TTL_SEC, SIGNATURE_FIELD},
    auth::window::unix_now,
    oauth::{authorize_url::build_authorize_url, error::OAuthError, shop::validate_shop},
    state::AppState,
};

/// nonce cookie 公共属性。
const COOKIE_ATTRIBUTES: &str = "HttpOnly; Secure; SameSite=None; Path=/";

/// 授权页跳转指令。
#[derive(Debug)]
pub(super) struct InstallRedirect {
    pub(super) location: String,
    pub(super) nonce: String,
}

impl AppState {
    /// 安装入口校验：签名可缺省，但一旦携带必须有效。
    pub(super) async fn begin_install(
        &self,
        query: &AuthorizationRequest,
    ) -> Result<InstallRedirect, OAuthError> {
        if query.has_signature() && !self.verifier.verify(query.raw_pairs(), SIGNATURE_FIELD) {
            return Err(OAuthError::SignatureInvalid);
        }
        let shop = validate_shop(query.shop.as_deref())?;

        let nonce = self.nonces.issue(unix_now()).await;
        let location = build_authorize_url(
            shop,
            &self.config.client_id,
            &self.config.scopes,
            &self.config.callback_url,
            &nonce,
        )
        .map_err(|_| OAuthError::ShopInvalid {
            received: Some(shop.to_string()),
        })?;

        info!("install redirect issued for {shop}");
        Ok(InstallRedirect {
            location: location.into(),
            nonce,
        })
    }
}

/// 写入 nonce 的 cookie（跨站回调需要 `SameSite=None; Secure`）。
pub(super) fn nonce_cookie(nonce: &str) -> String {
    format!("{NONCE_COOKIE_NAME}={nonce}; {COOKIE_ATTRIBUTES}; Max-Age={NONCE_TTL_SEC}")
}

/// 清除 nonce 的 cookie。
pub(super) fn clear_nonce_cookie() -> String {
    format!("{NONCE_COOKIE_NAME}=; {COOKIE_ATTRIBUTES}; Max-Age=0")
}
