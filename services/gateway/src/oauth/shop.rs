//! 店铺域名校验。

use std::sync::LazyLock;

use regex::Regex;

use super::error::OAuthError;

static SHOP_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9\-]*\.myshopify\.com$")
        .expect("shop domain pattern must compile")
});

/// 是否为合法 `<label>.myshopify.com` 域名。
pub(crate) fn is_valid_shop_domain(shop: &str) -> bool {
    SHOP_DOMAIN.is_match(shop)
}

/// 校验 shop 参数并返回借用值。
pub(crate) fn validate_shop(raw: Option<&str>) -> Result<&str, OAuthError> {
    match raw {
        Some(shop) if is_valid_shop_domain(shop) => Ok(shop),
        other => Err(OAuthError::ShopInvalid {
            received: other.map(ToString::to_string),
        }),
    }
}
