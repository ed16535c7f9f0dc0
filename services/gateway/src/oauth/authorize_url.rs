//! 平台授权页地址构造。

use reqwest::Url;

/// 构造 `https://<shop>/admin/oauth/authorize?...`，参数按 form 规则编码。
pub(crate) fn build_authorize_url(
    shop: &str,
    client_id: &str,
    scopes: &[String],
    redirect_uri: &str,
    nonce: &str,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("https://{shop}/admin/oauth/authorize"))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("scope", &scopes.join(","))
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", nonce);
    Ok(url)
}
