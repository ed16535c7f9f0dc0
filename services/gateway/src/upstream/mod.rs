//! 平台上游调用：token 接口客户端与错误类型。

use std::{fmt, future::Future};

use serde::Deserialize;

use crate::{credentials::AccessToken, oauth::scopes::parse_scope_list};

pub(crate) mod client;

/// 上游调用错误。`body` 写入前已去除应用密钥。
#[derive(Debug)]
pub(crate) enum UpstreamError {
    /// 非 2xx 响应。
    Status { status: u16, body: String },
    /// 网络、超时或地址构造失败。
    Transport(String),
    /// 响应体无法解析。
    Decode(String),
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, body } => write!(f, "token 接口返回 {status} - {body}"),
            Self::Transport(reason) => write!(f, "token 接口不可达: {reason}"),
            Self::Decode(reason) => write!(f, "token 接口响应格式错误: {reason}"),
        }
    }
}

impl std::error::Error for UpstreamError {}

/// token 接口响应。
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenGrant {
    pub(crate) access_token: String,
    /// 逗号分隔的已授予 scope。
    #[serde(default)]
    pub(crate) scope: String,
    /// 平台声明的有效期（秒）；离线 token 不带该字段。
    #[serde(default)]
    pub(crate) expires_in: Option<u64>,
}

impl TokenGrant {
    /// 转换为带 scope 列表的 token。
    pub(crate) fn into_access_token(self) -> AccessToken {
        AccessToken {
            scopes: parse_scope_list(&self.scope),
            token: self.access_token,
        }
    }
}

/// 应用级 token 来源（client-credentials grant）。
pub(crate) trait TokenSource: Send + Sync {
    fn client_credentials(
        &self,
        shop: &str,
    ) -> impl Future<Output = Result<TokenGrant, UpstreamError>> + Send;
}
