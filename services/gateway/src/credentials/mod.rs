//! 凭证模块：访问令牌类型、应用级 token 缓存与凭证存储。

use std::fmt;

pub(crate) mod cache;
pub(crate) mod store;

/// 平台访问令牌及其已授予 scope。
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct AccessToken {
    pub(crate) token: String,
    pub(crate) scopes: Vec<String>,
}

impl AccessToken {
    /// 打码展示（仅保留前 6 个字符）。
    pub(crate) fn masked(&self) -> String {
        let head: String = self.token.chars().take(6).collect();
        format!("{head}…")
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}
