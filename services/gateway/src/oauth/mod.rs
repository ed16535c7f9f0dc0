//! 平台 OAuth 授权流程：安装跳转、回调换取 token 与 scope 校验。

pub(crate) mod authorize_url;
pub(crate) mod error;
pub(crate) mod handlers;
pub(crate) mod scopes;
pub(crate) mod shop;
