//! 信任建立模块：平台签名、防伪 nonce 与请求时间窗。

pub(crate) mod nonce;
pub(crate) mod signature;
pub(crate) mod window;
