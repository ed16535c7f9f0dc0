//! HTTP 接口层：统一响应包裹、错误与请求类型。

pub(crate) mod error;
pub(crate) mod response;
pub(crate) mod types;
