//! OAuth 流程错误与 API 错误映射。

use axum::http::StatusCode;

use crate::{
    api::{error::ApiError, types::MAX_CLOCK_SKEW_SEC},
    upstream::UpstreamError,
};

/// 错误大类，决定响应状态码。
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum ErrorKind {
    /// 输入缺失或格式错误（400）。
    Validation,
    /// 签名、state 或 scope 不满足（403）。
    Authentication,
    /// 上游或下游协作方失败（500）。
    Upstream,
    /// 请求时间戳超出时间窗（400）。
    Expired,
}

/// 安装/回调流程错误。
#[derive(Debug)]
pub(crate) enum OAuthError {
    SignatureMissing,
    SignatureInvalid,
    ShopInvalid { received: Option<String> },
    StateMissing,
    StateMismatch,
    TimestampInvalid { received: String },
    Expired { skew_sec: u64 },
    CodeMissing,
    InsufficientScope { missing: Vec<String> },
    Upstream(UpstreamError),
    Storage { reason: String },
}

impl OAuthError {
    /// 错误大类。
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            Self::ShopInvalid { .. }
            | Self::StateMissing
            | Self::TimestampInvalid { .. }
            | Self::CodeMissing => ErrorKind::Validation,
            Self::SignatureMissing
            | Self::SignatureInvalid
            | Self::StateMismatch
            | Self::InsufficientScope { .. } => ErrorKind::Authentication,
            Self::Upstream(_) | Self::Storage { .. } => ErrorKind::Upstream,
            Self::Expired { .. } => ErrorKind::Expired,
        }
    }
}

impl From<UpstreamError> for OAuthError {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream(err)
    }
}

/// 大类映射到状态码。
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::Expired => StatusCode::BAD_REQUEST,
        ErrorKind::Authentication => StatusCode::FORBIDDEN,
        ErrorKind::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// OAuth 错误映射到 API 错误。
pub(crate) fn oauth_error_to_api(err: OAuthError) -> ApiError {
    let status = status_for(err.kind());
    match err {
        OAuthError::SignatureMissing => {
            ApiError::new(status, "SIGNATURE_MISSING", "回调缺少 hmac 签名")
        }
        OAuthError::SignatureInvalid => ApiError::new(status, "SIGNATURE_INVALID", "hmac 签名无效"),
        OAuthError::ShopInvalid { received } => ApiError::new(
            status,
            "SHOP_INVALID",
            "shop 参数无效，应形如 example-shop.myshopify.com",
        )
        .with_detail(format!(
            "收到: {}",
            received.as_deref().unwrap_or("<未提供>")
        )),
        OAuthError::StateMissing => ApiError::new(status, "STATE_MISSING", "缺少 state 参数"),
        OAuthError::StateMismatch => {
            ApiError::new(status, "STATE_MISMATCH", "state 与本次安装的 nonce 不一致")
        }
        OAuthError::TimestampInvalid { received } => {
            ApiError::new(status, "TIMESTAMP_INVALID", "timestamp 参数无效")
                .with_detail(format!("收到: {received}"))
        }
        OAuthError::Expired { skew_sec } => ApiError::new(status, "REQUEST_EXPIRED", "请求已过期")
            .with_detail(format!("时间偏差 {skew_sec}s 超过 {MAX_CLOCK_SKEW_SEC}s")),
        OAuthError::CodeMissing => ApiError::new(status, "CODE_MISSING", "缺少授权码 code"),
        OAuthError::InsufficientScope { missing } => ApiError::new(
            status,
            "INSUFFICIENT_SCOPE",
            format!("授权 scope 不足，缺少: {}", missing.join(",")),
        ),
        OAuthError::Upstream(err) => {
            ApiError::new(status, "UPSTREAM_ERROR", "处理授权时出错").with_detail(err.to_string())
        }
        OAuthError::Storage { reason } => {
            ApiError::new(status, "CREDENTIAL_STORE_ERROR", "保存凭证失败").with_detail(reason)
        }
    }
}
