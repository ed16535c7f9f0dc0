//! OAuth HTTP 路由处理函数。

use axum::{
    Json,
    extract::{RawQuery, State},
    http::{
        HeaderMap, StatusCode,
        header::{COOKIE, LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use super::install::{clear_nonce_cookie, nonce_cookie};
use crate::{
    api::{
        error::ApiError,
        response::{ApiEnvelope, ok_response},
        types::{
            AppTokenData, AppTokenStatusData, AuthorizationRequest, CredentialEntry,
            CredentialsData, INSTALL_PATH, NONCE_COOKIE_NAME,
        },
    },
    oauth::error::{OAuthError, oauth_error_to_api},
    state::AppState,
};

/// 安装入口：302 跳转到平台授权页并写入 nonce cookie。
pub(crate) async fn install_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Response {
    let query = AuthorizationRequest::from_raw_query(raw.as_deref().unwrap_or_default());
    install_response(&state, &query).await
}

/// 根路径：带 `shop` 时等同安装入口，否则返回说明文本。
pub(crate) async fn index_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Response {
    let query = AuthorizationRequest::from_raw_query(raw.as_deref().unwrap_or_default());
    if query.shop.is_some() {
        return install_response(&state, &query).await;
    }
    format!("storelink gateway: open {INSTALL_PATH}?shop=<store>.myshopify.com to install")
        .into_response()
}

async fn install_response(state: &AppState, query: &AuthorizationRequest) -> Response {
    match state.begin_install(query).await {
        Ok(redirect) => (
            StatusCode::FOUND,
            [
                (LOCATION, redirect.location),
                (SET_COOKIE, nonce_cookie(&redirect.nonce)),
            ],
        )
            .into_response(),
        Err(err) => {
            let api = oauth_error_to_api(err);
            warn!("install rejected: {} ({})", api.code, api.status);
            api.into_response()
        }
    }
}

/// OAuth 回调：成功后清除 nonce cookie，返回已保存凭证的元数据。
pub(crate) async fn callback_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Response {
    let query = AuthorizationRequest::from_raw_query(raw.as_deref().unwrap_or_default());
    let cookie_nonce = cookie_value(&headers, NONCE_COOKIE_NAME);
    match state.complete_callback(&query, cookie_nonce.as_deref()).await {
        Ok(data) => {
            let (status, body) = ok_response(StatusCode::OK, "应用安装完成", Some(data));
            (status, [(SET_COOKIE, clear_nonce_cookie())], body).into_response()
        }
        Err(err) => {
            let api = oauth_error_to_api(err);
            warn!(
                "callback for {} rejected: {} ({})",
                query.shop.as_deref().unwrap_or("<未提供>"),
                api.code,
                api.status
            );
            api.into_response()
        }
    }
}

/// 调试接口：应用级 token 缓存状态（不含 token）。
pub(crate) async fn app_token_status_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiEnvelope<AppTokenStatusData>>) {
    let data = match state.app_token.as_ref() {
        Some(cache) => {
            let status = cache.status().await;
            AppTokenStatusData {
                configured: true,
                shop: Some(cache.shop().to_string()),
                cached: status.cached,
                expires_at: status.expires_at,
            }
        }
        None => AppTokenStatusData {
            configured: false,
            shop: None,
            cached: false,
            expires_at: None,
        },
    };
    ok_response(StatusCode::OK, "应用 token 缓存状态", Some(data))
}

/// 经缓存获取应用级 token，响应只含掩码。
pub(crate) async fn app_token_handler(State(state): State<AppState>) -> Response {
    let Some(cache) = state.app_token.as_ref() else {
        return ApiError::new(
            StatusCode::BAD_REQUEST,
            "APP_TOKEN_NOT_CONFIGURED",
            "未配置 SHOPIFY_SHOP，无法获取应用 token",
        )
        .into_response();
    };
    let token = match cache.get_token().await {
        Ok(token) => token,
        Err(err) => {
            let api = oauth_error_to_api(OAuthError::Upstream(err));
            warn!("app token for {} unavailable: {}", cache.shop(), api.code);
            return api.into_response();
        }
    };
    let data = AppTokenData {
        shop: cache.shop().to_string(),
        token: token.masked(),
        scopes: token.scopes,
        expires_at: cache.status().await.expires_at,
    };
    ok_response(StatusCode::OK, "应用 token 可用", Some(data)).into_response()
}

/// 调试接口：已保存凭证列表（不含 token）。
pub(crate) async fn credentials_handler(State(state): State<AppState>) -> Response {
    match state.credentials.list() {
        Ok(list) => {
            let credentials = list
                .into_iter()
                .map(|item| CredentialEntry {
                    shop: item.shop,
                    scopes: item.scopes,
                    stored_at: item.stored_at,
                })
                .collect::<Vec<_>>();
            info!("listing {} stored credentials", credentials.len());
            ok_response(
                StatusCode::OK,
                "已保存凭证",
                Some(CredentialsData { credentials }),
            )
            .into_response()
        }
        Err(err) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "CREDENTIAL_STORE_ERROR",
            "读取凭证失败",
        )
        .with_detail(err.to_string())
        .into_response(),
    }
}

/// 从 `Cookie` 请求头读取指定 cookie。
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
