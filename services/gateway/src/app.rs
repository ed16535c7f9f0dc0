//! Gateway 应用装配：路由、CORS 与监听。

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::{
    api::types::{CALLBACK_PATH, INSTALL_PATH},
    config::Config,
    oauth::handlers::{
        app_token_handler, app_token_status_handler, callback_handler, credentials_handler,
        index_handler, install_handler,
    },
    state::AppState,
};

/// Gateway 入口：装配状态并启动 HTTP 路由。
pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    let addr = config.listen_addr.clone();
    info!(
        "public callback url {}, requested scopes {}",
        config.callback_url,
        config.scopes.join(",")
    );
    let app = router(AppState::new(config)?);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("sl-gateway listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// 构建全部路由。
pub(crate) fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/", get(index_handler))
        .route(INSTALL_PATH, get(install_handler))
        .route(CALLBACK_PATH, get(callback_handler))
        .route("/healthz", get(healthz))
        .route("/v1/app-token", get(app_token_handler))
        .route("/v1/debug/app-token", get(app_token_status_handler))
        .route("/v1/debug/credentials", get(credentials_handler))
        .layer(cors)
        .with_state(state)
}

/// 健康检查接口。
async fn healthz() -> &'static str {
    "ok"
}
