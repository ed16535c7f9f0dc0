//! Gateway 二进制入口：CLI 分发后启动 HTTP 服务。

mod api;
mod app;
mod auth;
mod cli;
mod config;
mod credentials;
mod logging;
mod oauth;
mod state;
mod upstream;

#[tokio::main]
/// 启动 Gateway 服务。
async fn main() -> anyhow::Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<String>>();
    match cli::dispatch(&args).await? {
        cli::CliDispatch::Run => {}
        cli::CliDispatch::Exit => return Ok(()),
    }

    let _log_runtime = logging::init("gateway")?;
    let config = config::Config::from_env()?;
    app::run(config).await
}
