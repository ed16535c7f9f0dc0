//! gateway CLI 分发：`run`、`doctor`、`token`、`sign`、`version`。

use anyhow::{Context, anyhow};
use serde_json::{Value, json};

use crate::{
    api::types::{AuthorizationRequest, SIGNATURE_FIELD},
    auth::signature::{SignatureVerifier, canonical_string},
    config::{AppSecret, Config},
    credentials::cache::AppTokenCache,
    upstream::client::ShopifyClient,
};

/// CLI 分发结果。
pub(crate) enum CliDispatch {
    /// 继续进入 HTTP 服务。
    Run,
    /// 命令已处理完成，主程序应退出。
    Exit,
}

/// 解析并执行 gateway CLI。
pub(crate) async fn dispatch(args: &[String]) -> anyhow::Result<CliDispatch> {
    let cmd = args.first().map(|raw| raw.trim()).unwrap_or_default();
    if cmd.is_empty() || cmd == "run" {
        return Ok(CliDispatch::Run);
    }

    if matches!(cmd, "-h" | "--help" | "help") {
        print_root_help();
        return Ok(CliDispatch::Exit);
    }

    match cmd {
        "doctor" => {
            let format = parse_doctor_format(&args[1..])?;
            run_doctor(format);
            Ok(CliDispatch::Exit)
        }
        "token" => {
            run_token().await?;
            Ok(CliDispatch::Exit)
        }
        "sign" => {
            let query = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: sl-gateway sign <query>"))?;
            let secret = std::env::var("SHOPIFY_CLIENT_SECRET")
                .ok()
                .filter(|raw| !raw.trim().is_empty())
                .context("SHOPIFY_CLIENT_SECRET is required for sign")?;
            let signed = sign_query(&AppSecret::new(secret.trim()), query)?;
            eprintln!("canonical: {}", signed.canonical);
            println!("{}", signed.query);
            Ok(CliDispatch::Exit)
        }
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(CliDispatch::Exit)
        }
        other => Err(anyhow!(
            "unknown command: {other}; run `sl-gateway --help` for usage"
        )),
    }
}

/// `doctor` 输出格式。
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum DoctorFormat {
    Text,
    Json,
}

/// 解析 doctor 的 `--format` 参数。
fn parse_doctor_format(args: &[String]) -> anyhow::Result<DoctorFormat> {
    if args.is_empty() {
        return Ok(DoctorFormat::Text);
    }
    if args.len() == 2 && args[0] == "--format" {
        return match args[1].as_str() {
            "text" => Ok(DoctorFormat::Text),
            "json" => Ok(DoctorFormat::Json),
            other => Err(anyhow!("unsupported doctor format: {other}")),
        };
    }
    Err(anyhow!("usage: sl-gateway doctor [--format text|json]"))
}

/// 打印配置体检结果；配置不可用时以非零码退出。
fn run_doctor(format: DoctorFormat) {
    let lookup = |key: &str| std::env::var(key).ok();
    let (healthy, payload) = doctor_payload(lookup);

    match format {
        DoctorFormat::Text => {
            if let Some(fields) = payload.as_object() {
                for (key, value) in fields {
                    match value {
                        Value::String(text) => println!("{key}: {text}"),
                        other => println!("{key}: {other}"),
                    }
                }
            }
        }
        DoctorFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string())
            );
        }
    }

    if !healthy {
        std::process::exit(1);
    }
}

/// 体检内容：只报告密钥是否存在，从不输出密钥本身。
fn doctor_payload<F>(lookup: F) -> (bool, Value)
where
    F: Fn(&str) -> Option<String>,
{
    let present = |key: &str| lookup(key).is_some_and(|raw| !raw.trim().is_empty());
    let client_id_present = present("SHOPIFY_CLIENT_ID");
    let client_secret_present = present("SHOPIFY_CLIENT_SECRET");

    match Config::from_lookup(&lookup) {
        Ok(config) => (
            true,
            json!({
                "status": "ok",
                "clientIdConfigured": client_id_present,
                "clientSecretConfigured": client_secret_present,
                "scopes": config.scopes.join(","),
                "requiredScopes": config.required_scopes.join(","),
                "publicBaseUrl": config.public_base_url.as_str(),
                "callbackUrl": config.callback_url,
                "appTokenShop": config.shop.unwrap_or_default(),
                "httpTimeoutSec": config.http_timeout.as_secs(),
                "upstreamOrigin": config
                    .upstream_origin
                    .map(String::from)
                    .unwrap_or_default(),
                "listenAddr": config.listen_addr,
            }),
        ),
        Err(err) => (
            false,
            json!({
                "status": "invalid",
                "clientIdConfigured": client_id_present,
                "clientSecretConfigured": client_secret_present,
                "error": format!("{err:#}"),
            }),
        ),
    }
}

/// 通过 token 缓存获取一次应用级 token，打印打码结果。
async fn run_token() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let shop = config
        .shop
        .clone()
        .context("SHOPIFY_SHOP is required for token")?;
    let cache = AppTokenCache::new(ShopifyClient::new(&config)?, shop.as_str());
    let token = cache
        .get_token()
        .await
        .with_context(|| format!("obtain app token for {shop} failed"))?;
    let status = cache.status().await;

    println!("shop: {shop}");
    println!("token: {}", token.masked());
    println!("scopes: {}", token.scopes.join(","));
    match status.expires_at.filter(|_| status.cached) {
        Some(expires_at) => println!("reusable-until: {expires_at}"),
        None => println!("reusable-until: not cached (no usable expires_in)"),
    }
    Ok(())
}

/// `sign` 结果。
#[derive(Debug)]
struct SignedQuery {
    canonical: String,
    query: String,
}

/// 为 query 追加有效签名（原有 `hmac` 参数被替换）。
fn sign_query(secret: &AppSecret, raw_query: &str) -> anyhow::Result<SignedQuery> {
    let raw_query = raw_query.trim().trim_start_matches('?');
    let request = AuthorizationRequest::from_raw_query(raw_query);
    let signature = SignatureVerifier::new(secret.clone())
        .sign(request.raw_pairs(), SIGNATURE_FIELD)
        .context("compute signature failed")?;

    let mut pairs: Vec<&str> = raw_query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some(SIGNATURE_FIELD))
        .collect();
    let signature_pair = format!("{SIGNATURE_FIELD}={signature}");
    pairs.push(&signature_pair);

    Ok(SignedQuery {
        canonical: canonical_string(request.raw_pairs(), SIGNATURE_FIELD),
        query: pairs.join("&"),
    })
}

/// 打印 root help。
fn print_root_help() {
    println!("sl-gateway usage:");
    println!("  sl-gateway run");
    println!("  sl-gateway doctor [--format text|json]");
    println!("  sl-gateway token");
    println!("  sl-gateway sign <query>");
    println!("  sl-gateway version");
}
