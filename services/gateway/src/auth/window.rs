//! 请求时间戳解析与新鲜度校验。

use crate::{api::types::MAX_CLOCK_SKEW_SEC, oauth::error::OAuthError};

/// 当前 unix 秒。
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// 解析秒级时间戳。
pub(crate) fn parse_ts(raw: &str) -> Result<u64, OAuthError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| OAuthError::TimestampInvalid {
            received: raw.to_string(),
        })
}

/// 校验时间窗：`|now - ts| <= MAX_CLOCK_SKEW_SEC`。
pub(crate) fn verify_freshness(ts: u64, now: u64) -> Result<(), OAuthError> {
    let skew_sec = now.abs_diff(ts);
    if skew_sec > MAX_CLOCK_SKEW_SEC {
        return Err(OAuthError::Expired { skew_sec });
    }
    Ok(())
}
