//! 安装流程防伪 nonce：生成、登记与一次性消费。

use std::{collections::HashMap, sync::Arc};

use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use crate::api::types::{MAX_PENDING_NONCES, NONCE_BYTES, NONCE_TTL_SEC};

/// 生成高熵 nonce（16 字节随机数，hex 编码）。
pub(crate) fn generate_nonce() -> String {
    let mut bytes = [0_u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 常量时间比较两个 nonce；长度不同直接判为不等。
pub(crate) fn nonces_match(expected: &str, received: &str) -> bool {
    let a = expected.as_bytes();
    let b = received.as_bytes();
    if a.is_empty() || a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// nonce 消费结果。
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum NonceCheck {
    /// 本进程签发且首次消费。
    Issued,
    /// 本进程未见过（其他实例签发或进程已重启），依赖 cookie 比对。
    Unknown,
}

/// nonce 拒绝原因。
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum NonceRejection {
    Replayed,
    Expired,
}

#[derive(Debug, Clone, Copy)]
struct NonceEntry {
    issued_at: u64,
    consumed: bool,
}

/// 进程内 nonce 登记表，条目数不超过 `capacity`。
#[derive(Debug, Clone)]
pub(crate) struct NonceStore {
    entries: Arc<RwLock<HashMap<String, NonceEntry>>>,
    capacity: usize,
}

impl Default for NonceStore {
    fn default() -> Self {
        Self {
            entries: Arc::default(),
            capacity: MAX_PENDING_NONCES,
        }
    }
}

impl NonceStore {
    #[cfg(test)]
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    /// 签发并登记新 nonce。清理过期条目后仍满时淘汰最早签发的一条。
    pub(crate) async fn issue(&self, now: u64) -> String {
        let nonce = generate_nonce();
        let mut guard = self.entries.write().await;
        guard.retain(|_, entry| entry.issued_at.saturating_add(NONCE_TTL_SEC) >= now);
        while guard.len() >= self.capacity {
            let Some(oldest) = guard
                .iter()
                .min_by_key(|(_, entry)| entry.issued_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            guard.remove(&oldest);
        }
        guard.insert(
            nonce.clone(),
            NonceEntry {
                issued_at: now,
                consumed: false,
            },
        );
        nonce
    }

    /// 消费 nonce：已消费或超过有效期的拒绝，未知 nonce 放行。
    pub(crate) async fn consume(
        &self,
        nonce: &str,
        now: u64,
    ) -> Result<NonceCheck, NonceRejection> {
        let mut guard = self.entries.write().await;
        let verdict = match guard.get_mut(nonce) {
            Some(entry) if entry.consumed => Err(NonceRejection::Replayed),
            Some(entry) if now.saturating_sub(entry.issued_at) > NONCE_TTL_SEC => {
                Err(NonceRejection::Expired)
            }
            Some(entry) => {
                entry.consumed = true;
                Ok(NonceCheck::Issued)
            }
            None => Ok(NonceCheck::Unknown),
        };
        guard.retain(|_, entry| entry.issued_at.saturating_add(NONCE_TTL_SEC) >= now);
        verdict
    }
}
