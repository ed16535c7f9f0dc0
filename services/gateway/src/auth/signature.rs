//! 平台请求签名：参数规范化 + HMAC-SHA256（hex）。
//!
//! 规范化规则：去掉签名字段与空值参数，按键字节序升序排列，
//! 以 `k=v` 用 `&` 拼接。值保持原样（平台签名时已是编码后的形态）。

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::AppSecret;

type HmacSha256 = Hmac<Sha256>;

/// 平台 query 签名校验器。
#[derive(Debug, Clone)]
pub(crate) struct SignatureVerifier {
    secret: AppSecret,
}

impl SignatureVerifier {
    pub(crate) fn new(secret: AppSecret) -> Self {
        Self { secret }
    }

    /// 校验参数签名。缺失、空白、非 hex、长度不符、内容不符一律返回 `false`。
    pub(crate) fn verify<'a, I>(&self, params: I, signature_field: &str) -> bool
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let (signature, canonical) = split_signature(params, signature_field);
        let Some(signature) = signature.filter(|value| !value.trim().is_empty()) else {
            return false;
        };
        let Ok(received) = hex::decode(signature) else {
            return false;
        };
        let Some(mac) = self.mac_for(&canonical) else {
            return false;
        };
        // verify_slice 先比较长度，再做常量时间比较。
        mac.verify_slice(&received).is_ok()
    }

    /// 计算参数签名（小写 hex）。
    pub(crate) fn sign<'a, I>(&self, params: I, signature_field: &str) -> Option<String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let (_, canonical) = split_signature(params, signature_field);
        let mac = self.mac_for(&canonical)?;
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    fn mac_for(&self, canonical: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose().as_bytes()).ok()?;
        mac.update(canonical.as_bytes());
        Some(mac)
    }
}

/// 生成规范化字符串（不含签名字段与空值参数）。
pub(crate) fn canonical_string<'a, I>(params: I, signature_field: &str) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    split_signature(params, signature_field).1
}

/// 拆出签名值，并对其余参数做规范化。重复键以最后一次出现为准。
fn split_signature<'a, I>(params: I, signature_field: &str) -> (Option<&'a str>, String)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut signature = None;
    let mut filtered = BTreeMap::new();
    for (key, value) in params {
        if key == signature_field {
            signature = Some(value);
            continue;
        }
        filtered.insert(key, value);
    }

    let canonical = filtered
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<String>>()
        .join("&");
    (signature, canonical)
}

#[cfg(test)]
mod tests {
    use super::{SignatureVerifier, canonical_string};
    use crate::config::AppSecret;

    const FIELD: &str = "hmac";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(AppSecret::new("hush"))
    }

    fn signed(params: &[(&str, &str)]) -> Vec<(String, String)> {
        let sig = verifier()
            .sign(params.iter().copied(), FIELD)
            .expect("hmac accepts any key");
        let mut out: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        out.push((FIELD.to_string(), sig));
        out
    }

    fn as_refs(pairs: &[(String, String)]) -> impl Iterator<Item = (&str, &str)> {
        pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[test]
    fn canonical_string_sorts_and_drops_empty_and_signature() {
        let canonical = canonical_string(
            [
                ("timestamp", "1700000000"),
                ("hmac", "deadbeef"),
                ("shop", "demo.myshopify.com"),
                ("host", ""),
                ("code", "abc"),
            ],
            FIELD,
        );
        assert_eq!(
            canonical,
            "code=abc&shop=demo.myshopify.com&timestamp=1700000000"
        );
    }

    #[test]
    fn canonical_string_ignores_arrival_order() {
        let a = canonical_string([("b", "2"), ("a", "1"), ("c", "3")], FIELD);
        let b = canonical_string([("c", "3"), ("b", "2"), ("a", "1")], FIELD);
        assert_eq!(a, b);
        let changed = canonical_string([("c", "3"), ("b", "20"), ("a", "1")], FIELD);
        assert_ne!(a, changed);
    }

    #[test]
    fn canonical_string_uses_byte_order() {
        let canonical = canonical_string([("a", "1"), ("B", "2"), ("_x", "3")], FIELD);
        assert_eq!(canonical, "B=2&_x=3&a=1");
    }

    #[test]
    fn valid_signature_verifies() {
        let pairs = signed(&[("shop", "demo.myshopify.com"), ("timestamp", "1700000000")]);
        assert!(verifier().verify(as_refs(&pairs), FIELD));
    }

    #[test]
    fn signature_survives_reordering() {
        let mut pairs = signed(&[
            ("shop", "demo.myshopify.com"),
            ("timestamp", "1700000000"),
            ("code", "abc"),
        ]);
        pairs.reverse();
        assert!(verifier().verify(as_refs(&pairs), FIELD));
    }

    #[test]
    fn flipping_any_signature_character_fails() {
        let pairs = signed(&[("shop", "demo.myshopify.com"), ("timestamp", "1700000000")]);
        let sig = pairs.last().expect("signature pushed").1.clone();
        for idx in 0..sig.len() {
            let mut chars: Vec<char> = sig.chars().collect();
            chars[idx] = if chars[idx] == '0' { '1' } else { '0' };
            let mut tampered = pairs.clone();
            tampered.last_mut().expect("signature pushed").1 = chars.into_iter().collect();
            assert!(
                !verifier().verify(as_refs(&tampered), FIELD),
                "flip at {idx} must fail"
            );
        }
    }

    #[test]
    fn changed_value_fails() {
        let mut pairs = signed(&[("shop", "demo.myshopify.com"), ("timestamp", "1700000000")]);
        pairs[1].1 = "1700000001".to_string();
        assert!(!verifier().verify(as_refs(&pairs), FIELD));
    }

    #[test]
    fn wrong_secret_fails() {
        let pairs = signed(&[("shop", "demo.myshopify.com")]);
        let other = SignatureVerifier::new(AppSecret::new("other"));
        assert!(!other.verify(as_refs(&pairs), FIELD));
    }

    #[test]
    fn missing_blank_and_malformed_signatures_fail_quietly() {
        let v = verifier();
        assert!(!v.verify([("shop", "demo.myshopify.com")], FIELD));
        assert!(!v.verify([("shop", "demo.myshopify.com"), ("hmac", "   ")], FIELD));
        assert!(!v.verify([("shop", "demo.myshopify.com"), ("hmac", "zz-not-hex")], FIELD));
        assert!(!v.verify([("shop", "demo.myshopify.com"), ("hmac", "abc")], FIELD));
        assert!(!v.verify([("shop", "demo.myshopify.com"), ("hmac", "00ff")], FIELD));
    }

    #[test]
    fn empty_values_do_not_affect_signature() {
        let pairs = signed(&[("shop", "demo.myshopify.com")]);
        let mut with_empty = pairs.clone();
        with_empty.push(("host".to_string(), String::new()));
        assert!(verifier().verify(as_refs(&with_empty), FIELD));
    }
}
