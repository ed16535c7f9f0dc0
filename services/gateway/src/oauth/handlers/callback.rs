//! OAuth 回调：逐级校验后用授权码换取 token 并保存。

use tracing::{debug, info, warn};

use crate::{
    api::types::{AuthorizationRequest, CallbackData, SIGNATURE_FIELD},
    auth::{
        nonce::{NonceCheck, nonces_match},
        window::{parse_ts, unix_now, verify_freshness},
    },
    oauth::{error::OAuthError, scopes::ensure_required_scopes, shop::validate_shop},
    state::AppState,
};

impl AppState {
    /// 回调处理。校验顺序固定：签名、shop、state、时间窗、code，之后才访问上游。
    pub(super) async fn complete_callback(
        &self,
        query: &AuthorizationRequest,
        cookie_nonce: Option<&str>,
    ) -> Result<CallbackData, OAuthError> {
        if !query.has_signature() {
            return Err(OAuthError::SignatureMissing);
        }
        if !self.verifier.verify(query.raw_pairs(), SIGNATURE_FIELD) {
            return Err(OAuthError::SignatureInvalid);
        }
        let shop = validate_shop(query.shop.as_deref())?;
        if let Some(host) = query.host.as_deref() {
            debug!("callback for {shop} from admin host {host}");
        }

        let state = query
            .state
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or(OAuthError::StateMissing)?;
        if !nonces_match(cookie_nonce.unwrap_or_default(), state) {
            return Err(OAuthError::StateMismatch);
        }

        let now = unix_now();
        match self.nonces.consume(state, now).await {
            Ok(NonceCheck::Issued) => {}
            Ok(NonceCheck::Unknown) => {
                info!("callback for {shop} carries a nonce issued elsewhere; cookie matched");
            }
            Err(rejection) => {
                warn!("callback for {shop} rejected: nonce {rejection:?}");
                return Err(OAuthError::StateMismatch);
            }
        }

        if let Some(raw) = query.timestamp.as_deref().filter(|value| !value.is_empty()) {
            verify_freshness(parse_ts(raw)?, now)?;
        }

        let code = query
            .code
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or(OAuthError::CodeMissing)?;

        let token = self
            .shopify
            .exchange_code(shop, code)
            .await?
            .into_access_token();
        ensure_required_scopes(&token.scopes, &self.config.required_scopes)?;

        let stored = self
            .credentials
            .save(shop, token)
            .map_err(|err| OAuthError::Storage {
                reason: err.to_string(),
            })?;
        info!(
            "credential stored for {shop} with scopes {}",
            stored.scopes.join(",")
        );
        Ok(CallbackData {
            shop: stored.shop,
            scopes: stored.scopes,
            stored_at: stored.stored_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::types::AuthorizationRequest,
        auth::window::unix_now,
        config::test_config,
        oauth::error::OAuthError,
        state::AppState,
    };

    const SHOP: &str = "demo.myshopify.com";

    fn state() -> AppState {
        AppState::new(test_config(None)).expect("state builds")
    }

    fn signed_query(state: &AppState, pairs: &[(&str, &str)]) -> AuthorizationRequest {
        let signature = state
            .verifier
            .sign(pairs.iter().copied(), "hmac")
            .expect("sign");
        let mut raw: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        raw.push(format!("hmac={signature}"));
        AuthorizationRequest::from_raw_query(&raw.join("&"))
    }

    async fn expect_err(
        state: &AppState,
        query: &AuthorizationRequest,
        cookie: Option<&str>,
    ) -> OAuthError {
        state
            .complete_callback(query, cookie)
            .await
            .expect_err("callback must fail")
    }

    #[tokio::test]
    async fn missing_signature_is_first_gate() {
        let state = state();
        let query = AuthorizationRequest::from_raw_query("shop=bad&code=x");
        assert!(matches!(
            expect_err(&state, &query, None).await,
            OAuthError::SignatureMissing
        ));
    }

    #[tokio::test]
    async fn tampered_query_fails_signature() {
        let state = state();
        let query = signed_query(&state, &[("code", "abc"), ("shop", SHOP)]);
        let mut raw: Vec<(String, String)> = query
            .raw_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for pair in raw.iter_mut().filter(|(k, _)| k == "code") {
            pair.1 = "abd".to_string();
        }
        let tampered: Vec<String> = raw.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let tampered = AuthorizationRequest::from_raw_query(&tampered.join("&"));
        assert!(matches!(
            expect_err(&state, &tampered, None).await,
            OAuthError::SignatureInvalid
        ));
    }

    #[tokio::test]
    async fn state_gates_run_before_code() {
        let state = state();
        let nonce = state.nonces.issue(unix_now()).await;

        let no_state = signed_query(&state, &[("shop", SHOP)]);
        assert!(matches!(
            expect_err(&state, &no_state, Some(nonce.as_str())).await,
            OAuthError::StateMissing
        ));

        let with_state = signed_query(&state, &[("shop", SHOP), ("state", nonce.as_str())]);
        assert!(matches!(
            expect_err(&state, &with_state, None).await,
            OAuthError::StateMismatch
        ));
        assert!(matches!(
            expect_err(&state, &with_state, Some("ffffffffffffffffffffffffffffffff")).await,
            OAuthError::StateMismatch
        ));
        assert!(matches!(
            expect_err(&state, &with_state, Some(nonce.as_str())).await,
            OAuthError::CodeMissing
        ));
    }

    #[tokio::test]
    async fn consumed_nonce_cannot_be_replayed() {
        let state = state();
        let nonce = state.nonces.issue(unix_now()).await;
        let query = signed_query(&state, &[("shop", SHOP), ("state", nonce.as_str())]);

        assert!(matches!(
            expect_err(&state, &query, Some(nonce.as_str())).await,
            OAuthError::CodeMissing
        ));
        assert!(matches!(
            expect_err(&state, &query, Some(nonce.as_str())).await,
            OAuthError::StateMismatch
        ));
    }

    #[tokio::test]
    async fn stale_or_garbled_timestamp_is_rejected() {
        let state = state();
        let stale = (unix_now() - 301).to_string();
        let query = signed_query(
            &state,
            &[("shop", SHOP), ("state", "aa11"), ("timestamp", stale.as_str())],
        );
        assert!(matches!(
            expect_err(&state, &query, Some("aa11")).await,
            OAuthError::Expired { .. }
        ));

        let garbled = signed_query(
            &state,
            &[("shop", SHOP), ("state", "bb22"), ("timestamp", "soon")],
        );
        assert!(matches!(
            expect_err(&state, &garbled, Some("bb22")).await,
            OAuthError::TimestampInvalid { .. }
        ));
    }

    #[tokio::test]
    async fn empty_timestamp_counts_as_absent() {
        let state = state();
        let query = signed_query(
            &state,
            &[("shop", SHOP), ("state", "aa11"), ("timestamp", "")],
        );
        assert_eq!(query.timestamp.as_deref(), Some(""));
        assert!(matches!(
            expect_err(&state, &query, Some("aa11")).await,
            OAuthError::CodeMissing
        ));
    }
}
