//! scope 列表解析与授予校验。

use super::error::OAuthError;

/// 解析逗号分隔的 scope 列表。
pub(crate) fn parse_scope_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// 校验已授予 scope 覆盖全部必需 scope（精确匹配，与顺序无关）。
pub(crate) fn ensure_required_scopes(
    granted: &[String],
    required: &[String],
) -> Result<(), OAuthError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|scope| !granted.contains(*scope))
        .cloned()
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(OAuthError::InsufficientScope { missing })
}

#[cfg(test)]
mod tests {
    use super::{ensure_required_scopes, parse_scope_list};
    use crate::oauth::error::OAuthError;

    fn required() -> Vec<String> {
        vec!["write_orders".to_string()]
    }

    #[test]
    fn granted_superset_passes() {
        let granted = parse_scope_list("read_orders,write_orders");
        assert!(ensure_required_scopes(&granted, &required()).is_ok());
    }

    #[test]
    fn missing_scope_is_named() {
        let granted = parse_scope_list("read_orders");
        match ensure_required_scopes(&granted, &required()) {
            Err(OAuthError::InsufficientScope { missing }) => {
                assert_eq!(missing, vec!["write_orders"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn match_is_exact() {
        let granted = parse_scope_list("write_orders_extra,unauthenticated_write_orders");
        assert!(ensure_required_scopes(&granted, &required()).is_err());
        assert!(ensure_required_scopes(&parse_scope_list(""), &[]).is_ok());
    }
}
