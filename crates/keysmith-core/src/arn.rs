//! Principal canonicalization and alias ARN parsing
//!
//! Users may be named bare (`jeff`) or prefixed (`user/jeff`), roles with
//! `role/`. Those forms are expanded with the caller's account ID; anything
//! starting with `arn:` is passed to AWS verbatim.

use crate::error::{Error, Result};
use std::collections::BTreeSet;

const ARN_PREFIX: &str = "arn:";
const IAM_PREFIX: &str = "arn:aws:iam::";
const SHORT_FORMS: &[&str] = &["user/", "role/"];

/// Canonicalize one principal token.
///
/// Returns `None` for blank tokens.
pub fn canonicalize_principal(account_id: &str, token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if token.starts_with(ARN_PREFIX) {
        return Some(token.to_string());
    }
    if SHORT_FORMS.iter().any(|prefix| token.starts_with(prefix)) {
        Some(format!("{}{}:{}", IAM_PREFIX, account_id, token))
    } else {
        Some(format!("{}{}:user/{}", IAM_PREFIX, account_id, token))
    }
}

/// Canonicalize a comma-delimited principal list: blanks dropped,
/// duplicates removed, sorted ascending.
pub fn canonicalize_principals(account_id: &str, tokens: &str) -> Vec<String> {
    tokens
        .split(',')
        .filter_map(|token| canonicalize_principal(account_id, token))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Reject an empty principal list
pub fn validate_principals(principals: &[String]) -> Result<()> {
    if principals.is_empty() {
        return Err(Error::EmptyPrincipalList);
    }
    Ok(())
}

/// Region and alias name carried by a KMS alias ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasArn {
    pub region: String,
    pub alias_name: String,
}

/// Parse `arn:<partition>:kms:<region>:<account>:alias/<name>`
pub fn parse_alias_arn(key_id: &str) -> Result<AliasArn> {
    let parts: Vec<&str> = key_id.splitn(6, ':').collect();
    match parts.as_slice() {
        ["arn", _partition, "kms", region, _account, resource]
            if !region.is_empty() && resource.starts_with("alias/") =>
        {
            Ok(AliasArn {
                region: region.to_string(),
                alias_name: resource.to_string(),
            })
        }
        _ => Err(Error::not_an_alias_arn(key_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_forms() {
        assert_eq!(canonicalize_principal("123", "  "), None);
        assert_eq!(
            canonicalize_principal("123", "jeff").as_deref(),
            Some("arn:aws:iam::123:user/jeff")
        );
        assert_eq!(
            canonicalize_principal("123", "user/jeff").as_deref(),
            Some("arn:aws:iam::123:user/jeff")
        );
        assert_eq!(
            canonicalize_principal("123", " role/webserver ").as_deref(),
            Some("arn:aws:iam::123:role/webserver")
        );
        assert_eq!(
            canonicalize_principal("123", "arn:aws:iam::999:root").as_deref(),
            Some("arn:aws:iam::999:root")
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        for token in ["jeff", "role/webserver", "user/x", "arn:aws:iam::1:user/y"] {
            let once = canonicalize_principal("123", token).unwrap();
            let twice = canonicalize_principal("123", &once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_canonicalize_list() {
        let principals =
            canonicalize_principals("123", "jeff,role/webserver,arn:aws:iam::123:user/x");
        assert_eq!(
            principals,
            vec![
                "arn:aws:iam::123:role/webserver",
                "arn:aws:iam::123:user/jeff",
                "arn:aws:iam::123:user/x",
            ]
        );
    }

    #[test]
    fn test_canonicalize_list_dedupes_and_sorts() {
        let principals = canonicalize_principals("123", "zed,,user/zed, alice ,zed");
        assert_eq!(
            principals,
            vec!["arn:aws:iam::123:user/alice", "arn:aws:iam::123:user/zed"]
        );
        assert!(principals.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_validate_principals() {
        assert!(validate_principals(&canonicalize_principals("123", " , ")).is_err());
        assert!(validate_principals(&["arn:aws:iam::123:user/a".to_string()]).is_ok());
    }

    #[test]
    fn test_parse_alias_arn() {
        let parsed = parse_alias_arn("arn:aws:kms:us-west-1:123:alias/keysmith-default").unwrap();
        assert_eq!(parsed.region, "us-west-1");
        assert_eq!(parsed.alias_name, "alias/keysmith-default");

        assert!(parse_alias_arn("arn:aws:kms:us-west-1:123:key/abcd").is_err());
        assert!(parse_alias_arn("testing").is_err());
        assert!(parse_alias_arn("arn:aws:kms::123:alias/x").is_err());
    }
}
