//! Merge provisioned keys into the key template

use crate::error::Result;
use keysmith_core::config::KEY_TEMPLATE_NAME;
use keysmith_core::{FileStore, RegionKeys, StoredValue};
use std::collections::BTreeMap;
use tracing::info;

/// Merge `keys` into `existing` without duplicating or dropping entries.
///
/// Entries are identified by key manager + key ID. Every existing entry is
/// kept as-is unless a new key overwrites it under the same identity; new
/// keys take `algorithm`. The result is sorted by key ID, then key manager.
pub fn merge_template(
    existing: Vec<StoredValue>,
    keys: &RegionKeys,
    key_manager: &str,
    algorithm: &str,
) -> Vec<StoredValue> {
    let mut entries: BTreeMap<String, StoredValue> = existing
        .into_iter()
        .map(|value| (value.template_key(), value))
        .collect();

    for key_id in keys.values() {
        let entry = StoredValue::template_entry(key_id.as_str(), key_manager, algorithm);
        entries.insert(entry.template_key(), entry);
    }

    let mut merged: Vec<StoredValue> = entries.into_values().collect();
    merged.sort_by(|a, b| {
        a.key_id
            .cmp(&b.key_id)
            .then_with(|| a.key_manager.cmp(&b.key_manager))
    });
    merged
}

/// Read the key template from `store`, merge `keys`, and write it back.
///
/// A store or template that does not exist yet starts empty.
pub fn reconcile_template(
    store: &FileStore,
    keys: &RegionKeys,
    key_manager: &str,
    algorithm: &str,
) -> Result<()> {
    let existing = store.get_or_empty(KEY_TEMPLATE_NAME)?;
    let merged = merge_template(existing, keys, key_manager, algorithm);
    let total = merged.len();

    store.put(KEY_TEMPLATE_NAME, merged)?;
    info!(
        "Key template in {} now has {} entries",
        store.path().display(),
        total
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keys(pairs: &[(&str, &str)]) -> RegionKeys {
        pairs
            .iter()
            .map(|(region, arn)| (region.to_string(), arn.to_string()))
            .collect()
    }

    #[test]
    fn test_merge_preserves_other_managers() {
        let foreign = StoredValue::template_entry("projects/p/keys/k", "gcpkms", "secretbox");
        let merged = merge_template(
            vec![foreign.clone()],
            &keys(&[("us-east-1", "arn:east")]),
            "kms",
            "aesgcm256",
        );
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&foreign));
    }

    #[test]
    fn test_merge_overwrites_algorithm_without_duplicating() {
        let old = StoredValue::template_entry("arn:east", "kms", "secretbox");
        let merged = merge_template(
            vec![old],
            &keys(&[("us-east-1", "arn:east")]),
            "kms",
            "aesgcm256",
        );
        assert_eq!(merged, vec![StoredValue::template_entry("arn:east", "kms", "aesgcm256")]);
    }

    #[test]
    fn test_merge_is_idempotent_and_sorted() {
        let new = keys(&[("us-west-2", "arn:b"), ("us-east-1", "arn:a")]);
        let once = merge_template(Vec::new(), &new, "kms", "aesgcm256");
        let twice = merge_template(once.clone(), &new, "kms", "aesgcm256");
        assert_eq!(once, twice);

        let ids: Vec<&str> = once.iter().map(|v| v.key_id.as_str()).collect();
        assert_eq!(ids, vec!["arn:a", "arn:b"]);
    }

    #[test]
    fn test_reconcile_starts_from_missing_store() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("secrets.yml"));

        reconcile_template(
            &store,
            &keys(&[("us-east-1", "arn:a"), ("us-west-2", "arn:b")]),
            "kms",
            "aesgcm256",
        )
        .unwrap();

        let template = store.get(KEY_TEMPLATE_NAME).unwrap();
        let ids: Vec<&str> = template.iter().map(|v| v.key_id.as_str()).collect();
        assert_eq!(ids, vec!["arn:a", "arn:b"]);
        assert!(template.iter().all(|v| v.algorithm == "aesgcm256"));
    }

    #[test]
    fn test_reconcile_keeps_unrelated_names() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("secrets.yml"));
        let secret = StoredValue {
            key_id: "arn:a".to_string(),
            key_manager: "kms".to_string(),
            algorithm: "aesgcm256".to_string(),
            key_ciphertext: "d2s=".to_string(),
            ciphertext: "Y3Q=".to_string(),
        };
        store.put("db_password", vec![secret.clone()]).unwrap();

        reconcile_template(&store, &keys(&[("us-east-1", "arn:a")]), "kms", "aesgcm256").unwrap();

        assert_eq!(store.get("db_password").unwrap(), vec![secret]);
    }
}
