// ABOUTME: Custom serde helpers for the deployment state file.
// ABOUTME: Treats explicit nulls as empty collections so they round-trip as [].

use serde::{Deserialize, Deserializer};

/// Deserialize a list where `null` means "no entries".
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize a map where `null` means "no properties".
pub fn null_as_empty_map<'de, D>(
    deserializer: D,
) -> Result<serde_json::Map<String, serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}
