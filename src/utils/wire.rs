//! Serde helpers for loosely typed API payloads

use serde::{Deserialize, Deserializer};

/// Read an explicit `null` as the type's default.
///
/// `#[serde(default)]` only covers missing keys; the API also sends `null`
/// for empty columns. Pair with `default` to cover both.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
