//! Serde helpers for fields whose presence and nullability both matter
//!
//! - [`required`]: the key must be present, `null` is allowed.
//! - [`present`]: used with `#[serde(default)]` on patch bodies; an absent
//!   key stays `None`, an explicit `null` is rejected.
//! - [`patch`]: used with `#[serde(default)]` on patch bodies for nullable
//!   fields; absent is `None`, `null` is `Some(None)`.

use serde::{Deserialize, Deserializer};

pub fn required<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

pub fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

pub fn patch<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
