//! Snapshot Codec Module
//!
//! Serializes the entry map to a JSON snapshot and back. The wire format is
//! an object mapping each key to `{"value": <V>, "ttl": <RFC3339>}`, where
//! `ttl` holds the entry's absolute expiry instant. Snapshots are taken
//! as-is: entries already past expiry are included, not filtered.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::Entry;
use crate::error::Result;

// == Encode ==
/// Encodes the entry map into a JSON snapshot.
pub(crate) fn encode<V: Serialize>(entries: &HashMap<String, Entry<V>>) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(entries)?)
}

// == Decode ==
/// Decodes a JSON snapshot into an entry map.
///
/// All-or-nothing: malformed input fails without producing any entries, so
/// the caller's map is never half-merged.
pub(crate) fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<HashMap<String, Entry<V>>> {
    Ok(serde_json::from_slice(bytes)?)
}
