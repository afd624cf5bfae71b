//! Change detection between cached snapshots
//!
//! Snapshots are compared through a canonical JSON rendering with object keys
//! sorted at every level, so two payloads holding the same data compare equal
//! no matter how their maps were ordered.

use serde::Serialize;
use serde_json::Value;

/// Outcome of comparing a candidate snapshot against the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The candidate differs and should replace the current snapshot
    Commit,
    /// The candidate is identical to the current snapshot
    Unchanged,
    /// The candidate is empty while the cache holds real data
    RejectedEmpty,
}

impl Decision {
    /// Returns true if the candidate should be committed
    pub fn should_commit(self) -> bool {
        self == Decision::Commit
    }
}

/// Renders a value into its canonical byte form
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_vec(&canonicalize(value))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonicalize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Returns true if a canonical rendering carries no data
pub fn is_empty(canonical: &[u8]) -> bool {
    matches!(
        canonical.trim_ascii(),
        b"" | b"null" | b"[]" | b"{}" | b"\"\""
    )
}

/// Decides whether `candidate` should replace `current`
///
/// An unpopulated cache takes whatever it is given, even an empty value. Once
/// populated with real data, an empty candidate is treated as a degraded
/// upstream response and rejected.
pub fn decide(current: &[u8], candidate: &[u8], populated: bool) -> Decision {
    if !populated {
        return Decision::Commit;
    }
    if is_empty(candidate) && !is_empty(current) {
        return Decision::RejectedEmpty;
    }
    if current == candidate {
        Decision::Unchanged
    } else {
        Decision::Commit
    }
}
