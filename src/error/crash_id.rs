use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Ties a caught panic to the log line that recorded it. Time ordered, so
/// crash ids sort in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(type = "string")]
pub struct CrashId(Uuid);

impl CrashId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CrashId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CrashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_the_bare_uuid() {
        let id = CrashId::new();
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        let back: CrashId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn later_ids_sort_after_earlier_ones() {
        let first = CrashId::new().to_string();
        let second = CrashId::new().to_string();
        assert!(first <= second);
    }
}
