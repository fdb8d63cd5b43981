//! State carried across session rebuilds and process death
//!
//! A rebuilt session continues from the [`RehydrationState`] of the session it
//! replaces (frame numbering, debug flags). The same container, serialized to
//! JSON, backs the host's saved-instance bundle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Flag(bool),
    Int(i64),
    Text(String),
    Nested(RehydrationState),
}

/// Keyed bag of values, nestable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RehydrationState {
    entries: BTreeMap<String, StoredValue>,
}

impl RehydrationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value<T: RehydrationValue>(mut self, key: &str, value: T) -> Self {
        self.set_value(key, value);
        self
    }

    pub fn set_value<T: RehydrationValue>(&mut self, key: &str, value: T) {
        self.entries.insert(key.to_string(), value.into_stored());
    }

    /// `None` when the key is missing or holds another type
    pub fn get_value<T: RehydrationValue>(&self, key: &str) -> Option<T> {
        self.entries.get(key).and_then(T::from_stored)
    }

    pub fn set_nested(&mut self, key: &str, state: RehydrationState) {
        self.entries.insert(key.to_string(), StoredValue::Nested(state));
    }

    pub fn get_nested(&self, key: &str) -> Option<&RehydrationState> {
        match self.entries.get(key) {
            Some(StoredValue::Nested(state)) => Some(state),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of `other` replace entries with the same key
    pub fn merge(&mut self, other: RehydrationState) {
        self.entries.extend(other.entries);
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Types storable in a [`RehydrationState`]
pub trait RehydrationValue: Sized {
    fn into_stored(self) -> StoredValue;
    fn from_stored(value: &StoredValue) -> Option<Self>;
}

impl RehydrationValue for bool {
    fn into_stored(self) -> StoredValue {
        StoredValue::Flag(self)
    }

    fn from_stored(value: &StoredValue) -> Option<Self> {
        match value {
            StoredValue::Flag(v) => Some(*v),
            _ => None,
        }
    }
}

impl RehydrationValue for i64 {
    fn into_stored(self) -> StoredValue {
        StoredValue::Int(self)
    }

    fn from_stored(value: &StoredValue) -> Option<Self> {
        match value {
            StoredValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl RehydrationValue for u64 {
    fn into_stored(self) -> StoredValue {
        StoredValue::Int(i64::try_from(self).unwrap_or(i64::MAX))
    }

    fn from_stored(value: &StoredValue) -> Option<Self> {
        match value {
            StoredValue::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl RehydrationValue for String {
    fn into_stored(self) -> StoredValue {
        StoredValue::Text(self)
    }

    fn from_stored(value: &StoredValue) -> Option<Self> {
        match value {
            StoredValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Types that save and restore themselves through a [`RehydrationState`]
pub trait Rehydratable {
    fn dehydrate(&self) -> RehydrationState;

    fn rehydrate(&mut self, state: &RehydrationState) -> Result<(), RehydrationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RehydrationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: i64, actual: i64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_values() {
        let state = RehydrationState::new()
            .with_value("frame_number", 42u64)
            .with_value("mode", "vr".to_string())
            .with_value("hud", true);

        assert_eq!(state.get_value::<u64>("frame_number"), Some(42));
        assert_eq!(state.get_value::<String>("mode"), Some("vr".to_string()));
        assert_eq!(state.get_value::<bool>("hud"), Some(true));
        assert_eq!(state.get_value::<bool>("debug"), None);
        // Wrong type reads as missing
        assert_eq!(state.get_value::<bool>("mode"), None);
    }

    #[test]
    fn test_nested_state() {
        let mut state = RehydrationState::new();
        state.set_nested("debug", RehydrationState::new().with_value("hud", true));

        let nested = state.get_nested("debug").unwrap();
        assert_eq!(nested.get_value::<bool>("hud"), Some(true));
        assert!(state.get_nested("missing").is_none());
    }

    #[test]
    fn test_json_survives_process_restart() {
        let mut state = RehydrationState::new()
            .with_value("vr_mode", true)
            .with_value("version", 1i64)
            .with_value("platform", "android".to_string());
        state.set_nested("debug", RehydrationState::new().with_value("hud", false));

        let json = state.to_json().unwrap();
        assert!(json.contains("\"vr_mode\":true"));
        assert_eq!(RehydrationState::from_json(&json).unwrap(), state);
    }

    #[test]
    fn test_merge_overwrites() {
        let mut a = RehydrationState::new().with_value("frame_number", 1u64);
        assert!(RehydrationState::new().is_empty());
        a.merge(RehydrationState::new().with_value("frame_number", 9u64));
        assert_eq!(a.get_value::<u64>("frame_number"), Some(9));
    }
}
