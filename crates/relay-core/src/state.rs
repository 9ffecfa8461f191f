use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StateError, kind_of};

/// Key/value mapping shared through a [`Channel`](crate::Channel) or owned
/// locally by a [`Binding`](crate::Binding).
///
/// Stored states are never mutated in place: every transition produces a new
/// snapshot via [`State::merged`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(Map<String, Value>);

/// Partial state returned by a transition. Merged shallowly: each top-level
/// key overwrites the same key in the current state, other keys are kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Map<String, Value>);

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient constructor used by [`state!`](crate::state): a non-object
    /// value yields an empty mapping.
    pub fn from_object(value: Value) -> Self {
        Self::try_from(value).unwrap_or_else(|e| {
            log::warn!("State::from_object: {e}; using an empty state");
            Self::default()
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Deserializes one key. `None` when the key is missing or has another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.0.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&mut self, patch: Patch) {
        for (key, value) in patch.0 {
            self.0.insert(key, value);
        }
    }

    pub fn merged(&self, patch: Patch) -> State {
        let mut next = self.clone();
        next.merge(patch);
        next
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("{}"),
        }
    }
}

impl TryFrom<Value> for State {
    type Error = StateError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StateError::NotAnObject {
                found: kind_of(&other),
            }),
        }
    }
}

impl From<Map<String, Value>> for State {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for State {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient constructor used by [`patch!`](crate::patch).
    pub fn from_object(value: Value) -> Self {
        Self::try_from(value).unwrap_or_else(|e| {
            log::warn!("Patch::from_object: {e}; using an empty patch");
            Self::default()
        })
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for Patch {
    type Error = StateError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        State::try_from(value).map(Patch::from)
    }
}

impl From<State> for Patch {
    fn from(state: State) -> Self {
        Self(state.0)
    }
}

impl FromIterator<(String, Value)> for Patch {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Builds a [`State`] from JSON-like syntax.
///
/// ```rust
/// let s = relay_core::state!({ "count": 0, "data": [] });
/// assert_eq!(s.get_as::<i64>("count"), Some(0));
/// ```
#[macro_export]
macro_rules! state {
    ($($json:tt)+) => {
        $crate::State::from_object($crate::json!($($json)+))
    };
}

/// Builds a [`Patch`] from JSON-like syntax.
#[macro_export]
macro_rules! patch {
    ($($json:tt)+) => {
        $crate::Patch::from_object($crate::json!($($json)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_shallow() {
        let mut s = crate::state!({ "count": 0, "user": { "name": "a", "age": 3 } });
        s.merge(crate::patch!({ "user": { "name": "b" } }));

        assert_eq!(s.get_as::<i64>("count"), Some(0));
        assert_eq!(s.get("user"), Some(&json!({ "name": "b" })));
    }

    #[test]
    fn merged_leaves_original_untouched() {
        let s = crate::state!({ "count": 1 });
        let next = s.merged(Patch::new().set("count", 2).set("flag", true));

        assert_eq!(s.get_as::<i64>("count"), Some(1));
        assert_eq!(next.get_as::<i64>("count"), Some(2));
        assert_eq!(next.get_as::<bool>("flag"), Some(true));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = State::try_from(json!([1, 2])).unwrap_err();
        assert_eq!(err, StateError::NotAnObject { found: "an array" });
        assert_eq!(
            err.to_string(),
            "expected a JSON object for state, found an array"
        );

        assert!(State::from_object(json!(3)).is_empty());
        assert!(Patch::from_object(json!("x")).is_empty());
    }

    #[test]
    fn display_is_compact_json() {
        let s = crate::state!({ "data": [] });
        assert_eq!(s.to_string(), r#"{"data":[]}"#);
    }
}
