//! Message definition
//!
//! A flat mapping of keys to typed values that remembers insertion order,
//! so encoding is deterministic for a given sequence of inserts.

use std::collections::HashMap;
use std::fmt;

use super::Value;

/// A flat key/value message
#[derive(Debug, Clone, Default)]
pub struct Message {
    fields: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Chaining form of [`Message::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a field.
    ///
    /// An existing key keeps its position and has its value replaced; the
    /// previous value is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key).copied() {
            Some(pos) => Some(std::mem::replace(&mut self.fields[pos].1, value)),
            None => {
                self.index.insert(key.clone(), self.fields.len());
                self.fields.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&pos| &self.fields[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.index.remove(key)?;
        let (_, value) = self.fields.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

// Content equality: order of insertion does not matter.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for Message {}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Message {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut message = Message::new();
        message.extend(iter);
        message
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Message {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl IntoIterator for Message {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key:?}: {}({value})", value.type_code())?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut msg = Message::new().with("a", 1i64).with("b", "two");
        let old = msg.insert("a", 3u64);

        assert_eq!(old, Some(Value::Int64(1)));
        assert_eq!(msg.len(), 2);
        assert_eq!(msg.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(msg.get("a"), Some(&Value::UInt64(3)));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut msg: Message = [("x", 1i64), ("y", 2), ("z", 3)].into_iter().collect();
        assert_eq!(msg.remove("y"), Some(Value::Int64(2)));
        assert_eq!(msg.remove("y"), None);
        assert_eq!(msg.keys().collect::<Vec<_>>(), vec!["x", "z"]);
        assert_eq!(msg.get("z"), Some(&Value::Int64(3)));
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = Message::new().with("age", 30i64).with("name", "Alice");
        let b = Message::new().with("name", "Alice").with("age", 30i64);
        let c = Message::new().with("name", "Alice");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(c, a);
    }

    #[test]
    fn test_display() {
        let msg = Message::new().with("age", 30i64).with("tag", vec![0xABu8]);
        assert_eq!(msg.to_string(), r#"{"age": int64(30), "tag": binary(0xab)}"#);
    }
}
