//! Insertion-ordered, case-insensitive maps for Object values

use crate::value::Value;
use ahash::AHashMap;

/// Map backing [`Value::Object`].
///
/// Keys are compared case-insensitively and iterate in first-insertion
/// order. Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default)]
pub struct ObjectMap {
    entries: Vec<(String, Value)>,
    /// Folded key -> position in `entries`
    index: AHashMap<String, usize>,
}

fn fold(key: &str) -> String {
    key.to_lowercase()
}

impl ObjectMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value for this key
    pub fn insert<K: Into<String>>(&mut self, key: K, value: Value) -> Option<Value> {
        let key = key.into();
        match self.index.get(&fold(&key)) {
            Some(&pos) => {
                let slot = &mut self.entries[pos];
                slot.0 = key;
                Some(std::mem::replace(&mut slot.1, value))
            }
            None => {
                self.index.insert(fold(&key), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Look up a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(&fold(key)).map(|&pos| &self.entries[pos].1)
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(&fold(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl PartialEq for ObjectMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).map_or(false, |o| o == v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ObjectMap {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut map = ObjectMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut map = ObjectMap::new();
        map.insert("Total", Value::from(10));

        assert_eq!(map.get("total"), Some(&Value::from(10)));
        assert_eq!(map.get("TOTAL"), Some(&Value::from(10)));
        assert!(map.contains_key("tOtAl"));
        assert!(map.get("other").is_none());
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut map = ObjectMap::new();
        map.insert("a", Value::from(1));
        map.insert("b", Value::from(2));
        let previous = map.insert("A", Value::from(3));

        assert_eq!(previous, Some(Value::from(1)));
        assert_eq!(map.len(), 2);
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["A", "b"]);
        assert_eq!(map.get("a"), Some(&Value::from(3)));
    }
}
