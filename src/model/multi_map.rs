//! Case-insensitive multi-valued map.
//!
//! # Responsibilities
//! - Map one key to an ordered list of values (headers, query parameters,
//!   stage variables)
//! - Compare keys case-insensitively while remembering the first casing seen
//!
//! # Design Decisions
//! - Backed by a `BTreeMap`, so keys iterate in case-insensitive order
//! - Value order within a key is insertion order
//! - `PartialEq` is order-sensitive; `equals_ignoring_value_order` is the
//!   relaxed comparison

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Multi-valued map used for HTTP headers.
pub type Headers = MultiValueMap<String>;

/// A map key that orders and compares without regard to case.
#[derive(Debug, Clone)]
struct CaseInsensitiveKey(String);

impl CaseInsensitiveKey {
    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars().flat_map(char::to_lowercase)
    }
}

impl PartialEq for CaseInsensitiveKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CaseInsensitiveKey {}

impl PartialOrd for CaseInsensitiveKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CaseInsensitiveKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

/// Ordered, case-insensitive, multi-valued map.
#[derive(Debug, Clone)]
pub struct MultiValueMap<V> {
    entries: BTreeMap<CaseInsensitiveKey, Vec<V>>,
}

impl<V> Default for MultiValueMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MultiValueMap<V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    fn key(key: &str) -> CaseInsensitiveKey {
        CaseInsensitiveKey(key.to_string())
    }

    /// Append a value to the sequence for `key`.
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        self.entries
            .entry(CaseInsensitiveKey(key.into()))
            .or_default()
            .push(value);
    }

    /// Append every value, in order.
    pub fn add_all(&mut self, key: impl Into<String>, values: impl IntoIterator<Item = V>) {
        self.entries
            .entry(CaseInsensitiveKey(key.into()))
            .or_default()
            .extend(values);
    }

    /// Insert a value at the front of the sequence for `key`.
    pub fn add_first(&mut self, key: impl Into<String>, value: V) {
        self.entries
            .entry(CaseInsensitiveKey(key.into()))
            .or_default()
            .insert(0, value);
    }

    /// Replace the whole sequence for `key` with a single value.
    pub fn put_single(&mut self, key: impl Into<String>, value: V) {
        let values = self.entries.entry(CaseInsensitiveKey(key.into())).or_default();
        values.clear();
        values.push(value);
    }

    /// Replace the whole sequence for `key`, returning the previous one.
    pub fn put(&mut self, key: impl Into<String>, values: Vec<V>) -> Option<Vec<V>> {
        let key = CaseInsensitiveKey(key.into());
        let previous = self.entries.remove(&key);
        self.entries.insert(key, values);
        previous
    }

    pub fn get(&self, key: &str) -> Option<&[V]> {
        self.entries.get(&Self::key(key)).map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Vec<V>> {
        self.entries.get_mut(&Self::key(key))
    }

    /// First value for `key`, if any.
    pub fn get_first(&self, key: &str) -> Option<&V> {
        self.get(key).and_then(|values| values.first())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&Self::key(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<V>> {
        self.entries.remove(&Self::key(key))
    }

    /// Keys in case-insensitive order, with the casing of their first insertion.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.0.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[V])> {
        self.entries.iter().map(|(k, v)| (k.0.as_str(), v.as_slice()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<V: PartialEq> MultiValueMap<V> {
    /// Same keys, and for each key the same number of values with every value
    /// of `self` present in `other`, regardless of position.
    pub fn equals_ignoring_value_order(&self, other: &Self) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        self.entries.iter().all(|(key, values)| match other.entries.get(key) {
            Some(theirs) => {
                values.len() == theirs.len() && values.iter().all(|v| theirs.contains(v))
            }
            None => false,
        })
    }
}

impl<V: PartialEq> PartialEq for MultiValueMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<V: Eq> Eq for MultiValueMap<V> {}

impl<V: fmt::Display> fmt::Display for MultiValueMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (key, values) in self.iter() {
            for value in values {
                write!(f, ",{}={}", key, value)?;
            }
        }
        write!(f, "]")
    }
}

impl<K: Into<String>> From<HashMap<K, String>> for MultiValueMap<String> {
    fn from(map: HashMap<K, String>) -> Self {
        let mut out = Self::new();
        for (k, v) in map {
            out.add(k, v);
        }
        out
    }
}

impl<K: Into<String>, V> Extend<(K, V)> for MultiValueMap<V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.add(k, v);
        }
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for MultiValueMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Self::new();
        out.extend(iter);
        out
    }
}

impl<V: Serialize> Serialize for MultiValueMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, values) in self.iter() {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for MultiValueMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Keys differing only in case are merged, in case-sensitive key order.
        let raw: BTreeMap<String, Option<Vec<V>>> = BTreeMap::deserialize(deserializer)?;
        let mut out = Self::new();
        for (key, values) in raw {
            out.add_all(key, values.unwrap_or_default());
        }
        Ok(out)
    }
}
