//! Histogram result model
//!
//! A `Histogram` is an ordered label → value mapping. Order is significant:
//! ranged histograms keep their predefined bin order and discrete-key
//! histograms keep discovery (or canonical key) order, so the result is a
//! vector of pairs rather than a hash map. A side index from label to
//! position keeps lookups and inserts constant-time while building large
//! discrete histograms. It serializes as a JSON-style map in bucket order.

use std::collections::HashMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered mapping from bucket label to bucket value
#[derive(Clone)]
pub struct Histogram<V = i64> {
    entries: Vec<(String, V)>,
    positions: HashMap<String, usize>,
}

impl<V> Default for Histogram<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<V: PartialEq> PartialEq for Histogram<V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<V: Eq> Eq for Histogram<V> {}

impl<V: fmt::Debug> fmt::Debug for Histogram<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("entries", &self.entries)
            .finish()
    }
}

impl<V> Histogram<V> {
    /// Create an empty histogram
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pairs; a repeated label keeps its first position and last value
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
    {
        let mut histogram = Self::new();
        for (label, value) in entries {
            histogram.insert(label, value);
        }
        histogram
    }

    /// Build from pairs whose labels are already known to be distinct
    pub(crate) fn from_distinct(entries: Vec<(String, V)>) -> Self {
        let mut histogram = Self {
            entries,
            positions: HashMap::new(),
        };
        histogram.reindex();
        histogram
    }

    fn reindex(&mut self) {
        self.positions.clear();
        self.positions.reserve(self.entries.len());
        for (pos, (label, _)) in self.entries.iter().enumerate() {
            self.positions.entry(label.clone()).or_insert(pos);
        }
    }

    /// Set a bucket, appending it if the label is new
    pub fn insert(&mut self, label: impl Into<String>, value: V) {
        let label = label.into();
        match self.positions.get(&label) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.positions.insert(label.clone(), self.entries.len());
                self.entries.push((label, value));
            },
        }
    }

    /// Value of a bucket
    pub fn get(&self, label: &str) -> Option<&V> {
        self.positions.get(label).map(|&pos| &self.entries[pos].1)
    }

    /// True if the bucket exists
    pub fn contains_key(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Remove a bucket, returning its value
    pub fn remove(&mut self, label: &str) -> Option<V> {
        let pos = self.positions.remove(label)?;
        let (_, value) = self.entries.remove(pos);
        for slot in self.positions.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(value)
    }

    /// Keep only buckets for which `keep` returns true, preserving order
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &V) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|(l, v)| keep(l, v));
        if self.entries.len() != before {
            self.reindex();
        }
    }

    /// Number of buckets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no buckets
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over (label, value) in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.entries.iter().map(|(l, v)| (l.as_str(), v))
    }

    /// Labels in order
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|(l, _)| l.as_str()).collect()
    }

    /// Consume into ordered pairs
    pub fn into_entries(self) -> Vec<(String, V)> {
        self.entries
    }
}

impl Histogram<i64> {
    /// Sum of every bucket value
    pub fn total(&self) -> i64 {
        self.entries
            .iter()
            .fold(0i64, |acc, (_, v)| acc.saturating_add(*v))
    }

    /// Values in order
    pub fn values(&self) -> Vec<i64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    /// Combine scalar histograms into one vector-valued histogram
    ///
    /// Column `i` of every bucket holds the value from `columns[i]`; labels
    /// missing from a column read 0. Labels appear in first-seen order
    /// across the columns.
    pub fn zip_columns(columns: &[Histogram<i64>]) -> Histogram<Vec<i64>> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut entries: Vec<(String, Vec<i64>)> = Vec::new();

        for (col, histogram) in columns.iter().enumerate() {
            for (label, value) in histogram.iter() {
                let pos = *positions.entry(label).or_insert_with(|| {
                    entries.push((label.to_string(), vec![0; columns.len()]));
                    entries.len() - 1
                });
                entries[pos].1[col] = *value;
            }
        }

        Histogram::from_distinct(entries)
    }
}

impl<V> IntoIterator for Histogram<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V, S: Into<String>> FromIterator<(S, V)> for Histogram<V> {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}

impl<V: Serialize> Serialize for Histogram<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}
