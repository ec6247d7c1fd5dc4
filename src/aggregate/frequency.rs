use crate::table::Value;
use serde::Serialize;
use std::collections::HashMap;

/// Value counts of a categorical column in first-encountered order.
///
/// Serializes as a list of `[value, count]` pairs.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Frequencies {
    entries: Vec<(Value, usize)>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Frequencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one occurrence of `value`.
    pub fn add(&mut self, value: &Value) {
        self.add_count(value, 1);
    }

    pub fn add_count(&mut self, value: &Value, count: usize) {
        let key = value.to_string();
        match self.index.get(&key) {
            Some(&position) => self.entries[position].1 += count,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((value.clone(), count));
            }
        }
    }

    /// Adds the counts of `other`; values new to `self` keep `other`'s order
    /// after the existing ones.
    pub fn merge(&mut self, other: &Frequencies) {
        for (value, count) in &other.entries {
            self.add_count(value, *count);
        }
    }

    /// Most frequent value, the earliest encountered on ties.
    pub fn mode(&self) -> Option<&Value> {
        let mut best: Option<&(Value, usize)> = None;
        for entry in &self.entries {
            if best.map_or(true, |(_, count)| entry.1 > *count) {
                best = Some(entry);
            }
        }
        best.map(|(value, _)| value)
    }

    pub fn distinct_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(Value, usize)] {
        &self.entries
    }
}

impl<'a> FromIterator<&'a Value> for Frequencies {
    fn from_iter<I: IntoIterator<Item = &'a Value>>(iter: I) -> Self {
        let mut frequencies = Frequencies::new();
        for value in iter {
            frequencies.add(value);
        }
        frequencies
    }
}
