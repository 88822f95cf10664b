use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Deserialize;
use url::form_urlencoded;

/// One form field: a single value or a repeated key.
///
/// Deserializes from a string or a sequence of strings, so JSON objects such
/// as `{"k": "v", "tags": ["a", "b"]}` map onto a [`Form`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    One(String),
    Many(Vec<String>),
}

impl FormValue {
    /// Every value in order; a single value is a one-element slice.
    pub fn values(&self) -> &[String] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }

    /// The value a one-per-key view keeps.
    pub fn first(&self) -> Option<&str> {
        self.values().first().map(String::as_str)
    }

    fn push(&mut self, value: String) {
        match self {
            Self::One(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Many(vec![first, value]);
            }
            Self::Many(values) => values.push(value),
        }
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_owned())
    }
}

impl From<Vec<String>> for FormValue {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

impl From<Vec<&str>> for FormValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_owned).collect())
    }
}

/// Ordered `application/x-www-form-urlencoded` mapping.
///
/// Keys keep insertion order; repeated keys are grouped under one entry.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: Vec<(String, FormValue)>,
    /// Key to position in `fields`.
    index: HashMap<String, usize>,
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.fields.iter().map(|(key, value)| (key, value)))
            .finish()
    }
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Form::append`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.append(key, value);
        self
    }

    /// Adds values under `key`, extending an existing entry.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<FormValue>) {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&position) => {
                let existing = &mut self.fields[position].1;
                for item in value.values() {
                    existing.push(item.clone());
                }
            }
            None => {
                self.index.insert(key.clone(), self.fields.len());
                self.fields.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&FormValue> {
        let &position = self.index.get(key)?;
        self.fields.get(position).map(|(_, value)| value)
    }

    /// First value under `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FormValue::first)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Percent-encodes into `k=v&k=v`, repeated keys expanded in order.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.fields {
            for item in value.values() {
                serializer.append_pair(key, item);
            }
        }
        serializer.finish()
    }

    /// Parses a query string, keeping every value of repeated keys.
    pub fn parse(input: &[u8]) -> Self {
        let mut form = Self::new();
        for (key, value) in form_urlencoded::parse(input) {
            form.append(key.into_owned(), value.into_owned());
        }
        form
    }

    /// Collapses to one value per key. The first value of a repeated key wins;
    /// later ones are dropped.
    pub fn to_first_values(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter_map(|(key, value)| Some((key.clone(), value.first()?.to_owned())))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Form
where
    K: Into<String>,
    V: Into<FormValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = Self::new();
        for (key, value) in iter {
            form.append(key, value);
        }
        form
    }
}

impl From<HashMap<String, String>> for Form {
    fn from(map: HashMap<String, String>) -> Self {
        let mut pairs: Vec<_> = map.into_iter().collect();
        pairs.sort();
        pairs.into_iter().collect()
    }
}

impl From<BTreeMap<String, String>> for Form {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<BTreeMap<String, Vec<String>>> for Form {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        map.into_iter().collect()
    }
}

impl From<BTreeMap<String, FormValue>> for Form {
    fn from(map: BTreeMap<String, FormValue>) -> Self {
        map.into_iter().collect()
    }
}
