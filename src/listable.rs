use std::fmt;
use std::ops::Deref;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A rule field that accepts either one value or a list of values.
///
/// `"port": 443` and `"port": [443]` decode to the same logical list and
/// compare equal. The wire form is remembered so that a bare scalar is
/// written back as a bare scalar.
#[derive(Clone)]
pub enum ListValue<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> ListValue<T> {
    pub fn new() -> Self {
        ListValue::Many(Vec::new())
    }

    pub fn one(value: T) -> Self {
        ListValue::One(value)
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            ListValue::One(value) => std::slice::from_ref(value),
            ListValue::Many(values) => values,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListValue::One(value) => vec![value],
            ListValue::Many(values) => values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<T> Default for ListValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for ListValue<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: PartialEq> PartialEq for ListValue<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for ListValue<T> {}

impl<T: fmt::Debug> fmt::Debug for ListValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T> From<Vec<T>> for ListValue<T> {
    fn from(values: Vec<T>) -> Self {
        ListValue::Many(values)
    }
}

impl From<&str> for ListValue<String> {
    fn from(value: &str) -> Self {
        ListValue::One(value.to_string())
    }
}

impl From<String> for ListValue<String> {
    fn from(value: String) -> Self {
        ListValue::One(value)
    }
}

impl From<u16> for ListValue<u16> {
    fn from(value: u16) -> Self {
        ListValue::One(value)
    }
}

impl<T> FromIterator<T> for ListValue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ListValue::Many(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a ListValue<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<T: Serialize> Serialize for ListValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ListValue::One(value) => value.serialize(serializer),
            ListValue::Many(values) => values.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for ListValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // null decodes as the empty list
        let value = match Value::deserialize(deserializer)? {
            Value::Null => ListValue::new(),
            values @ Value::Array(_) => {
                ListValue::Many(Vec::<T>::deserialize(values).map_err(D::Error::custom)?)
            }
            value => ListValue::One(T::deserialize(value).map_err(D::Error::custom)?),
        };
        Ok(value)
    }
}

/// Reads `null` as the type's zero value, like a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
