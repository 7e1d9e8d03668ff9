//! Property projection: turns any [`Record`] into an ordered [`PropertySet`] of
//! normalized field names and backend-ready scalar values.
//!
//! Records describe their own fields through [`Record::fields`], which the
//! [`graph_node!`](crate::graph_node) and [`graph_relation!`](crate::graph_relation)
//! macros generate, so no runtime type inspection is involved.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw field value as declared on an entity, before coercion.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    TextList(Vec<String>),
}

/// Scalar value stored on a node or relation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::Text(value) => serde_json::Value::String(value.clone()),
            PropertyValue::Integer(value) => serde_json::Value::from(*value),
            PropertyValue::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PropertyValue::Boolean(value) => serde_json::Value::Bool(*value),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

/// Ordered mapping of normalized property name to value. Order follows the
/// declaration order of the source fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertySet {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `name`, keeping the original position on replace.
    pub fn insert<K: Into<String>, V: Into<PropertyValue>>(&mut self, name: K, value: V) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let idx = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    /// Rebuilds a set from a stored JSON object. Nulls, arrays and nested objects are skipped.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut set = PropertySet::new();
        if let serde_json::Value::Object(map) = value {
            for (key, item) in map {
                let value = match item {
                    serde_json::Value::String(text) => PropertyValue::Text(text.clone()),
                    serde_json::Value::Bool(flag) => PropertyValue::Boolean(*flag),
                    serde_json::Value::Number(number) => match number.as_i64() {
                        Some(int) => PropertyValue::Integer(int),
                        None => match number.as_f64() {
                            Some(float) => PropertyValue::Float(float),
                            None => continue,
                        },
                    },
                    _ => continue,
                };
                set.insert(key.clone(), value);
            }
        }
        set
    }
}

impl<'a> IntoIterator for &'a PropertySet {
    type Item = &'a (String, PropertyValue);
    type IntoIter = std::slice::Iter<'a, (String, PropertyValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A record that can enumerate its declared fields in declaration order.
pub trait Record {
    fn fields(&self) -> Vec<(&'static str, FieldValue)>;
}

impl<R: Record + ?Sized> Record for Box<R> {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        (**self).fields()
    }
}

/// Conversion from a field's Rust type into a [`FieldValue`].
pub trait AsFieldValue {
    fn as_field_value(&self) -> FieldValue;
}

impl AsFieldValue for String {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }
}

impl AsFieldValue for str {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::Text(self.to_string())
    }
}

impl AsFieldValue for &str {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::Text((*self).to_string())
    }
}

macro_rules! integer_field_value {
    ($($ty:ty),*) => {
        $(
            impl AsFieldValue for $ty {
                fn as_field_value(&self) -> FieldValue {
                    FieldValue::Integer(i64::from(*self))
                }
            }
        )*
    };
}

integer_field_value!(i8, i16, i32, i64, u8, u16, u32);

impl AsFieldValue for f32 {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::Float(f64::from(*self))
    }
}

impl AsFieldValue for f64 {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::Float(*self)
    }
}

impl AsFieldValue for bool {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::Boolean(*self)
    }
}

impl AsFieldValue for NaiveDate {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::Date(*self)
    }
}

impl AsFieldValue for NaiveDateTime {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::DateTime(*self)
    }
}

impl<Tz: TimeZone> AsFieldValue for DateTime<Tz> {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::DateTime(self.naive_local())
    }
}

impl AsFieldValue for Vec<String> {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::TextList(self.clone())
    }
}

impl AsFieldValue for Vec<&str> {
    fn as_field_value(&self) -> FieldValue {
        FieldValue::TextList(self.iter().map(|item| item.to_string()).collect())
    }
}

impl<T: AsFieldValue> AsFieldValue for Option<T> {
    fn as_field_value(&self) -> FieldValue {
        match self {
            Some(value) => value.as_field_value(),
            None => FieldValue::Null,
        }
    }
}

impl AsFieldValue for FieldValue {
    fn as_field_value(&self) -> FieldValue {
        self.clone()
    }
}

/// Applies the coercion rules. `None` means the property is omitted.
pub fn coerce(value: FieldValue) -> Option<PropertyValue> {
    match value {
        FieldValue::Null => None,
        FieldValue::Text(text) => Some(PropertyValue::Text(text)),
        FieldValue::Integer(int) => Some(PropertyValue::Integer(int)),
        FieldValue::Float(float) => Some(PropertyValue::Float(float)),
        FieldValue::Boolean(flag) => Some(PropertyValue::Boolean(flag)),
        FieldValue::Date(date) => Some(PropertyValue::Text(date.format(DATE_FORMAT).to_string())),
        FieldValue::DateTime(stamp) => Some(PropertyValue::Text(
            stamp.date().format(DATE_FORMAT).to_string(),
        )),
        FieldValue::TextList(items) => Some(PropertyValue::Text(items.join(","))),
    }
}

/// Projects a record into its property set.
pub fn project<R: Record + ?Sized>(record: &R) -> PropertySet {
    let mut set = PropertySet::new();
    for (name, value) in record.fields() {
        if let Some(value) = coerce(value) {
            set.insert(normalize_field_name(name), value);
        }
    }
    set
}

/// Normalizes a declared field name to the stored property name.
///
/// The first character is lower-cased and the rest is kept (`TmdbId` becomes
/// `tmdbId`). A Rust snake-case word break, an underscore followed by a
/// lower-case letter, is folded into camel case so the field `tmdb_id` and the
/// declared name `TmdbId` agree. Leading underscores and any other underscore
/// are kept as written (`Birth_Place` becomes `birth_Place`).
pub fn normalize_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(&'_') = chars.peek() {
        out.push('_');
        chars.next();
    }
    if let Some(first) = chars.next() {
        out.extend(first.to_lowercase());
    }
    while let Some(ch) = chars.next() {
        match (ch, chars.peek()) {
            ('_', Some(next)) if next.is_ascii_lowercase() => {
                let upper = next.to_ascii_uppercase();
                chars.next();
                out.push(upper);
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_pascal_and_snake_names_alike() {
        assert_eq!(normalize_field_name("TmdbId"), "tmdbId");
        assert_eq!(normalize_field_name("tmdb_id"), "tmdbId");
        assert_eq!(normalize_field_name("tmdbId"), "tmdbId");
        assert_eq!(normalize_field_name("Name"), "name");
        assert_eq!(normalize_field_name("IMDB"), "iMDB");
        assert_eq!(normalize_field_name(""), "");
    }

    #[test]
    fn keeps_underscores_that_are_not_snake_case_breaks() {
        assert_eq!(normalize_field_name("Birth_Place"), "birth_Place");
        assert_eq!(normalize_field_name("_private"), "_private");
        assert_eq!(normalize_field_name("__Hidden"), "__hidden");
        assert_eq!(normalize_field_name("release_2024"), "release_2024");
        assert_eq!(normalize_field_name("trailing_"), "trailing_");
    }

    #[test]
    fn replace_keeps_position() {
        let mut set = PropertySet::new();
        set.insert("a", 1i64);
        set.insert("b", 2i64);
        set.insert("a", 3i64);
        let keys: Vec<&str> = set.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(set.get("a"), Some(&PropertyValue::Integer(3)));
    }
}
