//! Format-neutral document model.
//!
//! Every reader produces a [`Value`] and every writer consumes one, so adding
//! a format means one reader and one writer instead of a converter per pair.
//! Records are ordered lists of pairs (duplicate keys allowed) because XML
//! siblings and CSV headers can legally repeat.
use std::cell::Cell;
use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, EnumAccess, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Reserved Record key holding XML attributes.
pub const ATTRIBUTES_KEY: &str = "@attributes";
/// Reserved Record key holding XML character data of a mixed element.
pub const TEXT_KEY: &str = "#text";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Integer(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Self::Integer(_) => true,
            Self::Float(f) => f.is_finite(),
        }
    }
}

/// Canonical text form. Floats always keep a fractional part or exponent so
/// they never read back as integers.
impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

/// Ordered key/value pairs. Lookups return the first matching pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.entries
            .iter()
            .filter(move |(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_duplicate_keys(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .any(|(idx, (key, _))| self.entries[..idx].iter().any(|(seen, _)| seen == key))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a (String, Value);
    type IntoIter = std::slice::Iter<'a, (String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Sequence(_) | Self::Record(_))
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Nesting depth; scalars are 0, `[]` and `{}` are 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::Sequence(items) => 1 + items.iter().map(Value::depth).max().unwrap_or(0),
            Self::Record(record) => 1 + record.iter().map(|(_, v)| v.depth()).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Text of a scalar as it appears in a table cell or XML text node.
    /// Returns `None` for containers.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Null => Some(String::new()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Number(n) => Some(n.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Sequence(_) | Self::Record(_) => None,
        }
    }

    /// Rewrites XML-specific markup for formats without attributes: the
    /// `@attributes` record becomes `@name` sibling keys and repeated sibling
    /// keys are grouped into a sequence at the first occurrence.
    pub fn lower_markup(self) -> Value {
        match self {
            Self::Record(record) => {
                let mut lifted: Vec<(String, Value)> = Vec::with_capacity(record.len());
                for (key, value) in record {
                    match value {
                        Self::Record(attrs) if key == ATTRIBUTES_KEY => {
                            for (name, attr) in attrs {
                                lifted.push((format!("@{name}"), attr.lower_markup()));
                            }
                        }
                        other => lifted.push((key, other.lower_markup())),
                    }
                }
                Self::Record(group_repeated(lifted))
            }
            Self::Sequence(items) => {
                Self::Sequence(items.into_iter().map(Value::lower_markup).collect())
            }
            scalar => scalar,
        }
    }
}

fn group_repeated(pairs: Vec<(String, Value)>) -> Record {
    let mut grouped: Vec<(String, Vec<Value>)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        match grouped.iter_mut().find(|(name, _)| *name == key) {
            Some((_, values)) => values.push(value),
            None => grouped.push((key, vec![value])),
        }
    }
    grouped
        .into_iter()
        .map(|(key, mut values)| {
            if values.len() == 1 {
                let single = values.pop().unwrap_or(Value::Null);
                (key, single)
            } else {
                (key, Value::Sequence(values))
            }
        })
        .collect()
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::String(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::String(text)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(Number::Integer(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(Number::Float(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Number(Number::Integer(i)) => serializer.serialize_i64(*i),
            Self::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Record(record) => {
                let mut map = serializer.serialize_map(Some(record.len()))?;
                for (key, value) in record {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Why a seeded deserialization was aborted by the model rather than by the
/// underlying parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trip {
    Depth,
    ComplexKey,
    Tagged,
}

/// Shared state for one seeded deserialization: the nesting limit and the
/// reason the model rejected the input, if it did.
pub(crate) struct DepthGuard {
    limit: usize,
    tripped: Cell<Option<Trip>>,
}

impl DepthGuard {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            tripped: Cell::new(None),
        }
    }

    pub(crate) fn tripped(&self) -> Option<Trip> {
        self.tripped.get()
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    pub(crate) fn seed(&self) -> ValueSeed<'_> {
        ValueSeed {
            guard: self,
            depth: 0,
        }
    }

    fn trip<E: de::Error>(&self, trip: Trip, message: &str) -> E {
        self.tripped.set(Some(trip));
        E::custom(message)
    }
}

/// Deserializes any self-describing input into a [`Value`], keeping map
/// entries in order (duplicates included) and bounding nesting depth.
#[derive(Clone, Copy)]
pub(crate) struct ValueSeed<'g> {
    guard: &'g DepthGuard,
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for ValueSeed<'_> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl ValueSeed<'_> {
    fn nested<E: de::Error>(self) -> Result<Self, E> {
        let depth = self.depth + 1;
        if depth > self.guard.limit {
            return Err(self.guard.trip(Trip::Depth, "nesting depth exceeded"));
        }
        Ok(Self {
            guard: self.guard,
            depth,
        })
    }
}

impl<'de> Visitor<'de> for ValueSeed<'_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any document value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(Number::Integer(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => Value::Number(Number::Integer(i)),
            Err(_) => Value::Number(Number::Float(v as f64)),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(Number::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let child = self.nested::<A::Error>()?;
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(1024));
        while let Some(item) = seq.next_element_seed(child)? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let child = self.nested::<A::Error>()?;
        let mut record = Record::with_capacity(map.size_hint().unwrap_or(0).min(1024));
        while let Some(key) = map.next_key_seed(KeySeed { guard: self.guard })? {
            let value = map.next_value_seed(child)?;
            record.push(key, value);
        }
        Ok(Value::Record(record))
    }

    fn visit_enum<A: EnumAccess<'de>>(self, _data: A) -> Result<Value, A::Error> {
        Err(self.guard.trip(Trip::Tagged, "tagged values are not supported"))
    }
}

/// Accepts scalar map keys and renders them as strings.
struct KeySeed<'g> {
    guard: &'g DepthGuard,
}

impl<'de> DeserializeSeed<'de> for KeySeed<'_> {
    type Value = String;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<String, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for KeySeed<'_> {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar mapping key")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
        Ok(Number::Float(v).to_string())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_unit<E: de::Error>(self) -> Result<String, E> {
        Ok("null".to_string())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, _seq: A) -> Result<String, A::Error> {
        Err(self.guard.trip(Trip::ComplexKey, "complex mapping keys are not supported"))
    }

    fn visit_map<A: MapAccess<'de>>(self, _map: A) -> Result<String, A::Error> {
        Err(self.guard.trip(Trip::ComplexKey, "complex mapping keys are not supported"))
    }

    fn visit_enum<A: EnumAccess<'de>>(self, _data: A) -> Result<String, A::Error> {
        Err(self.guard.trip(Trip::Tagged, "tagged values are not supported"))
    }
}
