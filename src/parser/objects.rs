//! COS value nodes
//!
//! The typed object model produced by the parser. Containers hold their
//! children inline; cross-object edges are [`ObjectKey`] references
//! resolved through the [`ObjectPool`](super::pool::ObjectPool), which is
//! how cyclic graphs are representable without shared ownership.

use super::pool::ObjectKey;
pub use super::stream::CosStream;

/// A name object (e.g. `/Type`), an interned text token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CosName(pub String);

impl CosName {
    pub fn new(name: impl Into<String>) -> Self {
        CosName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A string object: a raw byte sequence, not necessarily valid text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosString(pub Vec<u8>);

impl CosString {
    pub fn new(data: Vec<u8>) -> Self {
        CosString(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// An array object: an ordered sequence of value nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CosArray(pub Vec<CosObject>);

impl CosArray {
    pub fn new() -> Self {
        CosArray(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CosObject> {
        self.0.get(index)
    }

    pub fn push(&mut self, obj: CosObject) {
        self.0.push(obj);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CosObject> {
        self.0.iter()
    }
}

/// A dictionary object.
///
/// Lookup is by name; insertion order is preserved so a later writer can
/// re-emit entries in the order they were read. Dictionaries are small in
/// practice, so lookup is a linear scan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CosDictionary {
    entries: Vec<(CosName, CosObject)>,
}

impl CosDictionary {
    pub fn new() -> Self {
        CosDictionary {
            entries: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CosObject> {
        self.entries
            .iter()
            .find(|(name, _)| name.0 == key)
            .map(|(_, value)| value)
    }

    /// Insert a key/value pair, replacing any existing entry in place.
    pub fn insert(&mut self, key: CosName, value: CosObject) {
        if let Some(slot) = self.entries.iter_mut().find(|(name, _)| *name == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CosName, &CosObject)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut CosObject> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    /// The value of the `/Type` entry, when present and a name.
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type").and_then(|obj| obj.as_name()).map(CosName::as_str)
    }
}

/// A COS value node.
#[derive(Debug, Clone, PartialEq)]
pub enum CosObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(CosString),
    Name(CosName),
    Array(CosArray),
    Dictionary(CosDictionary),
    Stream(CosStream),
    /// An indirect reference, resolved through the object pool.
    Reference(ObjectKey),
}

impl CosObject {
    pub fn is_null(&self) -> bool {
        matches!(self, CosObject::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CosObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CosObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            CosObject::Real(r) => Some(*r),
            CosObject::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&CosString> {
        match self {
            CosObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&CosName> {
        match self {
            CosObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&CosArray> {
        match self {
            CosObject::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Dictionary view: also reaches through to a stream's dictionary.
    pub fn as_dict(&self) -> Option<&CosDictionary> {
        match self {
            CosObject::Dictionary(d) => Some(d),
            CosObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&CosStream> {
        match self {
            CosObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectKey> {
        match self {
            CosObject::Reference(key) => Some(*key),
            _ => None,
        }
    }
}
