//! Indirect object pool
//!
//! Shared storage for indirect objects, keyed by object number and
//! generation. A slot is reserved the first time its key is referenced and
//! filled once when the object body is parsed, so forward references and
//! reference cycles resolve without shared ownership of the nodes.

use std::collections::HashMap;
use std::fmt;

use super::objects::CosObject;
use super::{ParseError, ParseResult};

/// Identity of an indirect object: object number plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub number: u32,
    pub generation: u16,
}

impl ObjectKey {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.generation)
    }
}

/// A contiguous run of object numbers, as recorded in a cross-reference
/// subsection header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefSegment {
    pub start: u32,
    pub count: u32,
}

/// The pool of indirect objects for one document.
///
/// Each slot is either reserved (referenced but not yet parsed) or filled.
/// Filling the same slot twice is an error; the first body wins the key.
#[derive(Debug, Default)]
pub struct ObjectPool {
    slots: HashMap<ObjectKey, Option<CosObject>>,
    xrefs: Vec<XrefSegment>,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for `key` if none exists yet.
    ///
    /// Called whenever an `N G R` reference is read, so that the identity
    /// exists before (or without) the object body being parsed.
    pub fn reserve(&mut self, key: ObjectKey) {
        self.slots.entry(key).or_insert(None);
    }

    /// Fill a slot with a parsed object body.
    pub fn fill(&mut self, key: ObjectKey, object: CosObject) -> ParseResult<()> {
        match self.slots.entry(key).or_insert(None) {
            slot @ None => {
                *slot = Some(object);
                Ok(())
            }
            Some(_) => Err(ParseError::DuplicateObject(key)),
        }
    }

    /// The parsed object for `key`, or `None` when the slot is absent or
    /// still unfilled.
    pub fn get(&self, key: ObjectKey) -> Option<&CosObject> {
        self.slots.get(&key).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, key: ObjectKey) -> Option<&mut CosObject> {
        self.slots.get_mut(&key).and_then(Option::as_mut)
    }

    /// Move the object out of its slot, leaving the slot reserved.
    ///
    /// Pairs with [`restore`](Self::restore); used when a caller needs to
    /// mutate an object while still resolving references through the pool.
    pub fn take(&mut self, key: ObjectKey) -> Option<CosObject> {
        self.slots.get_mut(&key).and_then(Option::take)
    }

    pub fn restore(&mut self, key: ObjectKey, object: CosObject) {
        self.slots.insert(key, Some(object));
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.slots.contains_key(&key)
    }

    /// Snapshot of every key in the pool, filled or not.
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.slots.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record a cross-reference subsection observed while parsing.
    pub fn add_xref(&mut self, start: u32, count: u32) {
        self.xrefs.push(XrefSegment { start, count });
    }

    pub fn xrefs(&self) -> &[XrefSegment] {
        &self.xrefs
    }
}
