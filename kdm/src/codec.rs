//! Core entity traits and the contexts threaded through a build or a parse.
//!
//! Pointers are resolved in two phases. While building, every pointer writes a placeholder word
//! and defers a [Target]; once the last section is written, [BuildContext::resolve] patches each
//! placeholder with the offset its target was written at. While parsing, every pointer records
//! the raw word it read; once all sections are read, the container walks its entities and each
//! [Pointer] dereferences itself against the strings and arrays found in the file.

use crate::{
    arena::{Arena, ArrayId, ArrayInfo},
    cursor::{Reader, Writer},
    error::InvalidState,
    Error,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A value that occupies a region of a container.
pub trait Entity {
    /// The number of bytes `write()` produces for the current value.
    fn encode_size(&self) -> usize;

    /// Writes the entity at the current position of `buf`.
    fn write(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error>;

    /// Reads the entity from the current position of `buf`, replacing the current value.
    fn read(&mut self, buf: &mut Reader<'_>, ctx: &mut ParseContext) -> Result<(), Error>;

    /// Converts the entity into its plain representation.
    fn get(&self, arena: &Arena) -> Value;

    /// Replaces the current value with the plain representation `value`.
    ///
    /// Nothing is modified if `value` is rejected.
    fn set(&mut self, value: &Value, arena: &mut Arena) -> Result<(), InvalidState>;

    /// Checks that `value` could be given to `set()`.
    fn validate(&self, value: &Value) -> Result<(), InvalidState>;

    /// Strings this entity references and that must be present in the string section.
    fn strings(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Calls `visit` on every pointer owned by this entity.
    fn visit_pointers_mut(
        &mut self,
        _visit: &mut dyn FnMut(&mut dyn Pointer) -> Result<(), Error>,
    ) -> Result<(), Error> {
        Ok(())
    }
}

/// An entity whose on-disk value is an offset to another region of the container.
pub trait Pointer {
    /// The word read from the file. Zero is the null pointer.
    fn raw(&self) -> u32;

    /// Replaces the raw word with the value it points to.
    fn dereference(&mut self, ctx: &ParseContext) -> Result<(), Error>;
}

/// What a deferred pointer should point to once the container is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    String(Option<String>),
    Array(Option<ArrayId>),
}

impl Target {
    fn resolve(&self, ctx: &BuildContext) -> Result<u32, Error> {
        match self {
            Self::String(None) | Self::Array(None) => Ok(0),
            Self::String(Some(value)) => ctx
                .strings
                .get(value)
                .copied()
                .ok_or_else(|| Error::UnregisteredString(value.clone())),
            Self::Array(Some(id)) => ctx
                .arrays
                .get(id)
                .copied()
                .ok_or(Error::UnknownArray(*id)),
        }
    }
}

/// State collected while writing a container.
#[derive(Debug, Default)]
pub struct BuildContext {
    strings: HashMap<String, u32>,
    arrays: HashMap<ArrayId, u32>,
    pointers: Vec<(usize, Target)>,
}

impl BuildContext {
    /// Records that `value` was written at `offset`.
    pub fn register_string(&mut self, value: &str, offset: usize) {
        self.strings.insert(value.to_owned(), offset as u32);
    }

    /// Records that the first element of `id` was written at `offset`.
    pub fn register_array(&mut self, id: ArrayId, offset: usize) {
        self.arrays.insert(id, offset as u32);
    }

    /// Defers the word at `offset` until every target has been written.
    pub fn defer(&mut self, offset: usize, target: Target) {
        self.pointers.push((offset, target));
    }

    pub fn deferred(&self) -> usize {
        self.pointers.len()
    }

    /// Patches every deferred pointer with the offset of its target.
    pub fn resolve(&mut self, buf: &mut Writer) -> Result<(), Error> {
        for (offset, target) in &self.pointers {
            let value = target.resolve(self)?;
            buf.patch_u32(*offset, value);
        }
        self.pointers.clear();
        Ok(())
    }
}

/// State collected while reading a container.
#[derive(Debug, Default)]
pub struct ParseContext {
    strings: BTreeMap<u32, String>,
    arrays: HashMap<u32, ArrayInfo>,
    pointers: BTreeMap<usize, u32>,
}

impl ParseContext {
    /// Records that `value` was read at `offset`.
    pub fn register_string(&mut self, offset: usize, value: String) {
        self.strings.insert(offset as u32, value);
    }

    /// Records that the first element of an array was read at `offset`.
    pub fn register_array(&mut self, offset: usize, info: ArrayInfo) {
        self.arrays.insert(offset as u32, info);
    }

    /// Records that a pointer holding `raw` was read at `offset`.
    pub fn record_pointer(&mut self, offset: usize, raw: u32) {
        self.pointers.insert(offset, raw);
    }

    pub fn string(&self, offset: u32) -> Option<&str> {
        self.strings.get(&offset).map(String::as_str)
    }

    pub fn array(&self, offset: u32) -> Option<&ArrayInfo> {
        self.arrays.get(&offset)
    }

    /// Strings in the order they appear in the file.
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.strings.values().map(String::as_str)
    }

    /// The number of pointers read so far.
    pub fn pointers(&self) -> usize {
        self.pointers.len()
    }
}
