//! The container: a header followed by eight sections.
//!
//! # Format
//!
//! ```text
//! +--------+-----------------------------------------------+
//! | header | magic (8) | start of each section in words (8x4) |
//! +--------+-----------------------------------------------+
//! | 0      | count | strings, NUL-terminated, word-padded  |
//! | 1, 2   | 0                                             |
//! | 3      | count | parameters                            |
//! | 4      | count | struct definitions, by type id        |
//! | 5      | count | arrays                                |
//! | 6      | count | table names | table arrays            |
//! | 7      | 0                                             |
//! +--------+-----------------------------------------------+
//! ```
//!
//! Every parameter and struct definition carries an integrity slot derived from a per-container
//! constant, the offset of the slot and the size of the record. The last record of each of
//! these sections has a zero slot.

use crate::{
    arena::{Arena, ArrayId, ArrayInfo},
    codec::{BuildContext, Entity, ParseContext, Pointer},
    config::Config,
    cursor::{Reader, Writer},
    error::InvalidState,
    header::{SectionOffsets, HEADER_SIZE, SECTION_COUNT},
    registry::Registry,
    types::{
        parameter::Parameter,
        pointer::StringPointer,
        string::{encoded_len, KdmString},
        AnyEntity, Kind,
    },
    Error,
};
use bytes::Bytes;
use indexmap::IndexSet;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, trace};

const STRINGS: usize = 0;
const PARAMETERS: usize = 3;
const STRUCTS: usize = 4;
const ARRAYS: usize = 5;
const TABLES: usize = 6;
const END: usize = 7;

/// Symbol and type id preceding each parameter.
const PARAMETER_HEADER: usize = 4;

/// Type id, field count, zero word and slot preceding the field type ids of a definition.
const STRUCT_HEADER: usize = 12;

/// Symbol, size in words, type id and size again preceding the elements of an array.
const ARRAY_HEADER: usize = 8;

/// A named array of entities.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    name: StringPointer,
    entries: Vec<AnyEntity>,
    symbol: Option<u16>,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Self {
            name: StringPointer::new(name),
            entries: Vec::new(),
            symbol: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.value()
    }

    pub fn entries(&self) -> &[AnyEntity] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Vec<AnyEntity> {
        &mut self.entries
    }

    pub fn symbol(&self) -> Option<u16> {
        self.symbol
    }

    pub fn set_symbol(&mut self, symbol: Option<u16>) {
        self.symbol = symbol;
    }
}

/// What a symbol identifies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    Struct(u16),
    Array(ArrayId),
    Table(usize),
    Parameter(usize),
}

/// The slot stored for a record of `size` bytes whose slot is at `offset`.
fn slot(constant: u32, offset: usize, size: usize) -> u32 {
    constant
        .wrapping_add(offset as u32)
        .wrapping_add(size as u32)
}

/// Inverse of [slot].
fn constant(slot: u32, offset: usize, size: usize) -> u32 {
    slot.wrapping_sub(offset as u32).wrapping_sub(size as u32)
}

/// Checks a slot read from the file against the constant derived from earlier records.
fn verify_slot(
    expected: &mut Option<u32>,
    last: bool,
    found: u32,
    offset: usize,
    size: usize,
) -> Result<(), Error> {
    if last {
        if found != 0 {
            return Err(Error::InvalidTerminalSlot { offset, found });
        }
        return Ok(());
    }
    let found = constant(found, offset, size);
    match *expected {
        None => *expected = Some(found),
        Some(expected) if expected != found => {
            return Err(Error::InvalidConstant { found, expected });
        }
        Some(_) => {}
    }
    Ok(())
}

fn count(len: usize, what: &'static str) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| Error::InvalidLength {
        what,
        found: len,
        max: u32::MAX as usize,
    })
}

fn elements_size(elements: &[AnyEntity]) -> usize {
    elements.iter().map(Entity::encode_size).sum()
}

fn expect_end(buf: &Reader<'_>, sections: &SectionOffsets, section: usize) -> Result<(), Error> {
    if buf.position() != sections.end(section) {
        return Err(Error::MalformedFile {
            offset: buf.position(),
            reason: "section does not end where the next one starts",
        });
    }
    Ok(())
}

fn read_reserved(buf: &mut Reader<'_>) -> Result<(), Error> {
    let offset = buf.position();
    if buf.read_u32()? != 0 {
        return Err(Error::MalformedFile {
            offset,
            reason: "reserved section is not zero",
        });
    }
    Ok(())
}

/// A container: the declared parameters, tables and struct types, plus the document held in
/// them.
#[derive(Clone, Debug, PartialEq)]
pub struct Kdm {
    registry: Registry,
    parameters: Vec<Parameter>,
    tables: Vec<Table>,
    arrays: Arena,
    strings: IndexSet<String>,
    constant: u32,
    config: Config,
}

impl Kdm {
    pub fn new(registry: Registry, tables: Vec<Table>, parameters: Vec<Parameter>) -> Self {
        Self {
            registry,
            parameters,
            tables,
            arrays: Arena::default(),
            strings: IndexSet::new(),
            constant: 0,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == Some(name))
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.name() == Some(name))
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == Some(name))
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name() == Some(name))
    }

    pub fn arrays(&self) -> &Arena {
        &self.arrays
    }

    pub fn arrays_mut(&mut self) -> &mut Arena {
        &mut self.arrays
    }

    /// Strings in the order they are written.
    pub fn strings(&self) -> &IndexSet<String> {
        &self.strings
    }

    /// Registers `value` in the string section. Returns false if it was already present.
    pub fn add_string(&mut self, value: &str) -> bool {
        if self.strings.contains(value) {
            return false;
        }
        self.strings.insert(value.to_owned())
    }

    pub fn constant(&self) -> u32 {
        self.constant
    }

    pub fn set_constant(&mut self, constant: u32) {
        self.constant = constant;
    }

    /// Removes the document (arrays, table entries, strings and symbols) but keeps the
    /// declarations, parameter values and the constant.
    pub fn clear(&mut self) {
        self.arrays.clear();
        self.strings.clear();
        for table in &mut self.tables {
            table.entries.clear();
            table.symbol = None;
        }
        for parameter in &mut self.parameters {
            parameter.set_symbol(None);
        }
    }

    fn reset(&mut self) {
        self.clear();
        self.constant = 0;
        for parameter in &mut self.parameters {
            parameter.reset();
        }
    }

    /// Every assigned symbol and what it identifies. Struct types use their type id.
    pub fn symbols(&self) -> Result<BTreeMap<u16, Symbol>, Error> {
        let structs = self
            .registry
            .structs()
            .map(|def| (Some(def.type_id()), Symbol::Struct(def.type_id())));
        let arrays = self
            .arrays
            .iter()
            .map(|(id, entry)| (entry.symbol, Symbol::Array(id)));
        let tables = self
            .tables
            .iter()
            .enumerate()
            .map(|(i, table)| (table.symbol, Symbol::Table(i)));
        let parameters = self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, parameter)| (parameter.symbol(), Symbol::Parameter(i)));

        let mut symbols = BTreeMap::new();
        for (symbol, owner) in structs.chain(arrays).chain(tables).chain(parameters) {
            let Some(symbol) = symbol else {
                continue;
            };
            if symbols.insert(symbol, owner).is_some() {
                return Err(Error::DuplicateSymbol(symbol));
            }
        }
        Ok(symbols)
    }

    /// Strings referenced by the document, in the order they are registered.
    fn referenced_strings(&self) -> Vec<String> {
        let arrays = self
            .arrays
            .iter()
            .flat_map(|(_, entry)| &entry.elements)
            .flat_map(Entity::strings);
        let tables = self.tables.iter().flat_map(|table| {
            table
                .name
                .strings()
                .into_iter()
                .chain(table.entries.iter().flat_map(Entity::strings))
        });
        let parameters = self.parameters.iter().flat_map(Entity::strings);
        arrays
            .chain(tables)
            .chain(parameters)
            .map(str::to_owned)
            .collect()
    }

    /// Assigns a symbol to every array, table and parameter that lacks one, and registers every
    /// referenced string.
    ///
    /// Symbols are allocated after the highest one in use, in the order arrays, tables,
    /// parameters. Existing symbols are kept.
    pub fn prepare(&mut self) -> Result<(), Error> {
        let mut next = self
            .symbols()?
            .keys()
            .next_back()
            .map_or(0, |last| usize::from(*last) + 1);
        let mut assign = |symbol: &mut Option<u16>| -> Result<(), Error> {
            if symbol.is_some() {
                return Ok(());
            }
            let assigned = u16::try_from(next).map_err(|_| Error::InvalidLength {
                what: "symbol",
                found: next,
                max: u16::MAX as usize,
            })?;
            *symbol = Some(assigned);
            next += 1;
            Ok(())
        };
        for (_, entry) in self.arrays.iter_mut() {
            assign(&mut entry.symbol)?;
        }
        for table in &mut self.tables {
            assign(&mut table.symbol)?;
        }
        for parameter in &mut self.parameters {
            let mut symbol = parameter.symbol();
            assign(&mut symbol)?;
            parameter.set_symbol(symbol);
        }

        for value in self.referenced_strings() {
            self.strings.insert(value);
        }
        Ok(())
    }

    /// Where each section will start once the current document is written.
    pub fn layout(&self) -> SectionOffsets {
        let sizes: [usize; SECTION_COUNT] = [
            4 + self.strings.iter().map(|s| encoded_len(s)).sum::<usize>(),
            4,
            4,
            4 + self
                .parameters
                .iter()
                .map(|p| PARAMETER_HEADER + p.encode_size())
                .sum::<usize>(),
            4 + self
                .registry
                .structs()
                .map(|def| STRUCT_HEADER + 4 * def.fields().len())
                .sum::<usize>(),
            4 + self
                .arrays
                .iter()
                .map(|(_, entry)| ARRAY_HEADER + elements_size(&entry.elements))
                .sum::<usize>(),
            4 + self
                .tables
                .iter()
                .map(|t| t.name.encode_size() + ARRAY_HEADER + elements_size(&t.entries))
                .sum::<usize>(),
            4,
        ];
        let mut offsets = [0; SECTION_COUNT];
        let mut offset = HEADER_SIZE;
        for (start, size) in offsets.iter_mut().zip(sizes) {
            *start = offset;
            offset += size;
        }
        SectionOffsets(offsets)
    }

    /// Size of the container once written.
    pub fn encode_size(&self) -> usize {
        self.layout().size()
    }

    /// Writes the container as it currently is.
    ///
    /// Every array, table and parameter must already have a symbol and every referenced string
    /// must be registered (see [Kdm::prepare]).
    pub fn build(&self) -> Result<Bytes, Error> {
        let sections = self.layout();
        let size = sections.size();
        count(size, "container")?;
        self.symbols()?;
        for (_, entry) in self.arrays.iter() {
            self.array_header(&entry.elements)?;
        }
        for table in &self.tables {
            self.array_header(&table.entries)?;
        }
        debug!(
            size,
            strings = self.strings.len(),
            arrays = self.arrays.len(),
            tables = self.tables.len(),
            "building container"
        );

        let mut buf = Writer::with_capacity(size);
        let mut ctx = BuildContext::default();
        sections.write(&mut buf)?;
        self.write_strings(&mut buf, &mut ctx)?;
        debug_assert_eq!(buf.position(), sections.end(STRINGS));
        buf.write_u32(0);
        buf.write_u32(0);
        self.write_parameters(&mut buf, &mut ctx)?;
        debug_assert_eq!(buf.position(), sections.end(PARAMETERS));
        self.write_structs(&mut buf)?;
        debug_assert_eq!(buf.position(), sections.end(STRUCTS));
        self.write_arrays(&mut buf, &mut ctx)?;
        debug_assert_eq!(buf.position(), sections.end(ARRAYS));
        self.write_tables(&mut buf, &mut ctx)?;
        debug_assert_eq!(buf.position(), sections.end(TABLES));
        buf.write_u32(0);

        trace!(pointers = ctx.deferred(), "resolving pointers");
        ctx.resolve(&mut buf)?;
        assert_eq!(buf.position(), size, "layout does not match the written size");
        Ok(buf.freeze())
    }

    fn write_strings(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error> {
        buf.write_u32(count(self.strings.len(), "string")?);
        for value in &self.strings {
            KdmString::new(value.as_str()).write(buf, ctx)?;
        }
        Ok(())
    }

    fn write_parameters(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error> {
        buf.write_u32(count(self.parameters.len(), "parameter")?);
        for (i, parameter) in self.parameters.iter().enumerate() {
            let symbol = parameter.symbol().ok_or_else(|| {
                Error::UnknownEntity(format!("parameter {:?}", parameter.name()))
            })?;
            let type_id = self
                .registry
                .id_of(&parameter.kind())
                .ok_or(Error::UnknownType(parameter.kind()))?;
            buf.write_u16(symbol);
            buf.write_u16(type_id);

            let slot = if i + 1 == self.parameters.len() {
                0
            } else {
                slot(
                    self.constant,
                    buf.position() + parameter.slot_offset(),
                    PARAMETER_HEADER + parameter.encode_size(),
                )
            };
            parameter.write_with_slot(buf, ctx, slot as i32)?;
        }
        Ok(())
    }

    fn write_structs(&self, buf: &mut Writer) -> Result<(), Error> {
        let structs = self.registry.structs();
        let len = structs.len();
        buf.write_u32(count(len, "struct definition")?);
        for (i, def) in structs.enumerate() {
            let fields = u16::try_from(def.fields().len())
                .map_err(|_| Error::InvalidStructDefinition(def.type_id()))?;
            buf.write_u16(def.type_id());
            buf.write_u16(fields);
            buf.write_u32(0);

            let slot = if i + 1 == len {
                0
            } else {
                // The slot covers every word of the definition but the zero one.
                slot(
                    self.constant,
                    buf.position(),
                    STRUCT_HEADER - 4 + 4 * def.fields().len(),
                )
            };
            buf.write_u32(slot);

            for (_, primitive) in def.fields() {
                let kind = Kind::Primitive(*primitive);
                let type_id = self.registry.id_of(&kind).ok_or(Error::UnknownType(kind))?;
                buf.write_u32(type_id.into());
            }
        }
        Ok(())
    }

    fn write_arrays(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error> {
        buf.write_u32(count(self.arrays.len(), "array")?);
        for (id, entry) in self.arrays.iter() {
            let symbol = entry
                .symbol
                .ok_or_else(|| Error::UnknownEntity(format!("array {id:?}")))?;
            let offset = self.write_array(buf, ctx, symbol, &entry.elements)?;
            ctx.register_array(id, offset);
        }
        Ok(())
    }

    fn write_tables(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error> {
        buf.write_u32(count(self.tables.len(), "table")?);
        for table in &self.tables {
            table.name.write(buf, ctx)?;
        }
        for table in &self.tables {
            let symbol = table
                .symbol
                .ok_or_else(|| Error::UnknownEntity(format!("table {:?}", table.name())))?;
            self.write_array(buf, ctx, symbol, &table.entries)?;
        }
        Ok(())
    }

    /// The type id and size in words written before `elements`.
    fn array_header(&self, elements: &[AnyEntity]) -> Result<(u16, u16), Error> {
        let kind = elements.first().ok_or(Error::EmptyArray)?.kind();
        if let Some(other) = elements.iter().map(AnyEntity::kind).find(|k| *k != kind) {
            return Err(Error::MixedArray(kind, other));
        }
        let type_id = self.registry.id_of(&kind).ok_or(Error::UnknownType(kind))?;
        let size = elements_size(elements);
        if size % 4 != 0 {
            return Err(Error::InvalidArraySize(size));
        }
        let words = u16::try_from(size / 4).map_err(|_| Error::InvalidArraySize(size))?;
        Ok((type_id, words))
    }

    /// Writes an array and returns the offset of its first element.
    fn write_array(
        &self,
        buf: &mut Writer,
        ctx: &mut BuildContext,
        symbol: u16,
        elements: &[AnyEntity],
    ) -> Result<usize, Error> {
        let (type_id, words) = self.array_header(elements)?;

        buf.write_u16(symbol);
        buf.write_u16(words);
        buf.write_u16(type_id);
        buf.write_u16(words);
        let offset = buf.position();
        for element in elements {
            element.write(buf, ctx)?;
        }
        Ok(offset)
    }

    /// Replaces the document with the one stored in `bytes`.
    ///
    /// Nothing is modified if `bytes` is rejected.
    pub fn parse(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut next = self.clone();
        next.reset();
        next.read(bytes)?;
        *self = next;
        Ok(())
    }

    fn read(&mut self, bytes: &[u8]) -> Result<(), Error> {
        debug!(len = bytes.len(), "parsing container");
        let mut buf = Reader::new(bytes);
        let sections = SectionOffsets::read(&mut buf)?;
        let mut ctx = ParseContext::default();
        let mut constant = None;

        self.read_strings(&mut buf, &mut ctx)?;
        expect_end(&buf, &sections, STRINGS)?;
        for section in 1..PARAMETERS {
            read_reserved(&mut buf)?;
            expect_end(&buf, &sections, section)?;
        }
        self.read_parameters(&mut buf, &mut ctx, &mut constant)?;
        expect_end(&buf, &sections, PARAMETERS)?;
        self.read_structs(&mut buf, &mut constant)?;
        expect_end(&buf, &sections, STRUCTS)?;
        self.read_arrays(&mut buf, &mut ctx)?;
        expect_end(&buf, &sections, ARRAYS)?;
        self.read_tables(&mut buf, &mut ctx)?;
        expect_end(&buf, &sections, TABLES)?;
        read_reserved(&mut buf)?;
        expect_end(&buf, &sections, END)?;
        if !buf.is_empty() {
            return Err(Error::MalformedFile {
                offset: buf.position(),
                reason: "data after the last section",
            });
        }

        if let Some(constant) = constant {
            self.constant = constant;
        }
        trace!(pointers = ctx.pointers(), "dereferencing pointers");
        self.dereference(&ctx)?;
        self.symbols()?;
        debug!(
            strings = self.strings.len(),
            arrays = self.arrays.len(),
            constant = self.constant,
            "parsed container"
        );
        Ok(())
    }

    fn read_strings(&mut self, buf: &mut Reader<'_>, ctx: &mut ParseContext) -> Result<(), Error> {
        let len = buf.read_u32()? as usize;
        if len > self.config.max_strings {
            return Err(Error::InvalidLength {
                what: "string",
                found: len,
                max: self.config.max_strings,
            });
        }
        for _ in 0..len {
            let offset = buf.position();
            let mut string = KdmString::default();
            string.read(buf, ctx)?;
            if !self.strings.insert(string.into_inner()) {
                return Err(Error::MalformedFile {
                    offset,
                    reason: "duplicate string",
                });
            }
        }
        Ok(())
    }

    fn read_parameters(
        &mut self,
        buf: &mut Reader<'_>,
        ctx: &mut ParseContext,
        constant: &mut Option<u32>,
    ) -> Result<(), Error> {
        let found = buf.read_u32()? as usize;
        let len = self.parameters.len();
        if found != len {
            return Err(Error::InvalidCount {
                section: "parameter",
                found,
                expected: len,
            });
        }
        for (i, parameter) in self.parameters.iter_mut().enumerate() {
            let symbol = buf.read_u16()?;
            let type_id = buf.read_u16()?;
            let kind = self
                .registry
                .kind_of(type_id)
                .ok_or(Error::UnknownTypeId(type_id.into()))?;
            if parameter.kind() != kind {
                return Err(Error::InvalidParameterType {
                    expected: parameter.kind(),
                    found: kind,
                });
            }

            let offset = buf.position() + parameter.slot_offset();
            parameter.read(buf, ctx)?;
            parameter.set_symbol(Some(symbol));
            verify_slot(
                constant,
                i + 1 == len,
                parameter.slot() as u32,
                offset,
                PARAMETER_HEADER + parameter.encode_size(),
            )?;
        }
        Ok(())
    }

    fn read_structs(&self, buf: &mut Reader<'_>, constant: &mut Option<u32>) -> Result<(), Error> {
        let found = buf.read_u32()? as usize;
        let len = self.registry.structs().len();
        if found != len {
            return Err(Error::InvalidCount {
                section: "struct definition",
                found,
                expected: len,
            });
        }
        for (i, def) in self.registry.structs().enumerate() {
            let id = def.type_id();
            if buf.read_u16()? != id {
                return Err(Error::InvalidStructDefinition(id));
            }
            if usize::from(buf.read_u16()?) != def.fields().len() {
                return Err(Error::InvalidStructDefinition(id));
            }
            let offset = buf.position();
            if buf.read_u32()? != 0 {
                return Err(Error::MalformedFile {
                    offset,
                    reason: "struct definition is missing its zero word",
                });
            }

            let offset = buf.position();
            let slot = buf.read_u32()?;
            verify_slot(
                constant,
                i + 1 == len,
                slot,
                offset,
                STRUCT_HEADER - 4 + 4 * def.fields().len(),
            )?;

            for (_, primitive) in def.fields() {
                let type_id = buf.read_u32()?;
                let kind = u16::try_from(type_id)
                    .ok()
                    .and_then(|id| self.registry.kind_of(id));
                if kind != Some(Kind::Primitive(*primitive)) {
                    return Err(Error::InvalidStructDefinition(id));
                }
            }
        }
        Ok(())
    }

    fn read_arrays(&mut self, buf: &mut Reader<'_>, ctx: &mut ParseContext) -> Result<(), Error> {
        let len = buf.read_u32()? as usize;
        if len > self.config.max_arrays {
            return Err(Error::InvalidLength {
                what: "array",
                found: len,
                max: self.config.max_arrays,
            });
        }
        for _ in 0..len {
            let (symbol, elements, offset) = self.read_array(buf, ctx)?;
            let info_len = elements.len();
            let element = elements
                .first()
                .and_then(AnyEntity::as_struct)
                .map(|s| s.def().clone());
            let id = self.arrays.push_with_symbol(elements, Some(symbol));
            ctx.register_array(
                offset,
                ArrayInfo {
                    id,
                    len: info_len,
                    element,
                },
            );
        }
        Ok(())
    }

    fn read_tables(&mut self, buf: &mut Reader<'_>, ctx: &mut ParseContext) -> Result<(), Error> {
        let found = buf.read_u32()? as usize;
        if found != self.tables.len() {
            return Err(Error::InvalidCount {
                section: "table",
                found,
                expected: self.tables.len(),
            });
        }
        let mut names = Vec::with_capacity(found);
        for _ in 0..found {
            let offset = buf.position();
            let mut name = StringPointer::default();
            name.read(buf, ctx)?;
            name.dereference(ctx)?;
            if name.value().is_none() {
                return Err(Error::MalformedFile {
                    offset,
                    reason: "table name is null",
                });
            }
            names.push(name);
        }

        // Tables are kept in the order the file lists them.
        let mut declared = std::mem::take(&mut self.tables);
        for name in names {
            let value = name.value().unwrap_or_default();
            let index = declared
                .iter()
                .position(|table| table.name() == Some(value))
                .ok_or_else(|| Error::UnknownTable(value.to_owned()))?;
            let mut table = declared.swap_remove(index);
            let (symbol, entries, _) = self.read_array(buf, ctx)?;
            table.name = name;
            table.entries = entries;
            table.symbol = Some(symbol);
            self.tables.push(table);
        }
        Ok(())
    }

    /// Reads an array and returns its symbol, its elements and the offset of the first element.
    fn read_array(
        &self,
        buf: &mut Reader<'_>,
        ctx: &mut ParseContext,
    ) -> Result<(u16, Vec<AnyEntity>, usize), Error> {
        let start = buf.position();
        let symbol = buf.read_u16()?;
        let words = buf.read_u16()?;
        let type_id = buf.read_u16()?;
        if buf.read_u16()? != words {
            return Err(Error::MalformedFile {
                offset: start,
                reason: "array sizes disagree",
            });
        }
        if words == 0 {
            return Err(Error::EmptyArray);
        }
        let template = self.registry.instantiate(type_id)?;
        if template.encode_size() == 0 {
            return Err(Error::MalformedFile {
                offset: start,
                reason: "array elements have no size",
            });
        }

        let offset = buf.position();
        let end = offset + usize::from(words) * 4;
        let mut elements = Vec::new();
        while buf.position() < end {
            let mut element = template.clone();
            element.read(buf, ctx)?;
            elements.push(element);
        }
        if buf.position() != end {
            return Err(Error::MalformedFile {
                offset: start,
                reason: "array size is not a multiple of its element size",
            });
        }
        Ok((symbol, elements, offset))
    }

    /// Replaces the raw word of every pointer with what it points to.
    fn dereference(&mut self, ctx: &ParseContext) -> Result<(), Error> {
        let mut visited = 0;
        let mut visit = |pointer: &mut dyn Pointer| {
            visited += 1;
            pointer.dereference(ctx)
        };
        for parameter in &mut self.parameters {
            parameter.visit_pointers_mut(&mut visit)?;
        }
        for table in &mut self.tables {
            table.name.visit_pointers_mut(&mut visit)?;
            for entry in &mut table.entries {
                entry.visit_pointers_mut(&mut visit)?;
            }
        }
        for (_, entry) in self.arrays.iter_mut() {
            for element in &mut entry.elements {
                element.visit_pointers_mut(&mut visit)?;
            }
        }
        debug_assert_eq!(visited, ctx.pointers());
        Ok(())
    }
}

/// A container with a fixed declaration and a typed plain state.
pub trait Container: Default {
    /// The plain representation of the document.
    type State: Serialize + DeserializeOwned;

    fn kdm(&self) -> &Kdm;

    fn kdm_mut(&mut self) -> &mut Kdm;

    /// Converts the document into its plain state.
    fn get(&self) -> Result<Self::State, Error>;

    /// Replaces the document with `state`.
    fn set(&mut self, state: &Self::State) -> Result<(), Error>;

    /// Checks that `value` is a valid plain state.
    fn validate(&self, value: &Value) -> Result<(), InvalidState>;

    /// Brings the document into a writable form.
    fn prepare(&mut self) -> Result<(), Error> {
        self.kdm_mut().prepare()
    }

    fn build(&mut self) -> Result<Bytes, Error> {
        self.prepare()?;
        self.kdm().build()
    }

    /// Parses `bytes` into a freshly declared container.
    fn parse(bytes: &[u8]) -> Result<Self, Error> {
        Self::parse_with_config(bytes, Config::default())
    }

    fn parse_with_config(bytes: &[u8], config: Config) -> Result<Self, Error> {
        let mut container = Self::default();
        container.kdm_mut().set_config(config);
        container.kdm_mut().parse(bytes)?;
        Ok(container)
    }

    /// Validates an untyped plain state and sets it.
    fn set_value(&mut self, value: &Value) -> Result<(), Error> {
        self.validate(value)?;
        let state = serde_json::from_value(value.clone())
            .map_err(|e| InvalidState::new(e.to_string()))?;
        self.set(&state)
    }
}
