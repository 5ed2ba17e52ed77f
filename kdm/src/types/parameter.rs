//! Named numeric parameters.

use super::{number::Number, pointer::StringPointer, Kind, Primitive};
use crate::{
    arena::Arena,
    codec::{BuildContext, Entity, ParseContext, Pointer},
    cursor::{Reader, Writer},
    error::InvalidState,
    Error,
};
use serde_json::{json, Value};

/// Key holding the parameter tag in the plain representation of a parameter.
pub const ENTITY_KEY: &str = "_entity";

/// A named number, written as `name`, an integrity slot, then `value`.
#[derive(Clone, Debug)]
pub struct Parameter {
    name: StringPointer,
    slot: i32,
    value: Number,
    symbol: Option<u16>,
}

// The slot is derived from the container layout and is not part of the value.
impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value && self.symbol == other.symbol
    }
}

impl Parameter {
    pub fn new(name: &str, value: Number) -> Self {
        Self {
            name: StringPointer::new(name),
            slot: 0,
            value,
            symbol: None,
        }
    }

    pub fn i32(name: &str) -> Self {
        Self::new(name, Number::I32(0))
    }

    pub fn f32(name: &str) -> Self {
        Self::new(name, Number::F32(0.0))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.value()
    }

    pub fn kind(&self) -> Kind {
        Kind::Primitive(self.value.primitive())
    }

    /// Tag identifying the parameter flavor in its plain representation.
    pub fn tag(&self) -> &'static str {
        match self.value.primitive() {
            Primitive::F32 => "F32Parameter",
            Primitive::I16 => "I16Parameter",
            Primitive::U8 => "U8Parameter",
            Primitive::U16 => "U16Parameter",
            Primitive::U32 => "U32Parameter",
            _ => "I32Parameter",
        }
    }

    pub fn value(&self) -> Number {
        self.value
    }

    pub fn value_mut(&mut self) -> &mut Number {
        &mut self.value
    }

    pub fn symbol(&self) -> Option<u16> {
        self.symbol
    }

    pub fn set_symbol(&mut self, symbol: Option<u16>) {
        self.symbol = symbol;
    }

    /// The integrity slot read with the parameter.
    pub fn slot(&self) -> i32 {
        self.slot
    }

    /// Offset of the integrity slot relative to the start of the parameter.
    pub fn slot_offset(&self) -> usize {
        self.name.encode_size()
    }

    /// Writes the parameter with `slot` in place of the stored integrity slot.
    pub fn write_with_slot(
        &self,
        buf: &mut Writer,
        ctx: &mut BuildContext,
        slot: i32,
    ) -> Result<(), Error> {
        self.name.write(buf, ctx)?;
        buf.write_i32(slot);
        self.value.write(buf, ctx)
    }

    /// Restores the value a freshly declared parameter holds.
    pub(crate) fn reset(&mut self) {
        self.slot = 0;
        self.symbol = None;
        self.value = match self.value {
            Number::F32(_) => Number::F32(0.0),
            Number::I32(_) => Number::I32(0),
            Number::I16(_) => Number::I16(0),
            Number::U8(_) => Number::U8(0),
            Number::U16(_) => Number::U16(0),
            Number::U32(_) => Number::U32(0),
        };
    }
}

impl Entity for Parameter {
    fn encode_size(&self) -> usize {
        self.name.encode_size() + 4 + self.value.encode_size()
    }

    fn write(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error> {
        self.write_with_slot(buf, ctx, self.slot)
    }

    fn read(&mut self, buf: &mut Reader<'_>, ctx: &mut ParseContext) -> Result<(), Error> {
        self.name.read(buf, ctx)?;
        self.slot = buf.read_i32()?;
        self.value.read(buf, ctx)
    }

    fn get(&self, arena: &Arena) -> Value {
        json!({
            ENTITY_KEY: self.tag(),
            "name": self.name.get(arena),
            "value": self.value.get(arena),
        })
    }

    fn set(&mut self, value: &Value, arena: &mut Arena) -> Result<(), InvalidState> {
        self.validate(value)?;
        self.name.set(&value["name"], arena)?;
        self.value.set(&value["value"], arena)?;
        Ok(())
    }

    fn validate(&self, value: &Value) -> Result<(), InvalidState> {
        if !value.is_object() {
            return Err(InvalidState::new("expected an object for a parameter"));
        }
        self.name.validate(&value["name"]).map_err(|e| e.at("name"))?;
        self.value.validate(&value["value"]).map_err(|e| e.at("value"))
    }

    fn strings(&self) -> Vec<&str> {
        self.name.strings()
    }

    fn visit_pointers_mut(
        &mut self,
        visit: &mut dyn FnMut(&mut dyn Pointer) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.name.visit_pointers_mut(visit)
    }
}
