//! Entities that can be stored in a container.

pub mod number;
pub mod parameter;
pub mod pointer;
pub mod string;
pub mod structure;

use crate::{
    arena::Arena,
    codec::{BuildContext, Entity, ParseContext, Pointer},
    cursor::{Reader, Writer},
    error::InvalidState,
    Error,
};
use number::Number;
use pointer::{StringPointer, StructArrayPointer};
use serde_json::Value;
use string::KdmString;
use structure::Struct;

/// Entity kinds that need no declaration to be instantiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    F32,
    I32,
    I16,
    U8,
    U16,
    U32,
    String,
    StringPointer,
    StructArrayPointer,
}

impl Primitive {
    /// Creates an entity of this kind holding its default value.
    pub fn instantiate(self) -> AnyEntity {
        match self {
            Self::F32 => AnyEntity::Number(Number::F32(0.0)),
            Self::I32 => AnyEntity::Number(Number::I32(0)),
            Self::I16 => AnyEntity::Number(Number::I16(0)),
            Self::U8 => AnyEntity::Number(Number::U8(0)),
            Self::U16 => AnyEntity::Number(Number::U16(0)),
            Self::U32 => AnyEntity::Number(Number::U32(0)),
            Self::String => AnyEntity::String(KdmString::default()),
            Self::StringPointer => AnyEntity::StringPointer(StringPointer::default()),
            Self::StructArrayPointer => {
                AnyEntity::StructArrayPointer(StructArrayPointer::default())
            }
        }
    }
}

/// The kind of an entity: a primitive, or a struct identified by its type id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Primitive(Primitive),
    Struct(u16),
}

/// Any entity, as stored in arrays, tables and struct fields.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyEntity {
    Number(Number),
    String(KdmString),
    StringPointer(StringPointer),
    StructArrayPointer(StructArrayPointer),
    Struct(Struct),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            AnyEntity::Number($inner) => $body,
            AnyEntity::String($inner) => $body,
            AnyEntity::StringPointer($inner) => $body,
            AnyEntity::StructArrayPointer($inner) => $body,
            AnyEntity::Struct($inner) => $body,
        }
    };
}

impl AnyEntity {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Number(number) => Kind::Primitive(number.primitive()),
            Self::String(_) => Kind::Primitive(Primitive::String),
            Self::StringPointer(_) => Kind::Primitive(Primitive::StringPointer),
            Self::StructArrayPointer(_) => Kind::Primitive(Primitive::StructArrayPointer),
            Self::Struct(s) => Kind::Struct(s.def().type_id()),
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct_array_pointer(&self) -> Option<&StructArrayPointer> {
        match self {
            Self::StructArrayPointer(pointer) => Some(pointer),
            _ => None,
        }
    }
}

impl Entity for AnyEntity {
    fn encode_size(&self) -> usize {
        dispatch!(self, e => e.encode_size())
    }

    fn write(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error> {
        dispatch!(self, e => e.write(buf, ctx))
    }

    fn read(&mut self, buf: &mut Reader<'_>, ctx: &mut ParseContext) -> Result<(), Error> {
        dispatch!(self, e => e.read(buf, ctx))
    }

    fn get(&self, arena: &Arena) -> Value {
        dispatch!(self, e => e.get(arena))
    }

    fn set(&mut self, value: &Value, arena: &mut Arena) -> Result<(), InvalidState> {
        dispatch!(self, e => e.set(value, arena))
    }

    fn validate(&self, value: &Value) -> Result<(), InvalidState> {
        dispatch!(self, e => e.validate(value))
    }

    fn strings(&self) -> Vec<&str> {
        dispatch!(self, e => e.strings())
    }

    fn visit_pointers_mut(
        &mut self,
        visit: &mut dyn FnMut(&mut dyn Pointer) -> Result<(), Error>,
    ) -> Result<(), Error> {
        dispatch!(self, e => e.visit_pointers_mut(visit))
    }
}
