//! Pointers to strings and to arrays of structs.
//!
//! Both pointers write a placeholder that is patched once the whole container has been written,
//! and both treat a zero word as null.

use super::{
    structure::{Struct, StructDef},
    AnyEntity,
};
use crate::{
    arena::{Arena, ArrayId},
    codec::{BuildContext, Entity, ParseContext, Pointer, Target},
    cursor::{Reader, Writer},
    error::InvalidState,
    Error,
};
use serde_json::Value;
use std::sync::Arc;

/// Pointer to a string registered in the string section.
///
/// A pointer to an empty string read from a file reads back as null but keeps its target, so
/// the file is rebuilt unchanged.
#[derive(Clone, Debug, Default)]
pub struct StringPointer {
    value: Option<String>,
    raw: u32,
}

impl PartialEq for StringPointer {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl Eq for StringPointer {}

impl StringPointer {
    /// Creates a pointer to `value`. The empty string is null.
    pub fn new(value: &str) -> Self {
        Self {
            value: (!value.is_empty()).then(|| value.to_owned()),
            raw: 0,
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().filter(|value| !value.is_empty())
    }
}

impl Pointer for StringPointer {
    fn raw(&self) -> u32 {
        self.raw
    }

    fn dereference(&mut self, ctx: &ParseContext) -> Result<(), Error> {
        self.value = match self.raw {
            0 => None,
            raw => Some(
                ctx.string(raw)
                    .ok_or(Error::InvalidPointer(raw))?
                    .to_owned(),
            ),
        };
        Ok(())
    }
}

impl Entity for StringPointer {
    fn encode_size(&self) -> usize {
        4
    }

    fn write(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error> {
        ctx.defer(buf.position(), Target::String(self.value.clone()));
        buf.write_u32(0);
        Ok(())
    }

    fn read(&mut self, buf: &mut Reader<'_>, ctx: &mut ParseContext) -> Result<(), Error> {
        let offset = buf.position();
        self.raw = buf.read_u32()?;
        ctx.record_pointer(offset, self.raw);
        Ok(())
    }

    fn get(&self, _: &Arena) -> Value {
        self.value().map_or(Value::Null, |value| Value::String(value.to_owned()))
    }

    fn set(&mut self, value: &Value, _: &mut Arena) -> Result<(), InvalidState> {
        self.validate(value)?;
        self.value = value
            .as_str()
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        Ok(())
    }

    fn validate(&self, value: &Value) -> Result<(), InvalidState> {
        match value {
            Value::Null => Ok(()),
            Value::String(value) => super::string::check(value),
            _ => Err(InvalidState::new("expected a string or null")),
        }
    }

    fn strings(&self) -> Vec<&str> {
        self.value.as_deref().into_iter().collect()
    }

    fn visit_pointers_mut(
        &mut self,
        visit: &mut dyn FnMut(&mut dyn Pointer) -> Result<(), Error>,
    ) -> Result<(), Error> {
        visit(self)
    }
}

/// Pointer to a non-empty array of structs stored in the arena.
#[derive(Clone, Debug, Default)]
pub struct StructArrayPointer {
    array: Option<ArrayId>,
    element: Option<Arc<StructDef>>,
    raw: u32,
}

impl PartialEq for StructArrayPointer {
    fn eq(&self, other: &Self) -> bool {
        self.array == other.array && self.element == other.element
    }
}

impl StructArrayPointer {
    /// Creates a pointer to the array `id`, which must hold at least one struct.
    pub fn new(arena: &Arena, id: ArrayId) -> Result<Self, Error> {
        let entry = arena.get(id).ok_or(Error::UnknownArray(id))?;
        let first = entry.elements.first().ok_or(Error::EmptyArray)?;
        let element = first.as_struct().ok_or(Error::NotAStructArray(id))?;
        Ok(Self {
            array: Some(id),
            element: Some(element.def().clone()),
            raw: 0,
        })
    }

    /// Creates a null pointer whose elements, once set, are structs of type `def`.
    pub fn with_element(def: Arc<StructDef>) -> Self {
        Self {
            array: None,
            element: Some(def),
            raw: 0,
        }
    }

    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.array.is_none()
    }

    pub fn array(&self) -> Option<ArrayId> {
        self.array
    }

    pub fn element(&self) -> Option<&Arc<StructDef>> {
        self.element.as_ref()
    }

    /// The first struct of the array pointed to, if any.
    pub fn first<'a>(&self, arena: &'a Arena) -> Option<&'a Struct> {
        arena
            .get(self.array?)?
            .elements
            .first()
            .and_then(AnyEntity::as_struct)
    }
}

impl Pointer for StructArrayPointer {
    fn raw(&self) -> u32 {
        self.raw
    }

    fn dereference(&mut self, ctx: &ParseContext) -> Result<(), Error> {
        if self.raw == 0 {
            self.array = None;
            return Ok(());
        }
        let info = ctx.array(self.raw).ok_or(Error::InvalidPointer(self.raw))?;
        if info.len == 0 {
            return Err(Error::EmptyArray);
        }
        self.array = Some(info.id);
        self.element = info.element.clone();
        Ok(())
    }
}

impl Entity for StructArrayPointer {
    fn encode_size(&self) -> usize {
        4
    }

    fn write(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error> {
        ctx.defer(buf.position(), Target::Array(self.array));
        buf.write_u32(0);
        Ok(())
    }

    fn read(&mut self, buf: &mut Reader<'_>, ctx: &mut ParseContext) -> Result<(), Error> {
        let offset = buf.position();
        self.raw = buf.read_u32()?;
        ctx.record_pointer(offset, self.raw);
        Ok(())
    }

    fn get(&self, arena: &Arena) -> Value {
        let Some(entry) = self.array.and_then(|id| arena.get(id)) else {
            return Value::Null;
        };
        Value::Array(entry.elements.iter().map(|e| e.get(arena)).collect())
    }

    fn set(&mut self, value: &Value, arena: &mut Arena) -> Result<(), InvalidState> {
        self.validate(value)?;
        let (Value::Array(items), Some(def)) = (value, &self.element) else {
            self.array = None;
            return Ok(());
        };
        let mut elements = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let mut element = Struct::new(def.clone());
            element.set(item, arena).map_err(|e| e.at(i))?;
            elements.push(AnyEntity::Struct(element));
        }
        self.array = Some(arena.push(elements));
        Ok(())
    }

    fn validate(&self, value: &Value) -> Result<(), InvalidState> {
        match value {
            Value::Null => Ok(()),
            Value::Array(items) => {
                let def = self
                    .element
                    .as_ref()
                    .ok_or_else(|| InvalidState::new("element type is unknown"))?;
                if items.is_empty() {
                    return Err(InvalidState::new("array must not be empty"));
                }
                let element = Struct::new(def.clone());
                items
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, item)| element.validate(item).map_err(|e| e.at(i)))
            }
            _ => Err(InvalidState::new("expected an array or null")),
        }
    }

    fn visit_pointers_mut(
        &mut self,
        visit: &mut dyn FnMut(&mut dyn Pointer) -> Result<(), Error>,
    ) -> Result<(), Error> {
        visit(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{arena::ArrayInfo, types::Primitive};
    use serde_json::json;

    fn point() -> Arc<StructDef> {
        StructDef::builder(0x20, "Point")
            .field("x", Primitive::I32)
            .field("y", Primitive::I32)
            .build()
    }

    #[test]
    fn test_string_pointer_null() {
        assert!(StringPointer::new("").value().is_none());
        assert_eq!(StringPointer::new("").get(&Arena::default()), Value::Null);

        let mut pointer = StringPointer::new("a");
        pointer.set(&json!(""), &mut Arena::default()).unwrap();
        assert!(pointer.value().is_none());
        assert!(pointer.strings().is_empty());
        pointer.set(&json!("b"), &mut Arena::default()).unwrap();
        assert_eq!(pointer.strings(), vec!["b"]);
        assert!(pointer.set(&json!(5), &mut Arena::default()).is_err());
        assert_eq!(pointer.value(), Some("b"));
    }

    #[test]
    fn test_string_pointer_dereference() {
        let mut ctx = ParseContext::default();
        ctx.register_string(0x2c, "name".into());
        let mut reader = Reader::new(&[0x2c, 0, 0, 0, 0, 0, 0, 0, 0x30, 0, 0, 0]);

        let mut pointers = [
            StringPointer::default(),
            StringPointer::new("stale"),
            StringPointer::default(),
        ];
        for pointer in &mut pointers {
            pointer.read(&mut reader, &mut ctx).unwrap();
        }
        assert_eq!(ctx.pointers(), 3);

        pointers[0].dereference(&ctx).unwrap();
        assert_eq!(pointers[0].value(), Some("name"));
        pointers[1].dereference(&ctx).unwrap();
        assert_eq!(pointers[1].value(), None);
        assert!(matches!(
            pointers[2].dereference(&ctx),
            Err(Error::InvalidPointer(0x30))
        ));
    }

    #[test]
    fn test_string_pointer_to_empty_string() {
        let mut ctx = ParseContext::default();
        ctx.register_string(0x2c, String::new());
        let mut pointer = StringPointer::default();
        pointer
            .read(&mut Reader::new(&[0x2c, 0, 0, 0]), &mut ctx)
            .unwrap();
        pointer.dereference(&ctx).unwrap();

        assert_eq!(pointer.value(), None);
        assert_eq!(pointer.get(&Arena::default()), Value::Null);
        assert_eq!(pointer, StringPointer::default());
        assert_eq!(pointer.strings(), vec![""]);

        let mut buf = Writer::with_capacity(4);
        let mut build = BuildContext::default();
        build.register_string("", 0x2c);
        pointer.write(&mut buf, &mut build).unwrap();
        build.resolve(&mut buf).unwrap();
        assert_eq!(buf.freeze().as_ref(), &[0x2c, 0, 0, 0]);
    }

    #[test]
    fn test_struct_array_pointer_new() {
        let mut arena = Arena::default();
        let empty = arena.push(Vec::new());
        let numbers = arena.push(vec![Primitive::I32.instantiate()]);
        let points = arena.push(vec![AnyEntity::Struct(Struct::new(point()))]);

        assert!(matches!(
            StructArrayPointer::new(&arena, empty),
            Err(Error::EmptyArray)
        ));
        assert!(matches!(
            StructArrayPointer::new(&arena, numbers),
            Err(Error::NotAStructArray(_))
        ));
        assert!(matches!(
            StructArrayPointer::new(&arena, ArrayId(9)),
            Err(Error::UnknownArray(_))
        ));

        let pointer = StructArrayPointer::new(&arena, points).unwrap();
        assert!(!pointer.is_null());
        assert_eq!(pointer.element(), Some(&point()));
        assert_eq!(pointer.first(&arena).unwrap().def().name(), "Point");
    }

    #[test]
    fn test_struct_array_pointer_set_get() {
        let mut arena = Arena::default();
        let mut pointer = StructArrayPointer::with_element(point());
        assert_eq!(pointer.get(&arena), Value::Null);

        let value = json!([{"x": 1, "y": 2}, {"x": 3, "y": 4}]);
        pointer.set(&value, &mut arena).unwrap();
        assert_eq!(arena.len(), 1);
        assert_eq!(
            pointer.get(&arena),
            json!([
                {"entity": "Point", "x": 1, "y": 2},
                {"entity": "Point", "x": 3, "y": 4},
            ])
        );

        pointer.set(&Value::Null, &mut arena).unwrap();
        assert!(pointer.is_null());
    }

    #[test]
    fn test_struct_array_pointer_rejects() {
        let mut arena = Arena::default();
        let mut pointer = StructArrayPointer::with_element(point());
        assert!(pointer.set(&json!([]), &mut arena).is_err());

        let err = pointer
            .set(&json!([{"x": 1, "y": 2}, {"x": "no", "y": 2}]), &mut arena)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid state at $[1].x: expected a number");
        assert!(arena.is_empty());

        assert!(StructArrayPointer::null()
            .validate(&json!([{"x": 1, "y": 2}]))
            .is_err());
    }

    #[test]
    fn test_struct_array_pointer_dereference() {
        let mut ctx = ParseContext::default();
        ctx.register_array(
            0x100,
            ArrayInfo {
                id: ArrayId(2),
                len: 1,
                element: Some(point()),
            },
        );

        let mut pointer = StructArrayPointer::default();
        pointer.raw = 0x100;
        pointer.dereference(&ctx).unwrap();
        assert_eq!(pointer.array(), Some(ArrayId(2)));
        assert_eq!(pointer.element(), Some(&point()));

        pointer.raw = 0x104;
        assert!(matches!(
            pointer.dereference(&ctx),
            Err(Error::InvalidPointer(0x104))
        ));

        pointer.raw = 0;
        pointer.dereference(&ctx).unwrap();
        assert!(pointer.is_null());
    }
}
