//! Structs: ordered, named fields of primitive entities.

use super::{AnyEntity, Kind, Primitive};
use crate::{
    arena::Arena,
    codec::{BuildContext, Entity, ParseContext, Pointer},
    cursor::{Reader, Writer},
    error::InvalidState,
    Error,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Key holding the struct name in the plain representation of a struct.
pub const ENTITY_KEY: &str = "entity";

/// The declaration of a struct type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
    type_id: u16,
    name: String,
    fields: Vec<(String, Primitive)>,
}

impl StructDef {
    pub fn builder(type_id: u16, name: impl Into<String>) -> StructDefBuilder {
        StructDefBuilder {
            def: Self {
                type_id,
                name: name.into(),
                fields: Vec::new(),
            },
        }
    }

    pub fn type_id(&self) -> u16 {
        self.type_id
    }

    pub fn kind(&self) -> Kind {
        Kind::Struct(self.type_id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order, which is also the order they are written in.
    pub fn fields(&self) -> &[(String, Primitive)] {
        &self.fields
    }
}

/// Builds a [StructDef] one field at a time.
#[derive(Debug)]
pub struct StructDefBuilder {
    def: StructDef,
}

impl StructDefBuilder {
    pub fn field(mut self, name: impl Into<String>, primitive: Primitive) -> Self {
        self.def.fields.push((name.into(), primitive));
        self
    }

    pub fn build(self) -> Arc<StructDef> {
        Arc::new(self.def)
    }
}

/// An instance of a struct type.
#[derive(Clone, Debug, PartialEq)]
pub struct Struct {
    def: Arc<StructDef>,
    fields: Vec<AnyEntity>,
}

impl Struct {
    /// Creates an instance with every field at its default value.
    pub fn new(def: Arc<StructDef>) -> Self {
        let fields = def
            .fields
            .iter()
            .map(|(_, primitive)| primitive.instantiate())
            .collect();
        Self { def, fields }
    }

    pub fn def(&self) -> &Arc<StructDef> {
        &self.def
    }

    pub fn field(&self, name: &str) -> Option<&AnyEntity> {
        let index = self.def.fields.iter().position(|(n, _)| n == name)?;
        self.fields.get(index)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut AnyEntity> {
        let index = self.def.fields.iter().position(|(n, _)| n == name)?;
        self.fields.get_mut(index)
    }

    /// Value of a string-pointer field.
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.field(name)? {
            AnyEntity::StringPointer(pointer) => pointer.value(),
            _ => None,
        }
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &AnyEntity)> {
        self.def
            .fields
            .iter()
            .map(|(name, _)| name.as_str())
            .zip(&self.fields)
    }
}

impl Entity for Struct {
    fn encode_size(&self) -> usize {
        self.fields.iter().map(Entity::encode_size).sum()
    }

    fn write(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error> {
        self.fields.iter().try_for_each(|field| field.write(buf, ctx))
    }

    fn read(&mut self, buf: &mut Reader<'_>, ctx: &mut ParseContext) -> Result<(), Error> {
        self.fields
            .iter_mut()
            .try_for_each(|field| field.read(buf, ctx))
    }

    fn get(&self, arena: &Arena) -> Value {
        let mut map = Map::new();
        map.insert(ENTITY_KEY.into(), Value::String(self.def.name.clone()));
        for (name, field) in self.entries() {
            map.insert(name.to_owned(), field.get(arena));
        }
        Value::Object(map)
    }

    fn set(&mut self, value: &Value, arena: &mut Arena) -> Result<(), InvalidState> {
        self.validate(value)?;
        let Value::Object(map) = value else {
            return Ok(());
        };
        for ((name, _), field) in self.def.fields.iter().zip(&mut self.fields) {
            let value = map.get(name).unwrap_or(&Value::Null);
            field.set(value, arena).map_err(|e| e.at(name.as_str()))?;
        }
        Ok(())
    }

    fn validate(&self, value: &Value) -> Result<(), InvalidState> {
        let Value::Object(map) = value else {
            return Err(InvalidState::new(format!(
                "expected an object for {}",
                self.def.name
            )));
        };
        for (name, field) in self.entries() {
            field
                .validate(map.get(name).unwrap_or(&Value::Null))
                .map_err(|e| e.at(name))?;
        }
        Ok(())
    }

    fn strings(&self) -> Vec<&str> {
        self.fields.iter().flat_map(Entity::strings).collect()
    }

    fn visit_pointers_mut(
        &mut self,
        visit: &mut dyn FnMut(&mut dyn Pointer) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.fields
            .iter_mut()
            .try_for_each(|field| field.visit_pointers_mut(visit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::PathSegment, types::number::Number};
    use serde_json::json;

    fn item() -> Arc<StructDef> {
        StructDef::builder(0x30, "Item")
            .field("name", Primitive::StringPointer)
            .field("count", Primitive::I32)
            .field("flags", Primitive::U16)
            .field("level", Primitive::U8)
            .field("pad", Primitive::U8)
            .build()
    }

    #[test]
    fn test_new_defaults() {
        let item = Struct::new(item());
        assert_eq!(item.encode_size(), 12);
        assert_eq!(item.field("count"), Some(&AnyEntity::Number(Number::I32(0))));
        assert!(item.field("missing").is_none());
        assert_eq!(item.def().kind(), Kind::Struct(0x30));
        assert_eq!(
            item.get(&Arena::default()),
            json!({"entity": "Item", "name": null, "count": 0, "flags": 0, "level": 0, "pad": 0})
        );
    }

    #[test]
    fn test_set_get() {
        let mut arena = Arena::default();
        let mut item = Struct::new(item());
        let value = json!({"name": "sword", "count": -2, "flags": 513, "level": 7, "pad": 0});
        item.set(&value, &mut arena).unwrap();
        assert_eq!(item.string("name"), Some("sword"));
        assert_eq!(item.strings(), vec!["sword"]);

        let mut expected = value.clone();
        expected["entity"] = json!("Item");
        assert_eq!(item.get(&arena), expected);
    }

    #[test]
    fn test_set_rejected_is_atomic() {
        let mut arena = Arena::default();
        let mut item = Struct::new(item());
        let before = item.clone();

        let err = item
            .set(&json!({"name": "sword", "count": 1, "flags": 70000}), &mut arena)
            .unwrap_err();
        assert_eq!(err.path, vec![PathSegment::from("flags")]);
        assert_eq!(item, before);

        // A missing numeric field is null, which numbers reject.
        let err = item.validate(&json!({"count": 1, "flags": 1, "level": 1})).unwrap_err();
        assert_eq!(err.path, vec![PathSegment::from("pad")]);

        assert!(item.validate(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_write_read() {
        let mut arena = Arena::default();
        let mut item = Struct::new(item());
        item.set(
            &json!({"name": null, "count": 0x01020304, "flags": 0x0506, "level": 7, "pad": 8}),
            &mut arena,
        )
        .unwrap();

        let mut buf = Writer::default();
        let mut ctx = BuildContext::default();
        item.write(&mut buf, &mut ctx).unwrap();
        assert_eq!(ctx.deferred(), 1);
        ctx.resolve(&mut buf).unwrap();
        let bytes = buf.freeze();
        assert_eq!(&bytes[..], &[0, 0, 0, 0, 4, 3, 2, 1, 6, 5, 7, 8]);

        let mut read = Struct::new(self::item());
        let mut ctx = ParseContext::default();
        read.read(&mut Reader::new(&bytes), &mut ctx).unwrap();
        let mut visited = 0;
        read.visit_pointers_mut(&mut |pointer| {
            visited += 1;
            pointer.dereference(&ParseContext::default())
        })
        .unwrap();
        assert_eq!(visited, 1);
        assert_eq!(read, item);
    }
}
