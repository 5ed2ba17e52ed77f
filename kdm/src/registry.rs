//! Numeric type ids and the entities they identify.

use crate::{
    types::{
        structure::{Struct, StructDef},
        AnyEntity, Kind, Primitive,
    },
    Error,
};
use std::{collections::BTreeMap, sync::Arc};

pub const F32: u16 = 0x00;
pub const I32: u16 = 0x01;
pub const STRING_POINTER: u16 = 0x03;
pub const STRUCT_ARRAY_POINTER: u16 = 0x0f;

/// Maps type ids to primitives and to the struct types a container declares.
#[derive(Clone, Debug, PartialEq)]
pub struct Registry {
    primitives: BTreeMap<u16, Primitive>,
    structs: BTreeMap<u16, Arc<StructDef>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            primitives: BTreeMap::from([
                (F32, Primitive::F32),
                (I32, Primitive::I32),
                (STRING_POINTER, Primitive::StringPointer),
                (STRUCT_ARRAY_POINTER, Primitive::StructArrayPointer),
            ]),
            structs: BTreeMap::new(),
        }
    }
}

impl Registry {
    /// Creates a registry with the default primitives and the given struct types.
    pub fn new(structs: impl IntoIterator<Item = Arc<StructDef>>) -> Self {
        let mut registry = Self::default();
        for def in structs {
            registry.structs.insert(def.type_id(), def);
        }
        registry
    }

    /// Registers an additional primitive under `id`.
    pub fn with_primitive(mut self, id: u16, primitive: Primitive) -> Self {
        self.primitives.insert(id, primitive);
        self
    }

    /// The kind registered under `id`. Primitives take precedence over structs.
    pub fn kind_of(&self, id: u16) -> Option<Kind> {
        if let Some(primitive) = self.primitives.get(&id) {
            return Some(Kind::Primitive(*primitive));
        }
        self.structs.contains_key(&id).then_some(Kind::Struct(id))
    }

    /// The id `kind` is registered under.
    pub fn id_of(&self, kind: &Kind) -> Option<u16> {
        match kind {
            Kind::Primitive(primitive) => self
                .primitives
                .iter()
                .find(|(_, p)| *p == primitive)
                .map(|(id, _)| *id),
            Kind::Struct(id) => (self.kind_of(*id) == Some(*kind)).then_some(*id),
        }
    }

    /// Creates a default entity of the type registered under `id`.
    pub fn instantiate(&self, id: u16) -> Result<AnyEntity, Error> {
        if let Some(primitive) = self.primitives.get(&id) {
            return Ok(primitive.instantiate());
        }
        let def = self
            .structs
            .get(&id)
            .ok_or(Error::UnknownTypeId(id.into()))?;
        Ok(AnyEntity::Struct(Struct::new(def.clone())))
    }

    pub fn struct_def(&self, id: u16) -> Option<&Arc<StructDef>> {
        self.structs.get(&id)
    }

    /// Declared struct types, ordered by type id.
    pub fn structs(&self) -> impl ExactSizeIterator<Item = &Arc<StructDef>> {
        self.structs.values()
    }

    /// All registered kinds, ordered by type id.
    pub fn types(&self) -> BTreeMap<u16, Kind> {
        let mut types: BTreeMap<u16, Kind> = self
            .structs
            .keys()
            .map(|id| (*id, Kind::Struct(*id)))
            .collect();
        for (id, primitive) in &self.primitives {
            types.insert(*id, Kind::Primitive(*primitive));
        }
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> Arc<StructDef> {
        StructDef::builder(0x21, "Pair")
            .field("a", Primitive::I32)
            .field("b", Primitive::F32)
            .build()
    }

    #[test]
    fn test_defaults() {
        let registry = Registry::default();
        assert_eq!(registry.kind_of(0x00), Some(Kind::Primitive(Primitive::F32)));
        assert_eq!(registry.kind_of(0x01), Some(Kind::Primitive(Primitive::I32)));
        assert_eq!(
            registry.kind_of(0x03),
            Some(Kind::Primitive(Primitive::StringPointer))
        );
        assert_eq!(
            registry.kind_of(0x0f),
            Some(Kind::Primitive(Primitive::StructArrayPointer))
        );
        assert_eq!(registry.kind_of(0x02), None);
        assert_eq!(registry.id_of(&Kind::Primitive(Primitive::U8)), None);
        assert!(matches!(
            registry.instantiate(0x02),
            Err(Error::UnknownTypeId(0x02))
        ));
    }

    #[test]
    fn test_structs() {
        let registry = Registry::new([pair()]).with_primitive(0x04, Primitive::U8);
        assert_eq!(registry.id_of(&Kind::Struct(0x21)), Some(0x21));
        assert_eq!(registry.id_of(&Kind::Struct(0x22)), None);
        assert_eq!(registry.id_of(&Kind::Primitive(Primitive::U8)), Some(0x04));
        assert_eq!(registry.structs().len(), 1);
        assert_eq!(registry.struct_def(0x21), Some(&pair()));
        assert_eq!(registry.types().len(), 6);

        let AnyEntity::Struct(pair) = registry.instantiate(0x21).unwrap() else {
            panic!("expected a struct");
        };
        assert_eq!(pair.def().name(), "Pair");
    }

    #[test]
    fn test_primitives_shadow_structs() {
        let shadowed = StructDef::builder(I32, "Shadowed").build();
        let registry = Registry::new([shadowed]);
        assert_eq!(registry.kind_of(I32), Some(Kind::Primitive(Primitive::I32)));
        assert_eq!(registry.id_of(&Kind::Struct(I32)), None);
    }
}
