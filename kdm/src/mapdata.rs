//! Map metadata: one struct per map and a sorted table of the maps that are listed.

use crate::{
    arena::Arena,
    codec::Entity,
    container::{Container, Kdm, Table},
    error::InvalidState,
    registry::Registry,
    types::{
        number::Number,
        parameter::Parameter,
        pointer::StructArrayPointer,
        structure::{Struct, StructDef},
        AnyEntity, Kind, Primitive,
    },
    Error,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const MAP_DATA_TABLE: &str = "mapDataTable";
pub const MAP_DATA_TABLE_LEN: &str = "mapDataTableLen";

/// Type id of [map_data_0x15].
pub const MAP_DATA_0X15: u16 = 0x15;

/// The struct describing a single map.
pub fn map_data_0x15() -> Arc<StructDef> {
    (0..18)
        .fold(
            StructDef::builder(MAP_DATA_0X15, "MapData0x15"),
            |builder, i| {
                let primitive = match i {
                    5 | 9 | 17 => Primitive::I32,
                    _ => Primitive::StringPointer,
                };
                builder.field(format!("unknown{i}"), primitive)
            },
        )
        .build()
}

/// Plain state of a single map.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub unknown0: Option<String>,
    pub unknown1: Option<String>,
    pub unknown2: Option<String>,
    pub unknown3: Option<String>,
    pub unknown4: Option<String>,
    pub unknown5: i32,
    pub unknown6: Option<String>,
    pub unknown7: Option<String>,
    pub unknown8: Option<String>,
    pub unknown9: i32,
    pub unknown10: Option<String>,
    pub unknown11: Option<String>,
    pub unknown12: Option<String>,
    pub unknown13: Option<String>,
    pub unknown14: Option<String>,
    pub unknown15: Option<String>,
    pub unknown16: Option<String>,
    pub unknown17: i32,
}

/// Plain state of a [MapData] container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDataState {
    /// `unknown0` of every listed map, in table order.
    pub map_data_table: Vec<String>,
    pub maps: Vec<MapEntry>,
}

/// The map metadata container.
#[derive(Clone, Debug, PartialEq)]
pub struct MapData {
    kdm: Kdm,
}

impl Default for MapData {
    fn default() -> Self {
        Self {
            kdm: Kdm::new(
                Registry::new([map_data_0x15()]),
                vec![Table::new(MAP_DATA_TABLE)],
                vec![Parameter::i32(MAP_DATA_TABLE_LEN)],
            ),
        }
    }
}

fn is_map(entity: &AnyEntity) -> bool {
    entity.kind() == Kind::Struct(MAP_DATA_0X15)
}

impl MapData {
    /// Maps stored in the container, one per array.
    pub fn maps(&self) -> impl Iterator<Item = &Struct> {
        self.kdm
            .arrays()
            .iter()
            .filter(|(_, entry)| entry.elements.iter().all(is_map))
            .filter_map(|(_, entry)| entry.elements.first().and_then(AnyEntity::as_struct))
    }

    pub fn table(&self) -> Result<&Table, Error> {
        self.kdm
            .table(MAP_DATA_TABLE)
            .ok_or_else(|| Error::UnknownTable(MAP_DATA_TABLE.into()))
    }

    fn table_mut(&mut self) -> Result<&mut Table, Error> {
        self.kdm
            .table_mut(MAP_DATA_TABLE)
            .ok_or_else(|| Error::UnknownTable(MAP_DATA_TABLE.into()))
    }

    /// `unknown0` of the map a table entry points to, or `None` for null entries.
    fn sort_key(&self, entry: &AnyEntity) -> Option<String> {
        let map = entry.as_struct_array_pointer()?.first(self.kdm.arrays())?;
        Some(map.string("unknown0").unwrap_or_default().to_owned())
    }
}

impl Container for MapData {
    type State = MapDataState;

    fn kdm(&self) -> &Kdm {
        &self.kdm
    }

    fn kdm_mut(&mut self) -> &mut Kdm {
        &mut self.kdm
    }

    fn get(&self) -> Result<MapDataState, Error> {
        let arena = self.kdm.arrays();
        let maps = self
            .maps()
            .map(|map| {
                serde_json::from_value(map.get(arena))
                    .map_err(|e| Error::from(InvalidState::new(e.to_string())))
            })
            .collect::<Result<_, _>>()?;
        let map_data_table = self
            .table()?
            .entries()
            .iter()
            .filter_map(|entry| {
                let map = entry.as_struct_array_pointer()?.first(arena)?;
                map.string("unknown0")
                    .filter(|key| !key.is_empty())
                    .map(str::to_owned)
            })
            .collect();
        Ok(MapDataState {
            map_data_table,
            maps,
        })
    }

    fn set(&mut self, state: &MapDataState) -> Result<(), Error> {
        let def = map_data_0x15();
        let mut maps = Vec::with_capacity(state.maps.len());
        for (i, map) in state.maps.iter().enumerate() {
            let value =
                serde_json::to_value(map).map_err(|e| InvalidState::new(e.to_string()))?;
            let mut entity = Struct::new(def.clone());
            entity
                .set(&value, &mut Arena::default())
                .map_err(|e| e.at(i).at("maps"))?;
            maps.push(entity);
        }

        self.kdm.clear();
        for (map, entity) in state.maps.iter().zip(maps) {
            let id = self.kdm.arrays_mut().push(vec![AnyEntity::Struct(entity)]);
            let listed = map
                .unknown0
                .as_ref()
                .is_some_and(|key| state.map_data_table.contains(key));
            if listed {
                let pointer = StructArrayPointer::new(self.kdm.arrays(), id)?;
                self.table_mut()?
                    .entries_mut()
                    .push(AnyEntity::StructArrayPointer(pointer));
            }
        }
        Ok(())
    }

    fn validate(&self, value: &Value) -> Result<(), InvalidState> {
        let Value::Object(state) = value else {
            return Err(InvalidState::new("expected an object"));
        };
        let Some(Value::Array(keys)) = state.get("map_data_table") else {
            return Err(InvalidState::new("expected an array").at("map_data_table"));
        };
        for (i, key) in keys.iter().enumerate() {
            if !key.is_string() {
                return Err(InvalidState::new("expected a string")
                    .at(i)
                    .at("map_data_table"));
            }
        }
        let Some(Value::Array(maps)) = state.get("maps") else {
            return Err(InvalidState::new("expected an array").at("maps"));
        };
        let map = Struct::new(map_data_0x15());
        for (i, value) in maps.iter().enumerate() {
            map.validate(value).map_err(|e| e.at(i).at("maps"))?;
        }
        Ok(())
    }

    /// Terminates the table with a null entry, sorts it by `unknown0` and records its length.
    fn prepare(&mut self) -> Result<(), Error> {
        let mut entries = std::mem::take(self.table_mut()?.entries_mut());
        let terminated = entries
            .last()
            .and_then(AnyEntity::as_struct_array_pointer)
            .is_some_and(StructArrayPointer::is_null);
        if !terminated {
            entries.push(AnyEntity::StructArrayPointer(StructArrayPointer::null()));
        }

        let (mut listed, unlisted): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .map(|entry| (self.sort_key(&entry), entry))
            .partition(|(key, _)| key.is_some());
        listed.sort_by(|(a, _), (b, _)| a.cmp(b));
        let entries: Vec<AnyEntity> = listed
            .into_iter()
            .chain(unlisted)
            .map(|(_, entry)| entry)
            .collect();

        let len = i32::try_from(entries.len()).map_err(|_| Error::InvalidLength {
            what: "table",
            found: entries.len(),
            max: i32::MAX as usize,
        })?;
        *self.table_mut()?.entries_mut() = entries;
        let parameter = self
            .kdm
            .parameters_mut()
            .first_mut()
            .ok_or_else(|| Error::UnknownEntity(MAP_DATA_TABLE_LEN.into()))?;
        *parameter.value_mut() = Number::I32(len);

        self.kdm.prepare()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(key: &str) -> MapEntry {
        MapEntry {
            unknown0: Some(key.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn test_definition() {
        let def = map_data_0x15();
        assert_eq!(def.fields().len(), 18);
        assert_eq!(def.fields()[0], ("unknown0".to_owned(), Primitive::StringPointer));
        assert_eq!(def.fields()[5].1, Primitive::I32);
        assert_eq!(def.fields()[9].1, Primitive::I32);
        assert_eq!(def.fields()[17], ("unknown17".to_owned(), Primitive::I32));
        assert_eq!(Struct::new(def).encode_size(), 72);
    }

    #[test]
    fn test_set_lists_only_known_keys() {
        let mut map_data = MapData::default();
        let state = MapDataState {
            map_data_table: vec!["a".into(), "missing".into()],
            maps: vec![map("a"), map("b"), MapEntry::default()],
        };
        map_data.set(&state).unwrap();
        assert_eq!(map_data.kdm().arrays().len(), 3);
        assert_eq!(map_data.table().unwrap().entries().len(), 1);
        assert_eq!(map_data.get().unwrap().map_data_table, vec!["a".to_owned()]);
        assert_eq!(map_data.get().unwrap().maps, state.maps);
    }

    #[test]
    fn test_set_replaces_document() {
        let mut map_data = MapData::default();
        map_data
            .set(&MapDataState {
                map_data_table: vec!["a".into()],
                maps: vec![map("a")],
            })
            .unwrap();
        map_data.build().unwrap();

        map_data.set(&MapDataState::default()).unwrap();
        assert!(map_data.kdm().arrays().is_empty());
        assert!(map_data.kdm().strings().is_empty());
        assert!(map_data.table().unwrap().entries().is_empty());
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let mut map_data = MapData::default();
        map_data
            .set(&MapDataState {
                map_data_table: vec!["b".into(), "a".into()],
                maps: vec![map("b"), map("a")],
            })
            .unwrap();
        map_data.prepare().unwrap();
        let prepared = map_data.clone();
        map_data.prepare().unwrap();
        assert_eq!(map_data, prepared);

        let entries = map_data.table().unwrap().entries();
        assert_eq!(entries.len(), 3);
        assert!(entries[2].as_struct_array_pointer().unwrap().is_null());
        assert_eq!(
            map_data.kdm().parameter(MAP_DATA_TABLE_LEN).unwrap().value(),
            Number::I32(3)
        );
        assert_eq!(map_data.get().unwrap().map_data_table, vec!["a", "b"]);
    }

    #[test]
    fn test_validate() {
        let map_data = MapData::default();
        let mut value = serde_json::to_value(MapDataState {
            map_data_table: vec!["a".into()],
            maps: vec![map("a")],
        })
        .unwrap();
        map_data.validate(&value).unwrap();

        value["maps"][0]["unknown9"] = json!("nine");
        let err = map_data.validate(&value).unwrap_err();
        assert_eq!(err.to_string(), "invalid state at $.maps[0].unknown9: expected a number");

        value["maps"][0]["unknown9"] = json!(9);
        value["map_data_table"][0] = json!(1);
        let err = map_data.validate(&value).unwrap_err();
        assert_eq!(err.to_string(), "invalid state at $.map_data_table[0]: expected a string");

        assert!(map_data.validate(&json!({"maps": []})).is_err());
        assert!(map_data.validate(&json!([])).is_err());
    }

    #[test]
    fn test_set_value() {
        let mut map_data = MapData::default();
        let err = map_data
            .set_value(&json!({"map_data_table": [], "maps": [{"unknown0": "a"}]}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        let mut value = serde_json::to_value(map("a")).unwrap();
        value["entity"] = json!("MapData0x15");
        map_data
            .set_value(&json!({"map_data_table": ["a"], "maps": [value]}))
            .unwrap();
        assert_eq!(map_data.get().unwrap().maps, vec![map("a")]);
    }
}
