#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use radiante_kdm::{Container, MapData, MapDataState, MapEntry};

#[derive(Arbitrary, Debug)]
struct Map {
    key: Option<String>,
    name: Option<String>,
    unknown5: i32,
    unknown9: i32,
    unknown17: i32,
    listed: bool,
}

#[derive(Arbitrary, Debug)]
struct Input {
    maps: Vec<Map>,
    constant: u32,
}

/// Strings are NUL-terminated on disk and the empty string is null.
fn text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.replace('\0', ""))
        .filter(|value| !value.is_empty())
}

fuzz_target!(|input: Input| {
    let mut state = MapDataState::default();
    for map in input.maps {
        let entry = MapEntry {
            unknown0: text(map.key),
            unknown1: text(map.name),
            unknown5: map.unknown5,
            unknown9: map.unknown9,
            unknown17: map.unknown17,
            ..Default::default()
        };
        if let (true, Some(key)) = (map.listed, &entry.unknown0) {
            state.map_data_table.push(key.clone());
        }
        state.maps.push(entry);
    }

    let mut map_data = MapData::default();
    map_data.set(&state).expect("Failed to set a valid state!");
    map_data.kdm_mut().set_constant(input.constant);
    let bytes = map_data.build().expect("Failed to build a valid state!");
    assert_eq!(bytes.len(), map_data.kdm().encode_size());

    let parsed = MapData::parse(&bytes).expect("Failed to parse a built container!");
    let got = parsed.get().expect("Failed to read a parsed container!");
    assert_eq!(got.maps, state.maps);

    let mut expected: Vec<String> = state
        .maps
        .iter()
        .filter_map(|map| map.unknown0.clone())
        .filter(|key| state.map_data_table.contains(key))
        .collect();
    expected.sort();
    assert_eq!(got.map_data_table, expected);
    assert_eq!(parsed.kdm().build().unwrap(), bytes);
});
