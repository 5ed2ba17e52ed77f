#![no_main]

use libfuzzer_sys::fuzz_target;
use radiante_kdm::{Container, MapData};

fuzz_target!(|data: &[u8]| {
    let Ok(map_data) = MapData::parse(data) else {
        return;
    };

    // Anything accepted must be written back byte for byte.
    let rebuilt = map_data
        .kdm()
        .build()
        .expect("Failed to rebuild a successfully parsed input!");
    assert_eq!(&rebuilt[..], data);
    map_data
        .get()
        .expect("Failed to read the state of a successfully parsed input!");
});
