//! Convert `MapData` containers between their binary form and JSON.

use radiante_kdm::{header::SECTION_COUNT, Container, MapData};
use std::{fs, io::Write, path::Path};
use thiserror::Error;
use tracing::{debug, info};

/// Subcommand for KDM files
pub const CMD: &str = "kdm";

/// Decode a KDM file into JSON
pub const DECODE_CMD: &str = "decode";

/// Encode a JSON state into a KDM file
pub const ENCODE_CMD: &str = "encode";

/// Inspect the layout of a KDM file
pub const INSPECT_CMD: &str = "inspect";

/// Errors that can occur while converting KDM files
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("kdm error: {0}")]
    Kdm(#[from] radiante_kdm::Error),
}

/// Parses the `MapData` container at `input` and writes its state as pretty JSON to `output`
/// (or stdout).
pub fn decode(input: &Path, output: Option<&impl AsRef<Path>>) -> Result<(), Error> {
    let bytes = fs::read(input)?;
    let map_data = MapData::parse(&bytes)?;
    let state = map_data.get()?;
    let json = serde_json::to_string_pretty(&state)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            info!(
                input = ?input,
                output = ?path.as_ref(),
                maps = state.maps.len(),
                "decoded"
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

/// Reads a JSON state from `input`, builds the container, and writes it to `output`.
pub fn encode(input: &Path, output: &Path) -> Result<(), Error> {
    let json = fs::read(input)?;
    let value: serde_json::Value = serde_json::from_slice(&json)?;
    let mut map_data = MapData::default();
    map_data.set_value(&value)?;
    let bytes = map_data.build()?;
    fs::write(output, &bytes)?;
    info!(input = ?input, output = ?output, size = bytes.len(), "encoded");
    Ok(())
}

/// Logs the section offsets, symbols, strings, and constant of the container at `input`.
pub fn inspect(input: &Path) -> Result<(), Error> {
    let bytes = fs::read(input)?;
    let map_data = MapData::parse(&bytes)?;
    let kdm = map_data.kdm();

    let layout = kdm.layout();
    for section in 0..SECTION_COUNT {
        info!(
            section,
            start = layout.start(section),
            end = layout.end(section),
            "section"
        );
    }
    info!(
        size = bytes.len(),
        constant = kdm.constant(),
        strings = kdm.strings().len(),
        structs = kdm.registry().structs().len(),
        arrays = kdm.arrays().len(),
        tables = kdm.tables().len(),
        parameters = kdm.parameters().len(),
        "summary"
    );
    for (id, symbol) in kdm.symbols()? {
        debug!(id, ?symbol, "symbol");
    }
    for (index, string) in kdm.strings().iter().enumerate() {
        debug!(index, %string, "string");
    }
    for parameter in kdm.parameters() {
        info!(
            name = ?parameter.name(),
            value = ?parameter.value(),
            "parameter"
        );
    }
    Ok(())
}
