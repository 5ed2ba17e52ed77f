//! Error types for container operations

use crate::{arena::ArrayId, cursor, types::Kind};
use std::fmt;
use thiserror::Error;

/// One step of the path leading to a rejected value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, ".{key}"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// A plain value that does not satisfy the schema of the entity it was given to.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub struct InvalidState {
    pub path: Vec<PathSegment>,
    pub reason: String,
}

impl InvalidState {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            reason: reason.into(),
        }
    }

    /// Prefixes the path with the segment of the enclosing value.
    pub fn at(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.insert(0, segment.into());
        self
    }
}

impl fmt::Display for InvalidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid state at $")?;
        for segment in &self.path {
            segment.fmt(f)?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Error type for container operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("not a KDM file")]
    NotAKdmFile,
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),
    #[error("malformed file at {offset:#x}: {reason}")]
    MalformedFile { offset: usize, reason: &'static str },
    #[error("unexpected end of file: {0}")]
    UnexpectedEndOfFile(#[from] cursor::Error),
    #[error("invalid {section} count: found {found}, expected {expected}")]
    InvalidCount {
        section: &'static str,
        found: usize,
        expected: usize,
    },
    #[error("invalid {what} length: {found} > {max}")]
    InvalidLength {
        what: &'static str,
        found: usize,
        max: usize,
    },
    #[error("invalid string at {offset:#x}: {source}")]
    InvalidString {
        offset: usize,
        source: std::str::Utf8Error,
    },
    #[error("unknown type: {0:?}")]
    UnknownType(Kind),
    #[error("unknown type id: {0:#04x}")]
    UnknownTypeId(u32),
    #[error("invalid parameter type: expected {expected:?}, found {found:?}")]
    InvalidParameterType { expected: Kind, found: Kind },
    #[error("invalid struct definition: {0:#04x}")]
    InvalidStructDefinition(u16),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    #[error("duplicate symbol: {0:#04x}")]
    DuplicateSymbol(u16),
    #[error("unknown array: {0:?}")]
    UnknownArray(ArrayId),
    #[error("empty array")]
    EmptyArray,
    #[error("array {0:?} does not hold structs")]
    NotAStructArray(ArrayId),
    #[error("array mixes element types: {0:?} and {1:?}")]
    MixedArray(Kind, Kind),
    #[error("invalid array size: {0} bytes")]
    InvalidArraySize(usize),
    #[error("invalid pointer: {0:#x}")]
    InvalidPointer(u32),
    #[error("unregistered string: {0:?}")]
    UnregisteredString(String),
    #[error("invalid constant: found {found:#x}, expected {expected:#x}")]
    InvalidConstant { found: u32, expected: u32 },
    #[error("invalid terminal slot at {offset:#x}: {found:#x}")]
    InvalidTerminalSlot { offset: usize, found: u32 },
    #[error(transparent)]
    InvalidState(#[from] InvalidState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_path() {
        let err = InvalidState::new("expected a number")
            .at("unknown5")
            .at(3)
            .at("maps");
        assert_eq!(
            err.path,
            vec![
                PathSegment::Key("maps".into()),
                PathSegment::Index(3),
                PathSegment::Key("unknown5".into()),
            ]
        );
        assert_eq!(
            err.to_string(),
            "invalid state at $.maps[3].unknown5: expected a number"
        );
    }

    #[test]
    fn test_invalid_state_converts() {
        let err: Error = InvalidState::new("bad").into();
        assert!(matches!(err, Error::InvalidState(InvalidState { ref reason, .. }) if reason == "bad"));
    }
}
