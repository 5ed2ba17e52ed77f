//! NUL-terminated strings padded to a word boundary.

use crate::{
    arena::Arena,
    codec::{BuildContext, Entity, ParseContext},
    cursor::{Reader, Writer},
    error::InvalidState,
    Error,
};
use serde_json::Value;

/// Size of `value` once terminated and padded.
pub fn encoded_len(value: &str) -> usize {
    (value.len() + 1).div_ceil(4) * 4
}

pub(crate) fn check(value: &str) -> Result<(), InvalidState> {
    if value.contains('\0') {
        return Err(InvalidState::new("string contains a NUL byte"));
    }
    Ok(())
}

/// A string stored inline. Every string written or read is registered by its offset so that
/// string pointers can refer to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KdmString {
    value: String,
}

impl KdmString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

impl Entity for KdmString {
    fn encode_size(&self) -> usize {
        encoded_len(&self.value)
    }

    fn write(&self, buf: &mut Writer, ctx: &mut BuildContext) -> Result<(), Error> {
        ctx.register_string(&self.value, buf.position());
        buf.write_bytes(self.value.as_bytes());
        buf.write_u8(0);
        buf.align(4);
        Ok(())
    }

    fn read(&mut self, buf: &mut Reader<'_>, ctx: &mut ParseContext) -> Result<(), Error> {
        let offset = buf.position();
        let bytes = buf.read_cstring()?;
        let value = std::str::from_utf8(bytes)
            .map_err(|source| Error::InvalidString { offset, source })?
            .to_owned();
        while buf.position() % 4 != 0 {
            let padding = buf.position();
            if buf.read_u8()? != 0 {
                return Err(Error::MalformedFile {
                    offset: padding,
                    reason: "string padding is not zero",
                });
            }
        }
        ctx.register_string(offset, value.clone());
        self.value = value;
        Ok(())
    }

    fn get(&self, _: &Arena) -> Value {
        Value::String(self.value.clone())
    }

    fn set(&mut self, value: &Value, _: &mut Arena) -> Result<(), InvalidState> {
        self.validate(value)?;
        if let Value::String(value) = value {
            self.value.clone_from(value);
        }
        Ok(())
    }

    fn validate(&self, value: &Value) -> Result<(), InvalidState> {
        match value {
            Value::String(value) => check(value),
            _ => Err(InvalidState::new("expected a string")),
        }
    }

    fn strings(&self) -> Vec<&str> {
        vec![&self.value]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("", 4)]
    #[test_case("abc", 4)]
    #[test_case("abcd", 8)]
    #[test_case("mapDataTable", 16)]
    #[test_case("mapDataTableLen", 16)]
    #[test_case("é", 4)]
    fn test_encoded_len(value: &str, expected: usize) {
        assert_eq!(encoded_len(value), expected);
        assert_eq!(KdmString::new(value).encode_size(), expected);
    }

    #[test]
    fn test_write_read() {
        let mut buf = Writer::default();
        let mut ctx = BuildContext::default();
        KdmString::new("abcd").write(&mut buf, &mut ctx).unwrap();
        KdmString::new("x").write(&mut buf, &mut ctx).unwrap();
        let bytes = buf.freeze();
        assert_eq!(&bytes[..], b"abcd\0\0\0\0x\0\0\0");

        let mut reader = Reader::new(&bytes);
        let mut ctx = ParseContext::default();
        let mut first = KdmString::default();
        first.read(&mut reader, &mut ctx).unwrap();
        let mut second = KdmString::default();
        second.read(&mut reader, &mut ctx).unwrap();
        assert_eq!(first.value(), "abcd");
        assert_eq!(second.value(), "x");
        assert_eq!(ctx.string(0), Some("abcd"));
        assert_eq!(ctx.string(8), Some("x"));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_nonzero_padding() {
        let mut reader = Reader::new(b"ab\0\x01");
        let err = KdmString::default()
            .read(&mut reader, &mut ParseContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedFile { offset: 3, .. }));
    }

    #[test]
    fn test_read_invalid_utf8() {
        let mut reader = Reader::new(b"\xff\0\0\0");
        let err = KdmString::default()
            .read(&mut reader, &mut ParseContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidString { offset: 0, .. }));
    }

    #[test]
    fn test_set_rejects_nul() {
        let mut string = KdmString::new("keep");
        assert!(string.set(&json!("a\u{0}b"), &mut Arena::default()).is_err());
        assert!(string.set(&json!(1), &mut Arena::default()).is_err());
        assert_eq!(string.value(), "keep");
        string.set(&json!("new"), &mut Arena::default()).unwrap();
        assert_eq!(string.get(&Arena::default()), json!("new"));
    }
}
