//! Fixed-width numbers.

use super::Primitive;
use crate::{
    arena::Arena,
    codec::{BuildContext, Entity, ParseContext},
    cursor::{Reader, Writer},
    error::InvalidState,
    Error,
};
use serde_json::Value;

/// A little-endian number. The variant fixes the width, the payload is the current value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    F32(f32),
    I32(i32),
    I16(i16),
    U8(u8),
    U16(u16),
    U32(u32),
}

impl Number {
    pub fn primitive(&self) -> Primitive {
        match self {
            Self::F32(_) => Primitive::F32,
            Self::I32(_) => Primitive::I32,
            Self::I16(_) => Primitive::I16,
            Self::U8(_) => Primitive::U8,
            Self::U16(_) => Primitive::U16,
            Self::U32(_) => Primitive::U32,
        }
    }

    /// Converts `value` into a number of the same width, rejecting anything it cannot hold.
    fn coerce(&self, value: &Value) -> Result<Self, InvalidState> {
        Ok(match self {
            Self::F32(_) => {
                let float = value
                    .as_f64()
                    .ok_or_else(|| InvalidState::new("expected a number"))?;
                if !float.is_finite() || float.abs() > f64::from(f32::MAX) {
                    return Err(InvalidState::new(format!("{float} is out of range for f32")));
                }
                Self::F32(float as f32)
            }
            Self::I32(_) => Self::I32(integer(value, "i32")?),
            Self::I16(_) => Self::I16(integer(value, "i16")?),
            Self::U8(_) => Self::U8(integer(value, "u8")?),
            Self::U16(_) => Self::U16(integer(value, "u16")?),
            Self::U32(_) => Self::U32(integer(value, "u32")?),
        })
    }
}

fn integer<T: TryFrom<i64>>(value: &Value, name: &str) -> Result<T, InvalidState> {
    let int = match value.as_i64() {
        Some(int) => int,
        None => {
            let float = value
                .as_f64()
                .ok_or_else(|| InvalidState::new("expected a number"))?;
            if float.fract() != 0.0 || float < i64::MIN as f64 || float > i64::MAX as f64 {
                return Err(InvalidState::new(format!("{float} is not an integer")));
            }
            float as i64
        }
    };
    T::try_from(int).map_err(|_| InvalidState::new(format!("{int} is out of range for {name}")))
}

impl Entity for Number {
    fn encode_size(&self) -> usize {
        match self {
            Self::U8(_) => 1,
            Self::I16(_) | Self::U16(_) => 2,
            Self::F32(_) | Self::I32(_) | Self::U32(_) => 4,
        }
    }

    fn write(&self, buf: &mut Writer, _: &mut BuildContext) -> Result<(), Error> {
        match *self {
            Self::F32(v) => buf.write_f32(v),
            Self::I32(v) => buf.write_i32(v),
            Self::I16(v) => buf.write_i16(v),
            Self::U8(v) => buf.write_u8(v),
            Self::U16(v) => buf.write_u16(v),
            Self::U32(v) => buf.write_u32(v),
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut Reader<'_>, _: &mut ParseContext) -> Result<(), Error> {
        match self {
            Self::F32(v) => *v = buf.read_f32()?,
            Self::I32(v) => *v = buf.read_i32()?,
            Self::I16(v) => *v = buf.read_i16()?,
            Self::U8(v) => *v = buf.read_u8()?,
            Self::U16(v) => *v = buf.read_u16()?,
            Self::U32(v) => *v = buf.read_u32()?,
        }
        Ok(())
    }

    fn get(&self, _: &Arena) -> Value {
        match *self {
            // Non-finite floats have no plain representation.
            Self::F32(v) => serde_json::Number::from_f64(f64::from(v))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::I32(v) => v.into(),
            Self::I16(v) => v.into(),
            Self::U8(v) => v.into(),
            Self::U16(v) => v.into(),
            Self::U32(v) => v.into(),
        }
    }

    fn set(&mut self, value: &Value, _: &mut Arena) -> Result<(), InvalidState> {
        *self = self.coerce(value)?;
        Ok(())
    }

    fn validate(&self, value: &Value) -> Result<(), InvalidState> {
        self.coerce(value).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(Number::I32(0), json!(-5), Number::I32(-5); "i32")]
    #[test_case(Number::U8(0), json!(255), Number::U8(255); "u8 max")]
    #[test_case(Number::I16(0), json!(-32768), Number::I16(-32768); "i16 min")]
    #[test_case(Number::U32(0), json!(4294967295u32), Number::U32(u32::MAX); "u32 max")]
    #[test_case(Number::U16(0), json!(7.0), Number::U16(7); "integral float")]
    #[test_case(Number::F32(0.0), json!(1.25), Number::F32(1.25); "f32")]
    #[test_case(Number::F32(0.0), json!(3), Number::F32(3.0); "f32 from integer")]
    fn test_set(mut number: Number, value: Value, expected: Number) {
        number.set(&value, &mut Arena::default()).unwrap();
        assert_eq!(number, expected);
        assert_eq!(number.get(&Arena::default()).as_f64(), value.as_f64());
    }

    #[test_case(Number::U8(0), json!(256); "u8 overflow")]
    #[test_case(Number::U32(0), json!(-1); "u32 negative")]
    #[test_case(Number::I32(0), json!(2147483648u32); "i32 overflow")]
    #[test_case(Number::I32(0), json!(1.5); "fractional")]
    #[test_case(Number::I32(0), json!("1"); "string")]
    #[test_case(Number::I32(0), Value::Null; "null")]
    #[test_case(Number::F32(0.0), json!(1e300); "f32 overflow")]
    fn test_set_rejected(mut number: Number, value: Value) {
        let before = number;
        assert!(number.validate(&value).is_err());
        assert!(number.set(&value, &mut Arena::default()).is_err());
        assert_eq!(number, before);
    }

    #[test]
    fn test_write_read() {
        let mut buf = Writer::default();
        let mut ctx = BuildContext::default();
        for number in [Number::I16(-3), Number::F32(-0.5), Number::U8(9)] {
            number.write(&mut buf, &mut ctx).unwrap();
        }
        let bytes = buf.freeze();
        assert_eq!(bytes.len(), 7);

        let mut reader = Reader::new(&bytes);
        let mut ctx = ParseContext::default();
        let mut numbers = [Number::I16(0), Number::F32(0.0), Number::U8(0)];
        for number in &mut numbers {
            number.read(&mut reader, &mut ctx).unwrap();
        }
        assert_eq!(numbers, [Number::I16(-3), Number::F32(-0.5), Number::U8(9)]);
    }
}
