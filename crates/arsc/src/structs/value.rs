use winnow::binary::{le_u16, le_u32, u8};
use winnow::prelude::*;
use winnow::token::take;

use crate::model::{ColorFormat, ResourceId, StyledString, TextSpan, Value};
use crate::structs::string_pool::StringPool;

/// Type codes for the `data` field of a raw value record.
///
/// See: <https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=285>
pub mod value_type {
    pub const NULL: u8 = 0x00;
    pub const REFERENCE: u8 = 0x01;
    pub const ATTRIBUTE: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const FLOAT: u8 = 0x04;
    pub const DIMENSION: u8 = 0x05;
    pub const FRACTION: u8 = 0x06;
    pub const INT_DEC: u8 = 0x10;
    pub const INT_HEX: u8 = 0x11;
    pub const INT_BOOLEAN: u8 = 0x12;
    pub const INT_COLOR_ARGB8: u8 = 0x1c;
    pub const INT_COLOR_RGB8: u8 = 0x1d;
    pub const INT_COLOR_ARGB4: u8 = 0x1e;
    pub const INT_COLOR_RGB4: u8 = 0x1f;
}

/// A typed value record as it sits in the binary: `{size, res0, type, data}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawValue {
    pub size: u16,
    pub res0: u8,
    pub value_type: u8,
    pub data: u32,
}

impl RawValue {
    pub const SIZE: u16 = 8;

    pub fn parse(input: &mut &[u8]) -> ModalResult<RawValue> {
        let (size, res0, value_type, data) =
            (le_u16, u8, u8, le_u32).parse_next(input)?;

        // records from future toolchains may be larger; the known 8 bytes
        // carry everything we decode
        if size > Self::SIZE {
            let _ = take((size - Self::SIZE) as usize).parse_next(input)?;
        }

        Ok(RawValue {
            size: size.max(Self::SIZE),
            res0,
            value_type,
            data,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&Self::SIZE.to_le_bytes());
        out.push(self.res0);
        out.push(self.value_type);
        out.extend_from_slice(&self.data.to_le_bytes());
    }

    pub fn new(value_type: u8, data: u32) -> RawValue {
        RawValue {
            size: Self::SIZE,
            res0: 0,
            value_type,
            data,
        }
    }
}

/// Decode a raw record into the typed value variant, resolving string
/// indices (and their style spans) against `pool`.
pub fn decode_value(raw: &RawValue, pool: &StringPool) -> Value {
    use value_type::*;

    match raw.value_type {
        NULL => {
            if raw.data == 1 {
                Value::Empty
            } else {
                Value::Null
            }
        }
        REFERENCE => Value::Reference(ResourceId(raw.data)),
        ATTRIBUTE => Value::Attribute(ResourceId(raw.data)),
        STRING => decode_string(raw.data, pool),
        FLOAT => Value::Float(f32::from_bits(raw.data)),
        DIMENSION => Value::Dimension(raw.data),
        FRACTION => Value::Fraction(raw.data),
        INT_DEC => Value::IntDec(raw.data as i32),
        INT_HEX => Value::IntHex(raw.data),
        INT_BOOLEAN => Value::Bool(raw.data != 0),
        INT_COLOR_ARGB8 => Value::Color(ColorFormat::Argb8, raw.data),
        INT_COLOR_RGB8 => Value::Color(ColorFormat::Rgb8, raw.data),
        INT_COLOR_ARGB4 => Value::Color(ColorFormat::Argb4, raw.data),
        INT_COLOR_RGB4 => Value::Color(ColorFormat::Rgb4, raw.data),
        other => Value::Raw {
            type_code: other,
            data: raw.data,
        },
    }
}

fn decode_string(index: u32, pool: &StringPool) -> Value {
    let text = pool.get(index);

    // a pool string naming a packaged file is a file resource, not an
    // in-document value
    if text.starts_with("res/") {
        return Value::FileRef(text.to_owned());
    }

    let spans = pool
        .spans(index)
        .iter()
        .map(|span| TextSpan {
            tag: pool.get(span.tag).to_owned(),
            first: span.first,
            last: span.last,
        })
        .collect();

    Value::Text(StyledString {
        text: text.to_owned(),
        spans,
    })
}

/// Re-encode a decoded value into its raw record, for the shapes that carry
/// their payload inline. Strings and bags need pool/chunk context and return
/// `None`.
pub fn encode_value(value: &Value) -> Option<RawValue> {
    use value_type::*;

    let (value_type, data) = match value {
        Value::Null => (NULL, 0),
        Value::Empty => (NULL, 1),
        Value::Reference(id) => (REFERENCE, id.0),
        Value::Attribute(id) => (ATTRIBUTE, id.0),
        Value::Float(f) => (FLOAT, f.to_bits()),
        Value::Dimension(data) => (DIMENSION, *data),
        Value::Fraction(data) => (FRACTION, *data),
        Value::IntDec(v) => (INT_DEC, *v as u32),
        Value::IntHex(v) => (INT_HEX, *v),
        Value::Bool(true) => (INT_BOOLEAN, 1),
        Value::Bool(false) => (INT_BOOLEAN, 0),
        Value::Color(ColorFormat::Argb8, data) => (INT_COLOR_ARGB8, *data),
        Value::Color(ColorFormat::Rgb8, data) => (INT_COLOR_RGB8, *data),
        Value::Color(ColorFormat::Argb4, data) => (INT_COLOR_ARGB4, *data),
        Value::Color(ColorFormat::Rgb4, data) => (INT_COLOR_RGB4, *data),
        Value::Raw { type_code, data } => (*type_code, *data),
        Value::Text(_) | Value::FileRef(_) | Value::Bag(_) => return None,
    };

    Some(RawValue::new(value_type, data))
}

const RADIX_MULTS: [f64; 4] = [0.00390625, 3.051758e-5, 1.192093e-7, 4.656613e-10];
const DIMENSION_UNITS: [&str; 6] = ["px", "dip", "sp", "pt", "in", "mm"];
const FRACTION_UNITS: [&str; 2] = ["%", "%p"];
const COMPLEX_UNIT_MASK: u32 = 0x0f;

/// Unpack the mantissa+radix of a complex (dimension/fraction) value.
pub fn complex_to_float(data: u32) -> f64 {
    ((data & 0xFFFF_FF00) as f64) * RADIX_MULTS[((data >> 4) & 3) as usize]
}

pub fn format_dimension(data: u32) -> String {
    let unit = DIMENSION_UNITS
        .get((data & COMPLEX_UNIT_MASK) as usize)
        .unwrap_or(&"");
    format!("{}{}", complex_to_float(data), unit)
}

pub fn format_fraction(data: u32) -> String {
    let unit = FRACTION_UNITS
        .get((data & COMPLEX_UNIT_MASK) as usize)
        .unwrap_or(&"");
    format!("{}{}", complex_to_float(data) * 100f64, unit)
}

pub fn format_color(format: ColorFormat, data: u32) -> String {
    match format {
        ColorFormat::Argb8 => format!("#{:08x}", data),
        ColorFormat::Rgb8 => format!("#{:06x}", data & 0x00FF_FFFF),
        ColorFormat::Argb4 => format!(
            "#{:x}{:x}{:x}{:x}",
            (data >> 28) & 0xf,
            (data >> 20) & 0xf,
            (data >> 12) & 0xf,
            (data >> 4) & 0xf
        ),
        ColorFormat::Rgb4 => format!(
            "#{:x}{:x}{:x}",
            (data >> 20) & 0xf,
            (data >> 12) & 0xf,
            (data >> 4) & 0xf
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_parse_write_round_trip() {
        for raw in [
            RawValue::new(value_type::INT_DEC, 42),
            RawValue::new(value_type::INT_HEX, 0xdead_beef),
            RawValue::new(value_type::NULL, 0),
            RawValue::new(value_type::REFERENCE, 0x7f01_0000),
            RawValue::new(value_type::FLOAT, 1.5f32.to_bits()),
            RawValue::new(value_type::INT_COLOR_ARGB8, 0xff00_ff00),
        ] {
            let mut bytes = Vec::new();
            raw.write(&mut bytes);
            assert_eq!(bytes.len(), 8);
            let parsed = RawValue::parse(&mut &bytes[..]).unwrap();
            assert_eq!(parsed, raw);
        }
    }

    #[test]
    fn decode_encode_round_trip() {
        let pool = StringPool::default();
        for raw in [
            RawValue::new(value_type::NULL, 1),
            RawValue::new(value_type::ATTRIBUTE, 0x0101_0001),
            RawValue::new(value_type::INT_BOOLEAN, 1),
            RawValue::new(value_type::INT_DEC, u32::MAX), // -1
            RawValue::new(value_type::DIMENSION, 0x0000_1801),
            RawValue::new(value_type::INT_COLOR_RGB4, 0x00ff_8800),
            RawValue::new(0x42, 7), // unknown type survives as Raw
        ] {
            let value = decode_value(&raw, &pool);
            assert_eq!(encode_value(&value), Some(raw));
        }
    }

    #[test]
    fn oversized_record_discards_trailing_bytes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&12u16.to_le_bytes());
        bytes.push(0);
        bytes.push(value_type::INT_DEC);
        bytes.extend_from_slice(&7u32.to_le_bytes());
        bytes.extend_from_slice(&[0xAA; 4]); // forward-compat tail
        bytes.extend_from_slice(&[0x55; 2]); // next record's bytes

        let mut input = &bytes[..];
        let raw = RawValue::parse(&mut input).unwrap();
        assert_eq!(raw.data, 7);
        assert_eq!(input, &[0x55; 2]);
    }

    #[test]
    fn string_decodes_with_file_detection() {
        let pool = StringPool::from_strings(vec![
            "Hello".to_owned(),
            "res/drawable/icon.png".to_owned(),
        ]);

        let text = decode_value(&RawValue::new(value_type::STRING, 0), &pool);
        assert!(matches!(text, Value::Text(ref s) if s.text == "Hello"));

        let file = decode_value(&RawValue::new(value_type::STRING, 1), &pool);
        assert!(matches!(file, Value::FileRef(ref p) if p == "res/drawable/icon.png"));
    }

    #[test]
    fn complex_values_format_like_aapt() {
        // 24dp: mantissa 24 << 8, radix 0 (23bit), unit dip (1)
        let dp24 = (24u32 << 8) | 0x01;
        assert_eq!(format_dimension(dp24), "24dip");

        // 100%: mantissa 1 in fraction encoding: 0x7FFF... keep it simple,
        // 50% with radix 0x3 is below; here check the unit suffix selection
        let pct = (0x0000_3E00u32) | 0x30 | 0x00;
        assert!(format_fraction(pct).ends_with('%'));

        assert_eq!(format_color(ColorFormat::Argb8, 0x80ff0000), "#80ff0000");
        assert_eq!(format_color(ColorFormat::Rgb8, 0xff112233), "#112233");
        assert_eq!(format_color(ColorFormat::Argb4, 0xff884422), "#f842");
        assert_eq!(format_color(ColorFormat::Rgb4, 0x00884422), "#842");
    }
}
