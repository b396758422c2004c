//! Verbose payload arguments.
//!
//! Every argument starts with a 32-bit type-info tag in the payload byte
//! order. The tag selects exactly one base kind and may add modifiers:
//!
//! | Bits | Meaning |
//! |------|---------|
//! | `0x0000F` | TYLE: value width (1 = 8 bit ... 5 = 128 bit) |
//! | `0x00010` | BOOL |
//! | `0x00020` | SINT |
//! | `0x00040` | UINT |
//! | `0x00080` | FLOA |
//! | `0x00100` | ARAY (modifier for BOOL, SINT, UINT, FLOA) |
//! | `0x00200` | STRG |
//! | `0x00400` | RAWD |
//! | `0x00800` | VARI: name (and unit) follow |
//! | `0x01000` | FIXP: quantization and offset follow |
//! | `0x02000` | TRAI |
//! | `0x04000` | STRU |
//! | `0x38000` | SCOD: string coding |

use alloc::borrow::Cow;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use super::{Message, Mode};
use crate::{Error, Result};

/// Nested structs deeper than this are reported as corrupt.
pub const MAX_NESTING_DEPTH: usize = 8;

/// Type-info tag of a verbose argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo(u32);

impl TypeInfo {
    pub const TYLE_MASK: u32 = 0x0000_000F;
    pub const BOOL: u32 = 0x0000_0010;
    pub const SINT: u32 = 0x0000_0020;
    pub const UINT: u32 = 0x0000_0040;
    pub const FLOA: u32 = 0x0000_0080;
    pub const ARAY: u32 = 0x0000_0100;
    pub const STRG: u32 = 0x0000_0200;
    pub const RAWD: u32 = 0x0000_0400;
    pub const VARI: u32 = 0x0000_0800;
    pub const FIXP: u32 = 0x0000_1000;
    pub const TRAI: u32 = 0x0000_2000;
    pub const STRU: u32 = 0x0000_4000;
    pub const SCOD_MASK: u32 = 0x0003_8000;
    const SCOD_SHIFT: u32 = 15;

    /// Create from the raw tag value.
    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw tag value.
    pub fn to_raw(self) -> u32 {
        self.0
    }

    pub fn is_array(self) -> bool {
        self.0 & Self::ARAY != 0
    }

    pub fn has_name(self) -> bool {
        self.0 & Self::VARI != 0
    }

    pub fn has_fixed_point(self) -> bool {
        self.0 & Self::FIXP != 0
    }

    /// Value width in bytes from the TYLE field.
    pub fn width(self) -> Result<usize> {
        match self.0 & Self::TYLE_MASK {
            1 => Ok(1),
            2 => Ok(2),
            3 => Ok(4),
            4 => Ok(8),
            5 => Ok(16),
            other => Err(Error::Corrupt(format!("undefined type length {other}"))),
        }
    }

    pub fn encoding(self) -> Result<StringEncoding> {
        match (self.0 & Self::SCOD_MASK) >> Self::SCOD_SHIFT {
            0 => Ok(StringEncoding::Ascii),
            1 => Ok(StringEncoding::Utf8),
            other => Err(Error::Corrupt(format!("undefined string coding {other}"))),
        }
    }

    pub(crate) fn base_kind(self) -> Result<BaseKind> {
        const KINDS: [(u32, BaseKind); 8] = [
            (TypeInfo::BOOL, BaseKind::Bool),
            (TypeInfo::SINT, BaseKind::Signed),
            (TypeInfo::UINT, BaseKind::Unsigned),
            (TypeInfo::FLOA, BaseKind::Float),
            (TypeInfo::STRG, BaseKind::String),
            (TypeInfo::RAWD, BaseKind::Raw),
            (TypeInfo::TRAI, BaseKind::Trace),
            (TypeInfo::STRU, BaseKind::Struct),
        ];
        let mut found = None;
        for (bit, kind) in KINDS {
            if self.0 & bit != 0 {
                if found.is_some() {
                    return Err(Error::Corrupt(format!(
                        "type info {:#010x} selects more than one kind",
                        self.0
                    )));
                }
                found = Some(kind);
            }
        }
        found.ok_or_else(|| Error::Corrupt(format!("type info {:#010x} has no kind", self.0)))
    }
}

/// Character set of a string argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Ascii,
    Utf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BaseKind {
    Bool,
    Signed,
    Unsigned,
    Float,
    String,
    Raw,
    Trace,
    Struct,
}

/// Scaling of a fixed-point number: `physical = raw * quantization + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPoint {
    pub quantization: f32,
    pub offset: i64,
}

/// Decoded value of one argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Bool(bool),
    Signed(i128),
    Unsigned(u128),
    Float(f64),
    String(Cow<'a, str>),
    Raw(&'a [u8]),
    /// Source location or trace info string.
    Trace(Cow<'a, str>),
    Array {
        /// Size of each dimension.
        dimensions: Vec<u16>,
        /// Elements in row-major order.
        elements: Vec<Value<'a>>,
    },
    Struct(Vec<Argument<'a>>),
}

/// One typed argument of a verbose payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument<'a> {
    pub type_info: TypeInfo,
    pub name: Option<Cow<'a, str>>,
    pub unit: Option<Cow<'a, str>>,
    pub fixed_point: Option<FixedPoint>,
    pub value: Value<'a>,
}

/// Cursor over payload bytes in the message byte order.
#[derive(Debug, Clone)]
struct Reader<'a> {
    bytes: &'a [u8],
    big_endian: bool,
}

macro_rules! read_number {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self) -> Result<$ty> {
            const SIZE: usize = core::mem::size_of::<$ty>();
            let mut raw = [0u8; SIZE];
            raw.copy_from_slice(self.take(SIZE)?);
            Ok(if self.big_endian {
                <$ty>::from_be_bytes(raw)
            } else {
                <$ty>::from_le_bytes(raw)
            })
        }
    };
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.bytes.len() {
            return Err(Error::Corrupt(format!(
                "argument needs {len} bytes, only {} left in payload",
                self.bytes.len()
            )));
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    read_number!(u8, u8);
    read_number!(u16, u16);
    read_number!(u32, u32);
    read_number!(u64, u64);
    read_number!(u128, u128);
    read_number!(i8, i8);
    read_number!(i16, i16);
    read_number!(i32, i32);
    read_number!(i64, i64);
    read_number!(i128, i128);
    read_number!(f32, f32);
    read_number!(f64, f64);

    fn text(&mut self, len: usize) -> Result<Cow<'a, str>> {
        self.take(len).map(text)
    }
}

/// Decode a string field, dropping the trailing NUL terminators.
fn text(bytes: &[u8]) -> Cow<'_, str> {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end])
}

fn read_scalar<'a>(reader: &mut Reader<'a>, kind: BaseKind, width: usize) -> Result<Value<'a>> {
    let value = match (kind, width) {
        (BaseKind::Bool, 1) => Value::Bool(reader.u8()? != 0),
        (BaseKind::Signed, 1) => Value::Signed(reader.i8()?.into()),
        (BaseKind::Signed, 2) => Value::Signed(reader.i16()?.into()),
        (BaseKind::Signed, 4) => Value::Signed(reader.i32()?.into()),
        (BaseKind::Signed, 8) => Value::Signed(reader.i64()?.into()),
        (BaseKind::Signed, 16) => Value::Signed(reader.i128()?),
        (BaseKind::Unsigned, 1) => Value::Unsigned(reader.u8()?.into()),
        (BaseKind::Unsigned, 2) => Value::Unsigned(reader.u16()?.into()),
        (BaseKind::Unsigned, 4) => Value::Unsigned(reader.u32()?.into()),
        (BaseKind::Unsigned, 8) => Value::Unsigned(reader.u64()?.into()),
        (BaseKind::Unsigned, 16) => Value::Unsigned(reader.u128()?),
        (BaseKind::Float, 4) => Value::Float(reader.f32()?.into()),
        (BaseKind::Float, 8) => Value::Float(reader.f64()?),
        _ => {
            return Err(Error::Corrupt(format!(
                "unsupported width of {width} bytes for {kind:?}"
            )));
        }
    };
    Ok(value)
}

/// Name and unit of a VARI numeric argument: both lengths precede both strings.
fn read_name_and_unit<'a>(
    reader: &mut Reader<'a>,
    type_info: TypeInfo,
) -> Result<(Option<Cow<'a, str>>, Option<Cow<'a, str>>)> {
    if !type_info.has_name() {
        return Ok((None, None));
    }
    let name_len = usize::from(reader.u16()?);
    let unit_len = usize::from(reader.u16()?);
    Ok((Some(reader.text(name_len)?), Some(reader.text(unit_len)?)))
}

fn read_name<'a>(reader: &mut Reader<'a>, type_info: TypeInfo) -> Result<Option<Cow<'a, str>>> {
    if !type_info.has_name() {
        return Ok(None);
    }
    let name_len = usize::from(reader.u16()?);
    reader.text(name_len).map(Some)
}

fn read_fixed_point(
    reader: &mut Reader<'_>,
    type_info: TypeInfo,
    width: usize,
) -> Result<Option<FixedPoint>> {
    if !type_info.has_fixed_point() {
        return Ok(None);
    }
    let quantization = reader.f32()?;
    let offset = if width <= 4 {
        reader.i32()?.into()
    } else {
        reader.i64()?
    };
    Ok(Some(FixedPoint {
        quantization,
        offset,
    }))
}

fn read_argument<'a>(reader: &mut Reader<'a>, depth: usize) -> Result<Argument<'a>> {
    if depth > MAX_NESTING_DEPTH {
        return Err(Error::Corrupt(format!(
            "struct nesting deeper than {MAX_NESTING_DEPTH} levels"
        )));
    }
    let type_info = TypeInfo::from_raw(reader.u32()?);
    let kind = type_info.base_kind()?;

    let mut argument = Argument {
        type_info,
        name: None,
        unit: None,
        fixed_point: None,
        value: Value::Bool(false),
    };

    if type_info.is_array() {
        if !matches!(
            kind,
            BaseKind::Bool | BaseKind::Signed | BaseKind::Unsigned | BaseKind::Float
        ) {
            return Err(Error::Corrupt(format!("{kind:?} arrays are not supported")));
        }
        let width = type_info.width()?;
        let dimension_count = usize::from(reader.u16()?);
        let mut dimensions = Vec::with_capacity(dimension_count.min(reader.remaining() / 2));
        let mut element_count: usize = 1;
        for _ in 0..dimension_count {
            let size = reader.u16()?;
            element_count = element_count.saturating_mul(usize::from(size));
            dimensions.push(size);
        }
        (argument.name, argument.unit) = read_name_and_unit(reader, type_info)?;
        argument.fixed_point = read_fixed_point(reader, type_info, width)?;
        if element_count.saturating_mul(width) > reader.remaining() {
            return Err(Error::Corrupt(format!(
                "array of {element_count} elements exceeds the payload"
            )));
        }
        let mut elements = Vec::with_capacity(element_count);
        for _ in 0..element_count {
            elements.push(read_scalar(reader, kind, width)?);
        }
        argument.value = Value::Array {
            dimensions,
            elements,
        };
        return Ok(argument);
    }

    match kind {
        BaseKind::String => {
            // both codings decode lossily as UTF-8; undefined codings are rejected
            type_info.encoding()?;
            let len = usize::from(reader.u16()?);
            argument.name = read_name(reader, type_info)?;
            argument.value = Value::String(reader.text(len)?);
        }
        BaseKind::Raw => {
            let len = usize::from(reader.u16()?);
            argument.name = read_name(reader, type_info)?;
            argument.value = Value::Raw(reader.take(len)?);
        }
        BaseKind::Trace => {
            let len = usize::from(reader.u16()?);
            argument.value = Value::Trace(reader.text(len)?);
        }
        BaseKind::Struct => {
            let count = usize::from(reader.u16()?);
            argument.name = read_name(reader, type_info)?;
            if count.saturating_mul(4) > reader.remaining() {
                return Err(Error::Corrupt(format!(
                    "struct of {count} entries exceeds the payload"
                )));
            }
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                entries.push(read_argument(reader, depth + 1)?);
            }
            argument.value = Value::Struct(entries);
        }
        BaseKind::Bool => {
            let width = type_info.width()?;
            argument.name = read_name(reader, type_info)?;
            argument.value = read_scalar(reader, kind, width)?;
        }
        BaseKind::Signed | BaseKind::Unsigned | BaseKind::Float => {
            let width = type_info.width()?;
            (argument.name, argument.unit) = read_name_and_unit(reader, type_info)?;
            argument.fixed_point = read_fixed_point(reader, type_info, width)?;
            argument.value = read_scalar(reader, kind, width)?;
        }
    }
    Ok(argument)
}

/// Iterator over the arguments of a verbose payload.
///
/// Yields `Err` once for the first malformed argument and then stops.
#[derive(Debug, Clone)]
pub struct Arguments<'a> {
    reader: Reader<'a>,
    failed: bool,
}

impl<'a> Arguments<'a> {
    /// Payload bytes not yet consumed.
    pub fn remaining_len(&self) -> usize {
        self.reader.remaining()
    }
}

impl<'a> Iterator for Arguments<'a> {
    type Item = Result<Argument<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.remaining() == 0 {
            return None;
        }
        match read_argument(&mut self.reader, 0) {
            Ok(argument) => Some(Ok(argument)),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl core::iter::FusedIterator for Arguments<'_> {}

impl<'a> Message<'a> {
    /// Iterate the typed arguments of a verbose payload.
    ///
    /// Non-verbose messages yield no arguments.
    pub fn arguments(&self) -> Arguments<'a> {
        let bytes = match self.mode {
            Mode::Verbose => self.payload,
            Mode::NonVerbose => &[],
        };
        Arguments {
            reader: Reader {
                bytes,
                big_endian: self.is_big_endian(),
            },
            failed: false,
        }
    }

    /// Message id and raw data of a non-verbose payload.
    pub fn non_verbose(&self) -> Result<(u32, &'a [u8])> {
        if self.mode == Mode::Verbose {
            return Err(Error::NotPresent("non-verbose message id"));
        }
        let mut reader = Reader {
            bytes: self.payload,
            big_endian: self.is_big_endian(),
        };
        if reader.remaining() < 4 {
            return Err(Error::Truncated {
                expected: 4,
                actual: reader.remaining(),
            });
        }
        let id = reader.u32()?;
        Ok((id, reader.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn reader(bytes: &[u8]) -> Reader<'_> {
        Reader {
            bytes,
            big_endian: false,
        }
    }

    fn tag(value: u32) -> [u8; 4] {
        value.to_le_bytes()
    }

    #[test]
    fn test_base_kind_must_be_unique() {
        assert!(TypeInfo::from_raw(TypeInfo::UINT | 3).base_kind().is_ok());
        assert!(TypeInfo::from_raw(TypeInfo::UINT | TypeInfo::SINT | 3).base_kind().is_err());
        assert!(TypeInfo::from_raw(3).base_kind().is_err());
    }

    #[test]
    fn test_width_and_encoding() {
        assert_eq!(TypeInfo::from_raw(5).width().unwrap(), 16);
        assert!(TypeInfo::from_raw(6).width().is_err());
        assert_eq!(
            TypeInfo::from_raw(1 << 15).encoding().unwrap(),
            StringEncoding::Utf8
        );
        assert!(TypeInfo::from_raw(2 << 15).encoding().is_err());
    }

    #[test]
    fn test_read_named_unsigned_with_unit() {
        let mut bytes = tag(TypeInfo::UINT | TypeInfo::VARI | 2).to_vec();
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.extend_from_slice(&3u16.to_le_bytes());
        bytes.extend_from_slice(b"rpm\0");
        bytes.extend_from_slice(b"1/m");
        bytes.extend_from_slice(&3000u16.to_le_bytes());

        let mut reader = reader(&bytes);
        let arg = read_argument(&mut reader, 0).unwrap();
        assert_eq!(arg.name.as_deref(), Some("rpm"));
        assert_eq!(arg.unit.as_deref(), Some("1/m"));
        assert_eq!(arg.value, Value::Unsigned(3000));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_fixed_point_offset_width() {
        let mut bytes = tag(TypeInfo::SINT | TypeInfo::FIXP | 4).to_vec();
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-10i64).to_le_bytes());
        bytes.extend_from_slice(&7i64.to_le_bytes());

        let arg = read_argument(&mut reader(&bytes), 0).unwrap();
        assert_eq!(
            arg.fixed_point,
            Some(FixedPoint {
                quantization: 0.5,
                offset: -10
            })
        );
        assert_eq!(arg.value, Value::Signed(7));
    }

    #[test]
    fn test_array_larger_than_payload_is_corrupt() {
        let mut bytes = tag(TypeInfo::UINT | TypeInfo::ARAY | 3).to_vec();
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&60000u16.to_le_bytes());
        bytes.extend_from_slice(&[0; 8]);
        assert!(matches!(
            read_argument(&mut reader(&bytes), 0),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let mut bytes = vec![];
        for _ in 0..=MAX_NESTING_DEPTH + 1 {
            bytes.extend_from_slice(&tag(TypeInfo::STRU));
            bytes.extend_from_slice(&1u16.to_le_bytes());
        }
        bytes.extend_from_slice(&tag(TypeInfo::BOOL | 1));
        bytes.push(1);
        assert!(matches!(
            read_argument(&mut reader(&bytes), 0),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn test_string_drops_terminator() {
        assert_eq!(text(b"abc\0"), "abc");
        assert_eq!(text(b"\0\0"), "");
        assert_eq!(text(b"a\0b"), "a\0b");
    }
}
