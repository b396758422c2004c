//! Encoding of DLT messages and verbose arguments.
//!
//! [`MessageBuilder`] produces the wire bytes that [`Message::decode`]
//! accepts. Producers use it to create ring-buffer records:
//!
//! ```
//! use dlt_core::{Argument, LogLevel, Message, MessageBuilder, Result};
//!
//! fn main() -> Result<()> {
//!     let bytes = MessageBuilder::log(LogLevel::Info, "APP".parse()?, "CTX".parse()?)
//!         .timestamp(1234)
//!         .argument(Argument::string("engine started"))
//!         .argument(Argument::uint32(3000).with_name("rpm").with_unit("1/min"))
//!         .build()?;
//!
//!     let message = Message::decode(&bytes, false)?;
//!     assert_eq!(message.arguments().count(), 2);
//!     Ok(())
//! }
//! ```
//!
//! [`Message::decode`]: crate::Message::decode

use alloc::borrow::Cow;
use alloc::format;
use alloc::vec::Vec;

use crate::message::argument::BaseKind;
use crate::message::{
    Argument, ExtendedHeader, FixedPoint, HeaderType, Id, LogLevel, MessageType, StorageHeader,
    TypeInfo, Value,
};
use crate::{Error, Result};

/// Type-info width code for 32-bit values.
const TYLE_32: u32 = 3;
/// Type-info width code for 64-bit values.
const TYLE_64: u32 = 4;

impl<'a> Argument<'a> {
    fn scalar(type_info: u32, value: Value<'a>) -> Self {
        Self {
            type_info: TypeInfo::from_raw(type_info),
            name: None,
            unit: None,
            fixed_point: None,
            value,
        }
    }

    pub fn bool(value: bool) -> Self {
        Self::scalar(TypeInfo::BOOL | 1, Value::Bool(value))
    }

    pub fn int32(value: i32) -> Self {
        Self::scalar(TypeInfo::SINT | TYLE_32, Value::Signed(value.into()))
    }

    pub fn int64(value: i64) -> Self {
        Self::scalar(TypeInfo::SINT | TYLE_64, Value::Signed(value.into()))
    }

    pub fn uint32(value: u32) -> Self {
        Self::scalar(TypeInfo::UINT | TYLE_32, Value::Unsigned(value.into()))
    }

    pub fn uint64(value: u64) -> Self {
        Self::scalar(TypeInfo::UINT | TYLE_64, Value::Unsigned(value.into()))
    }

    pub fn float32(value: f32) -> Self {
        Self::scalar(TypeInfo::FLOA | TYLE_32, Value::Float(value.into()))
    }

    pub fn float64(value: f64) -> Self {
        Self::scalar(TypeInfo::FLOA | TYLE_64, Value::Float(value))
    }

    /// UTF-8 string argument.
    pub fn string(value: &'a str) -> Self {
        Self::scalar(
            TypeInfo::STRG | (1 << 15),
            Value::String(Cow::Borrowed(value)),
        )
    }

    pub fn raw(value: &'a [u8]) -> Self {
        Self::scalar(TypeInfo::RAWD, Value::Raw(value))
    }

    /// Array of unsigned 32-bit integers with a single dimension.
    pub fn uint32_array(values: &[u32]) -> Result<Self> {
        let len = u16::try_from(values.len())
            .map_err(|_| Error::InvalidOption(format!("array of {} elements", values.len())))?;
        Ok(Self::scalar(
            TypeInfo::UINT | TypeInfo::ARAY | TYLE_32,
            Value::Array {
                dimensions: alloc::vec![len],
                elements: values.iter().map(|&v| Value::Unsigned(v.into())).collect(),
            },
        ))
    }

    /// Struct made of nested arguments.
    pub fn structure(entries: Vec<Argument<'a>>) -> Self {
        Self::scalar(TypeInfo::STRU, Value::Struct(entries))
    }

    /// Attach a variable name (sets the VARI flag).
    pub fn with_name(mut self, name: &'a str) -> Self {
        self.type_info = TypeInfo::from_raw(self.type_info.to_raw() | TypeInfo::VARI);
        self.name = Some(Cow::Borrowed(name));
        self
    }

    /// Attach a unit (sets the VARI flag). Only numeric kinds carry units.
    pub fn with_unit(mut self, unit: &'a str) -> Self {
        self.type_info = TypeInfo::from_raw(self.type_info.to_raw() | TypeInfo::VARI);
        self.unit = Some(Cow::Borrowed(unit));
        self
    }

    /// Attach a fixed-point scaling (sets the FIXP flag).
    pub fn with_fixed_point(mut self, fixed_point: FixedPoint) -> Self {
        self.type_info = TypeInfo::from_raw(self.type_info.to_raw() | TypeInfo::FIXP);
        self.fixed_point = Some(fixed_point);
        self
    }
}

/// Appends numbers in the payload byte order.
struct Writer<'o> {
    out: &'o mut Vec<u8>,
    big_endian: bool,
}

macro_rules! write_number {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self, value: $ty) {
            if self.big_endian {
                self.out.extend_from_slice(&value.to_be_bytes());
            } else {
                self.out.extend_from_slice(&value.to_le_bytes());
            }
        }
    };
}

impl Writer<'_> {
    write_number!(u16, u16);
    write_number!(u32, u32);
    write_number!(u64, u64);
    write_number!(u128, u128);
    write_number!(i32, i32);
    write_number!(i64, i64);
    write_number!(i128, i128);
    write_number!(f32, f32);
    write_number!(f64, f64);

    fn len(&mut self, len: usize) -> Result<()> {
        let len = u16::try_from(len)
            .map_err(|_| Error::InvalidOption(format!("field of {len} bytes exceeds 65535")))?;
        self.u16(len);
        Ok(())
    }

    /// NUL-terminated string with a preceding length.
    fn string(&mut self, text: &str) -> Result<()> {
        self.len(text.len() + 1)?;
        self.out.extend_from_slice(text.as_bytes());
        self.out.push(0);
        Ok(())
    }

    fn name(&mut self, argument: &Argument<'_>) -> Result<()> {
        if argument.type_info.has_name() {
            self.string(argument.name.as_deref().unwrap_or(""))?;
        }
        Ok(())
    }

    fn name_and_unit(&mut self, argument: &Argument<'_>) -> Result<()> {
        if argument.type_info.has_name() {
            let name = argument.name.as_deref().unwrap_or("");
            let unit = argument.unit.as_deref().unwrap_or("");
            self.len(name.len() + 1)?;
            self.len(unit.len() + 1)?;
            for text in [name, unit] {
                self.out.extend_from_slice(text.as_bytes());
                self.out.push(0);
            }
        }
        Ok(())
    }

    fn fixed_point(&mut self, argument: &Argument<'_>, width: usize) -> Result<()> {
        if !argument.type_info.has_fixed_point() {
            return Ok(());
        }
        let FixedPoint {
            quantization,
            offset,
        } = argument
            .fixed_point
            .ok_or(Error::NotPresent("fixed-point scaling"))?;
        self.f32(quantization);
        if width <= 4 {
            let offset = i32::try_from(offset)
                .map_err(|_| Error::InvalidOption(format!("offset {offset} exceeds 32 bits")))?;
            self.i32(offset);
        } else {
            self.i64(offset);
        }
        Ok(())
    }

    fn scalar(&mut self, kind: BaseKind, width: usize, value: &Value<'_>) -> Result<()> {
        let out_of_range = || {
            Error::InvalidOption(format!(
                "value {value:?} does not fit {kind:?} of {width} bytes"
            ))
        };
        match (kind, value) {
            (BaseKind::Bool, Value::Bool(b)) if width == 1 => self.out.push(u8::from(*b)),
            (BaseKind::Signed, Value::Signed(v)) => match width {
                1 => self.out.push(i8::try_from(*v).map_err(|_| out_of_range())? as u8),
                2 => {
                    let v = i16::try_from(*v).map_err(|_| out_of_range())?;
                    self.u16(v as u16);
                }
                4 => self.i32(i32::try_from(*v).map_err(|_| out_of_range())?),
                8 => self.i64(i64::try_from(*v).map_err(|_| out_of_range())?),
                16 => self.i128(*v),
                _ => return Err(out_of_range()),
            },
            (BaseKind::Unsigned, Value::Unsigned(v)) => match width {
                1 => self.out.push(u8::try_from(*v).map_err(|_| out_of_range())?),
                2 => self.u16(u16::try_from(*v).map_err(|_| out_of_range())?),
                4 => self.u32(u32::try_from(*v).map_err(|_| out_of_range())?),
                8 => self.u64(u64::try_from(*v).map_err(|_| out_of_range())?),
                16 => self.u128(*v),
                _ => return Err(out_of_range()),
            },
            (BaseKind::Float, Value::Float(v)) => match width {
                4 => self.f32(*v as f32),
                8 => self.f64(*v),
                _ => return Err(out_of_range()),
            },
            _ => return Err(out_of_range()),
        }
        Ok(())
    }

    fn argument(&mut self, argument: &Argument<'_>, depth: usize) -> Result<()> {
        if depth > crate::message::argument::MAX_NESTING_DEPTH {
            return Err(Error::InvalidOption("struct nesting too deep".into()));
        }
        let type_info = argument.type_info;
        let kind = type_info.base_kind()?;
        self.u32(type_info.to_raw());

        let mismatch = || {
            Error::InvalidOption(format!(
                "value does not match type info {:#010x}",
                type_info.to_raw()
            ))
        };

        if type_info.is_array() {
            let Value::Array {
                dimensions,
                elements,
            } = &argument.value
            else {
                return Err(mismatch());
            };
            let width = type_info.width()?;
            let count = dimensions
                .iter()
                .fold(1usize, |acc, &d| acc.saturating_mul(usize::from(d)));
            if count != elements.len() {
                return Err(Error::InvalidOption(format!(
                    "dimensions describe {count} elements, got {}",
                    elements.len()
                )));
            }
            self.len(dimensions.len())?;
            for &dimension in dimensions {
                self.u16(dimension);
            }
            self.name_and_unit(argument)?;
            self.fixed_point(argument, width)?;
            for element in elements {
                self.scalar(kind, width, element)?;
            }
            return Ok(());
        }

        match (kind, &argument.value) {
            (BaseKind::String, Value::String(text)) => {
                type_info.encoding()?;
                self.len(text.len() + 1)?;
                self.name(argument)?;
                self.out.extend_from_slice(text.as_bytes());
                self.out.push(0);
            }
            (BaseKind::Raw, Value::Raw(data)) => {
                self.len(data.len())?;
                self.name(argument)?;
                self.out.extend_from_slice(data);
            }
            (BaseKind::Trace, Value::Trace(text)) => self.string(text)?,
            (BaseKind::Struct, Value::Struct(entries)) => {
                self.len(entries.len())?;
                self.name(argument)?;
                for entry in entries {
                    self.argument(entry, depth + 1)?;
                }
            }
            (BaseKind::Bool, value) => {
                let width = type_info.width()?;
                self.name(argument)?;
                self.scalar(kind, width, value)?;
            }
            (BaseKind::Signed | BaseKind::Unsigned | BaseKind::Float, value) => {
                let width = type_info.width()?;
                self.name_and_unit(argument)?;
                self.fixed_point(argument, width)?;
                self.scalar(kind, width, value)?;
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }
}

/// Encode one verbose argument and append it to `out`.
pub fn encode_argument(argument: &Argument<'_>, big_endian: bool, out: &mut Vec<u8>) -> Result<()> {
    let start = out.len();
    let result = Writer { out, big_endian }.argument(argument, 0);
    if result.is_err() {
        out.truncate(start);
    }
    result
}

/// Builder for the wire bytes of one DLT message.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder<'a> {
    counter: u8,
    big_endian: bool,
    ecu: Option<Id>,
    session_id: Option<u32>,
    timestamp: Option<u32>,
    extended: Option<(MessageType, Id, Id)>,
    storage: Option<StorageHeader>,
    arguments: Vec<Argument<'a>>,
    non_verbose: Option<(u32, &'a [u8])>,
}

impl<'a> MessageBuilder<'a> {
    /// Message without extended header and an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log message with an extended header.
    pub fn log(level: LogLevel, app: Id, context: Id) -> Self {
        Self::new().extended(MessageType::Log(level), app, context)
    }

    /// Add an extended header.
    pub fn extended(mut self, message_type: MessageType, app: Id, context: Id) -> Self {
        self.extended = Some((message_type, app, context));
        self
    }

    pub fn counter(mut self, counter: u8) -> Self {
        self.counter = counter;
        self
    }

    /// Encode header extras and payload most significant byte first.
    pub fn big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = big_endian;
        self
    }

    pub fn ecu(mut self, ecu: Id) -> Self {
        self.ecu = Some(ecu);
        self
    }

    pub fn session_id(mut self, session_id: u32) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Timestamp in units of 0.1 ms.
    pub fn timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Prefix the message with a storage header, as in trace files.
    pub fn storage_header(mut self, storage: StorageHeader) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Append a verbose argument. Replaces any non-verbose payload.
    pub fn argument(mut self, argument: Argument<'a>) -> Self {
        self.non_verbose = None;
        self.arguments.push(argument);
        self
    }

    /// Use a non-verbose payload. Replaces any verbose arguments.
    pub fn non_verbose(mut self, message_id: u32, data: &'a [u8]) -> Self {
        self.arguments.clear();
        self.non_verbose = Some((message_id, data));
        self
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        if let Some((message_id, data)) = self.non_verbose {
            let mut writer = Writer {
                out: &mut payload,
                big_endian: self.big_endian,
            };
            writer.u32(message_id);
            payload.extend_from_slice(data);
            return Ok(payload);
        }
        for argument in &self.arguments {
            encode_argument(argument, self.big_endian, &mut payload)?;
        }
        Ok(payload)
    }

    /// Encode the message.
    ///
    /// Fails with [`Error::InvalidOption`] if the message exceeds the 16-bit
    /// length field, if more than 255 arguments are given, or if an argument
    /// value does not match its type info.
    pub fn build(&self) -> Result<Vec<u8>> {
        let payload = self.payload()?;

        let header_type = HeaderType::current()
            .with_flag(HeaderType::UEH, self.extended.is_some())
            .with_flag(HeaderType::MSBF, self.big_endian)
            .with_flag(HeaderType::WEID, self.ecu.is_some())
            .with_flag(HeaderType::WSID, self.session_id.is_some())
            .with_flag(HeaderType::WTMS, self.timestamp.is_some());

        let extended = match self.extended {
            Some((message_type, app, context)) => {
                let argument_count = u8::try_from(self.arguments.len()).map_err(|_| {
                    Error::InvalidOption(format!("{} arguments exceed 255", self.arguments.len()))
                })?;
                Some(ExtendedHeader {
                    message_type,
                    verbose: self.non_verbose.is_none(),
                    argument_count,
                    app,
                    context,
                })
            }
            None => None,
        };

        let len = crate::message::STANDARD_HEADER_SIZE
            + header_type.extra_size()
            + extended.map_or(0, |_| crate::message::EXTENDED_HEADER_SIZE)
            + payload.len();
        let len = u16::try_from(len)
            .map_err(|_| Error::InvalidOption(format!("message of {len} bytes exceeds 65535")))?;

        let mut bytes = Vec::with_capacity(usize::from(len) + 16);
        if let Some(storage) = &self.storage {
            bytes.extend_from_slice(&storage.to_bytes());
        }
        bytes.push(header_type.to_byte());
        bytes.push(self.counter);
        bytes.extend_from_slice(&len.to_be_bytes());
        if let Some(ecu) = self.ecu {
            bytes.extend_from_slice(ecu.as_bytes());
        }
        if let Some(session_id) = self.session_id {
            bytes.extend_from_slice(&session_id.to_be_bytes());
        }
        if let Some(timestamp) = self.timestamp {
            bytes.extend_from_slice(&timestamp.to_be_bytes());
        }
        if let Some(ext) = extended {
            bytes.push(ext.message_info());
            bytes.push(ext.argument_count);
            bytes.extend_from_slice(ext.app.as_bytes());
            bytes.extend_from_slice(ext.context.as_bytes());
        }
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }
}
