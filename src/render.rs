//! Text rendering of decoded messages.
//!
//! A rendered line consists of a header part selected by [`HeaderFields`]
//! and a payload part in one of the [`PayloadFormat`]s:
//!
//! ```text
//! 2024/03/01 12:00:00.000250       1.2345 007 ECU1 APP1 CTX1 log info V 2 engine started 3000
//! ```
//!
//! Every renderer returns [`Error::OutputTooSmall`] when the text exceeds the
//! caller's capacity, except [`PayloadFormat::AsciiLimited`] which truncates.

use alloc::format;
use alloc::string::String;
use core::fmt;
use core::ops::BitOr;

use chrono::DateTime;

use crate::message::{Argument, Message, Value};
use crate::{Error, Result};

/// Size of the DLT daemon's text buffer.
pub const DEFAULT_TEXT_CAPACITY: usize = 10024;

/// Maximum number of characters produced by [`PayloadFormat::AsciiLimited`].
pub const ASCII_LIMIT_MAX_CHARS: usize = 20;

/// Bytes per line in the mixed formats.
const MIXED_LINE_WIDTH: usize = 16;

/// Selection of header fields to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u32", into = "u32")
)]
pub struct HeaderFields(u32);

impl HeaderFields {
    pub const NONE: Self = Self(0x0000);
    /// Reception time from the storage header.
    pub const TIME: Self = Self(0x0001);
    /// Sender timestamp.
    pub const TMSTP: Self = Self(0x0002);
    pub const MSGCNT: Self = Self(0x0004);
    pub const ECUID: Self = Self(0x0008);
    pub const APID: Self = Self(0x0010);
    pub const CTID: Self = Self(0x0020);
    pub const MSGTYPE: Self = Self(0x0040);
    pub const MSGSUBTYPE: Self = Self(0x0080);
    /// Verbose/non-verbose marker.
    pub const VNVSTATUS: Self = Self(0x0100);
    pub const NOARG: Self = Self(0x0200);
    pub const ALL: Self = Self(0xFFFF);

    const DEFINED: u32 = 0x03FF;

    /// Parse a numeric mask.
    ///
    /// Accepts any combination of the defined bits and the `ALL` sentinel.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits == Self::ALL.0 || bits & !Self::DEFINED == 0 {
            Ok(Self(bits))
        } else {
            Err(Error::InvalidOption(format!(
                "header field mask {bits:#06x} contains undefined bits"
            )))
        }
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for HeaderFields {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl TryFrom<u32> for HeaderFields {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        Self::from_bits(bits)
    }
}

impl From<HeaderFields> for u32 {
    fn from(fields: HeaderFields) -> u32 {
        fields.0
    }
}

impl Default for HeaderFields {
    fn default() -> Self {
        Self::ALL
    }
}

/// Payload text format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u32", into = "u32")
)]
#[repr(u32)]
pub enum PayloadFormat {
    /// Space-separated lowercase hex bytes.
    Hex = 1,
    /// Decoded arguments.
    #[default]
    Ascii = 2,
    /// Hex and ASCII columns, lines joined with `\n`.
    MixedPlain = 3,
    /// Hex and ASCII columns, lines joined with `<BR>`.
    MixedHtml = 4,
    /// Decoded arguments truncated to [`ASCII_LIMIT_MAX_CHARS`].
    AsciiLimited = 5,
}

impl TryFrom<u32> for PayloadFormat {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Self::Hex),
            2 => Ok(Self::Ascii),
            3 => Ok(Self::MixedPlain),
            4 => Ok(Self::MixedHtml),
            5 => Ok(Self::AsciiLimited),
            _ => Err(Error::InvalidOption(format!("undefined payload format {value}"))),
        }
    }
}

impl From<PayloadFormat> for u32 {
    fn from(format: PayloadFormat) -> u32 {
        format as u32
    }
}

/// Amount of type information in ASCII output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u32", into = "u32")
)]
#[repr(u32)]
pub enum Verbosity {
    /// Values only.
    #[default]
    Normal = 0,
    /// Type labels, names and units in addition to values.
    Verbose = 1,
}

impl TryFrom<u32> for Verbosity {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Verbose),
            _ => Err(Error::InvalidOption(format!("undefined verbosity {value}"))),
        }
    }
}

impl From<Verbosity> for u32 {
    fn from(verbosity: Verbosity) -> u32 {
        verbosity as u32
    }
}

/// Rendering settings for [`render_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderOptions {
    pub fields: HeaderFields,
    pub format: PayloadFormat,
    pub verbosity: Verbosity,
    /// Maximum length of the rendered text in bytes.
    pub capacity: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            fields: HeaderFields::ALL,
            format: PayloadFormat::Ascii,
            verbosity: Verbosity::Normal,
            capacity: DEFAULT_TEXT_CAPACITY,
        }
    }
}

impl RenderOptions {
    pub fn render(&self, message: &Message<'_>) -> Result<String> {
        render_message(
            message,
            self.fields,
            self.format,
            self.verbosity,
            self.capacity,
        )
    }
}

fn check_capacity(text: String, capacity: usize) -> Result<String> {
    if text.len() > capacity {
        return Err(Error::OutputTooSmall {
            needed: text.len(),
            capacity,
        });
    }
    Ok(text)
}

/// Bytes as space-separated lowercase hex.
struct Hex<'b>(&'b [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Signed(v) => write!(f, "{v}"),
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:.6}"),
            Value::String(s) | Value::Trace(s) => f.write_str(s),
            Value::Raw(data) => write!(f, "{}", Hex(data)),
            Value::Array { elements, .. } => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Value::Struct(entries) => {
                f.write_str("{")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match entry.name.as_deref() {
                        Some(name) if !name.is_empty() => write!(f, "{name}: {}", entry.value)?,
                        _ => write!(f, "{}", entry.value)?,
                    }
                }
                f.write_str("}")
            }
        }
    }
}

fn type_label(argument: &Argument<'_>) -> String {
    let bits = argument.type_info.width().map_or(0, |width| width * 8);
    let scalar = |value: &Value<'_>| match value {
        Value::Bool(_) => String::from("bool"),
        Value::Signed(_) => format!("sint{bits}"),
        Value::Unsigned(_) => format!("uint{bits}"),
        Value::Float(_) => format!("float{bits}"),
        Value::String(_) => String::from("string"),
        Value::Raw(_) => String::from("raw"),
        Value::Trace(_) => String::from("trace"),
        Value::Struct(_) => String::from("struct"),
        Value::Array { .. } => String::from("array"),
    };
    match &argument.value {
        Value::Array { elements, .. } => match elements.first() {
            Some(first) => format!("{}[]", scalar(first)),
            None => String::from("array"),
        },
        value => scalar(value),
    }
}

/// `label name=value unit`, omitting absent parts.
struct VerboseArgument<'r, 'a>(&'r Argument<'a>);

impl fmt::Display for VerboseArgument<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let argument = self.0;
        write!(f, "{} ", type_label(argument))?;
        if let Some(name) = argument.name.as_deref().filter(|name| !name.is_empty()) {
            write!(f, "{name}=")?;
        }
        write!(f, "{}", argument.value)?;
        if let Some(unit) = argument.unit.as_deref().filter(|unit| !unit.is_empty()) {
            write!(f, " {unit}")?;
        }
        Ok(())
    }
}

fn ascii(message: &Message<'_>, verbosity: Verbosity) -> Result<String> {
    if !message.is_verbose() {
        // payloads too short for a message id are dumped as plain hex
        return Ok(match message.non_verbose() {
            Ok((id, [])) => format!("[{id}]"),
            Ok((id, data)) => format!("[{id}] {}", Hex(data)),
            Err(_) => format!("{}", Hex(message.payload())),
        });
    }
    let mut text = String::new();
    for (i, argument) in message.arguments().enumerate() {
        let argument = argument?;
        if i > 0 {
            text.push(' ');
        }
        let rendered = match verbosity {
            Verbosity::Normal => format!("{}", argument.value),
            Verbosity::Verbose => format!("{}", VerboseArgument(&argument)),
        };
        text.push_str(&rendered);
    }
    Ok(text)
}

fn mixed(payload: &[u8], html: bool) -> String {
    let separator = if html { "<BR>" } else { "\n" };
    let mut text = String::new();
    for (line, chunk) in payload.chunks(MIXED_LINE_WIDTH).enumerate() {
        if line > 0 {
            text.push_str(separator);
        }
        text.push_str(&format!("{:06x}: ", line * MIXED_LINE_WIDTH));
        for byte in chunk {
            text.push_str(&format!("{byte:02x} "));
        }
        for _ in chunk.len()..MIXED_LINE_WIDTH {
            text.push_str("   ");
        }
        for &byte in chunk {
            match byte {
                b'<' if html => text.push_str("&lt;"),
                b'>' if html => text.push_str("&gt;"),
                b'&' if html => text.push_str("&amp;"),
                0x20..=0x7E => text.push(char::from(byte)),
                _ => text.push('-'),
            }
        }
    }
    text
}

/// Render the payload of a message.
///
/// # Errors
///
/// - [`Error::OutputTooSmall`] if the text exceeds `capacity` (all formats
///   except [`PayloadFormat::AsciiLimited`])
/// - [`Error::Corrupt`] if a verbose argument cannot be decoded
pub fn render_payload(
    message: &Message<'_>,
    format: PayloadFormat,
    verbosity: Verbosity,
    capacity: usize,
) -> Result<String> {
    let text = match format {
        PayloadFormat::Hex => format!("{}", Hex(message.payload())),
        PayloadFormat::Ascii => ascii(message, verbosity)?,
        PayloadFormat::MixedPlain => mixed(message.payload(), false),
        PayloadFormat::MixedHtml => mixed(message.payload(), true),
        PayloadFormat::AsciiLimited => {
            let limit = capacity.min(ASCII_LIMIT_MAX_CHARS);
            let text = ascii(message, verbosity)?;
            let mut limited = String::with_capacity(limit);
            for c in text.chars() {
                if limited.len() + c.len_utf8() > limit {
                    break;
                }
                limited.push(c);
            }
            return Ok(limited);
        }
    };
    check_capacity(text, capacity)
}

fn reception_time(message: &Message<'_>) -> String {
    let Some(storage) = message.storage_header() else {
        return String::from("-");
    };
    match DateTime::from_timestamp(i64::from(storage.seconds), 0) {
        Some(time) => format!(
            "{}.{:06}",
            time.format("%Y/%m/%d %H:%M:%S"),
            storage.microseconds
        ),
        None => format!("{}.{:06}", storage.seconds, storage.microseconds),
    }
}

/// Render the selected header fields, separated by single spaces.
///
/// Fields come in a fixed order: time, timestamp, counter, ECU, application,
/// context, type, subtype, verbose status, argument count. Fields the message
/// does not carry render as dashes.
pub fn render_header(message: &Message<'_>, fields: HeaderFields, capacity: usize) -> Result<String> {
    let mut parts: alloc::vec::Vec<String> = alloc::vec::Vec::new();
    let extended = message.extended_header();
    let id = |id: Option<crate::Id>| match id {
        Some(id) if !id.is_empty() => format!("{id}"),
        _ => String::from("----"),
    };

    if fields.contains(HeaderFields::TIME) {
        parts.push(reception_time(message));
    }
    if fields.contains(HeaderFields::TMSTP) {
        let timestamp = message.timestamp().unwrap_or(0);
        parts.push(format!("{:10}.{:04}", timestamp / 10000, timestamp % 10000));
    }
    if fields.contains(HeaderFields::MSGCNT) {
        parts.push(format!("{:03}", message.counter()));
    }
    if fields.contains(HeaderFields::ECUID) {
        parts.push(id(message.ecu()));
    }
    if fields.contains(HeaderFields::APID) {
        parts.push(id(message.app()));
    }
    if fields.contains(HeaderFields::CTID) {
        parts.push(id(message.context()));
    }
    if fields.contains(HeaderFields::MSGTYPE) {
        parts.push(String::from(
            extended.map_or("---", |ext| ext.message_type.type_name()),
        ));
    }
    if fields.contains(HeaderFields::MSGSUBTYPE) {
        parts.push(String::from(
            extended.map_or("---", |ext| ext.message_type.subtype_name()),
        ));
    }
    if fields.contains(HeaderFields::VNVSTATUS) {
        parts.push(String::from(if message.is_verbose() { "V" } else { "N" }));
    }
    if fields.contains(HeaderFields::NOARG) {
        parts.push(extended.map_or(String::from("-"), |ext| {
            format!("{}", ext.argument_count)
        }));
    }

    check_capacity(parts.join(" "), capacity)
}

/// Render header and payload as one line, the way a console collector prints it.
pub fn render_message(
    message: &Message<'_>,
    fields: HeaderFields,
    format: PayloadFormat,
    verbosity: Verbosity,
    capacity: usize,
) -> Result<String> {
    let mut text = render_header(message, fields, capacity)?;
    if text.is_empty() {
        return render_payload(message, format, verbosity, capacity);
    }
    let remaining = capacity.saturating_sub(text.len() + 1);
    let payload = render_payload(message, format, verbosity, remaining).map_err(|err| match err {
        Error::OutputTooSmall { needed, .. } => Error::OutputTooSmall {
            needed: needed + text.len() + 1,
            capacity,
        },
        other => other,
    })?;
    text.push(' ');
    text.push_str(&payload);
    check_capacity(text, capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fields_validation() {
        assert!(HeaderFields::from_bits(0).is_ok());
        assert!(HeaderFields::from_bits(0x03FF).is_ok());
        assert!(HeaderFields::from_bits(0xFFFF).is_ok());
        assert!(matches!(
            HeaderFields::from_bits(0x0400),
            Err(Error::InvalidOption(_))
        ));
        assert!(HeaderFields::from_bits(0x1_0000).is_err());
        let fields = HeaderFields::APID | HeaderFields::CTID;
        assert!(fields.contains(HeaderFields::APID));
        assert!(!fields.contains(HeaderFields::ECUID));
    }

    #[test]
    fn test_payload_format_values() {
        assert_eq!(PayloadFormat::try_from(1).unwrap(), PayloadFormat::Hex);
        assert_eq!(PayloadFormat::try_from(5).unwrap(), PayloadFormat::AsciiLimited);
        assert!(PayloadFormat::try_from(0).is_err());
        assert!(PayloadFormat::try_from(6).is_err());
        assert_eq!(Verbosity::try_from(1).unwrap(), Verbosity::Verbose);
        assert!(Verbosity::try_from(2).is_err());
    }

    #[test]
    fn test_hex_and_mixed_lines() {
        assert_eq!(format!("{}", Hex(&[0x00, 0xAB, 0x7F])), "00 ab 7f");
        assert_eq!(format!("{}", Hex(&[])), "");

        let payload: alloc::vec::Vec<u8> = (0x41..0x41 + 18).collect();
        let text = mixed(&payload, false);
        let lines: alloc::vec::Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("000000: 41 42 "));
        assert!(lines[0].ends_with("ABCDEFGHIJKLMNOP"));
        assert!(lines[1].starts_with("000010: 51 52 "));
        assert!(lines[1].ends_with("QR"));
        assert_eq!(lines[0].len(), lines[1].len() + 14);
    }

    #[test]
    fn test_mixed_html_escapes() {
        let text = mixed(b"<a>\x01", true);
        assert!(text.ends_with("&lt;a&gt;-"));
        assert!(!mixed(&[0u8; 20], true).contains('\n'));
        assert!(mixed(&[0u8; 20], true).contains("<BR>"));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::Float(1.5)), "1.500000");
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(
            format!(
                "{}",
                Value::Array {
                    dimensions: alloc::vec![2],
                    elements: alloc::vec![Value::Signed(-1), Value::Signed(2)],
                }
            ),
            "[-1, 2]"
        );
    }
}
