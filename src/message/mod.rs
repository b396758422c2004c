//! DLT message model.
//!
//! A [`Message`] is the in-memory view of one decoded DLT message:
//!
//! | Part | Size | Present |
//! |------|------|---------|
//! | [`StorageHeader`] | 16 bytes | frames read from trace files |
//! | [`StandardHeader`] | 4 bytes | always |
//! | [`ExtraParameters`] | 0-12 bytes | per `WEID`/`WSID`/`WTMS` flags |
//! | [`ExtendedHeader`] | 10 bytes | when the `UEH` flag is set |
//! | payload | rest of the declared length | always (may be empty) |
//!
//! Headers are copied into a small owned buffer; the payload stays a borrowed
//! view into the bytes the message was decoded from.

use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::{Error, Result};

pub mod argument;
pub mod decode;

pub use argument::{Argument, Arguments, FixedPoint, StringEncoding, TypeInfo, Value};

/// Size of the storage header that precedes every frame in a trace file.
pub const STORAGE_HEADER_SIZE: usize = 16;

/// Size of the fixed part of the standard header.
pub const STANDARD_HEADER_SIZE: usize = 4;

/// Size of the extended header.
pub const EXTENDED_HEADER_SIZE: usize = 10;

/// Marker at the start of every storage header.
pub const STORAGE_PATTERN: [u8; 4] = *b"DLT\x01";

/// The only protocol version this crate decodes.
pub const PROTOCOL_VERSION: u8 = 1;

/// A 4-character DLT identifier (ECU, application or context id).
///
/// Shorter identifiers are padded with NUL bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Id([u8; 4]);

impl Id {
    /// Create an identifier from its raw bytes.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Raw bytes including NUL padding.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Bytes up to the first NUL.
    pub fn trimmed(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(4);
        &self.0[..end]
    }

    /// Returns true if every byte is NUL.
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    pub(crate) fn read(bytes: &[u8], offset: usize) -> Self {
        let mut id = [0u8; 4];
        id.copy_from_slice(&bytes[offset..offset + 4]);
        Self(id)
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.len() > 4 {
            return Err(Error::InvalidOption(alloc::format!(
                "identifier {s:?} must be 1 to 4 characters"
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(Error::InvalidOption(alloc::format!(
                "identifier {s:?} must be printable ASCII"
            )));
        }
        let mut id = [0u8; 4];
        id[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self(id))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.trimmed() {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id(\"{self}\")")
    }
}

/// Header type byte of the standard header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderType(u8);

impl HeaderType {
    /// Bit 0: extended header follows.
    pub const UEH: u8 = 0x01;
    /// Bit 1: payload is big-endian (most significant byte first).
    pub const MSBF: u8 = 0x02;
    /// Bit 2: ECU id follows the standard header.
    pub const WEID: u8 = 0x04;
    /// Bit 3: session id follows the standard header.
    pub const WSID: u8 = 0x08;
    /// Bit 4: timestamp follows the standard header.
    pub const WTMS: u8 = 0x10;
    /// Bits 5-7: protocol version.
    pub const VERSION_MASK: u8 = 0xE0;
    const VERSION_SHIFT: u8 = 5;

    /// Create from raw byte value.
    pub fn from_byte(value: u8) -> Self {
        Self(value)
    }

    /// Get raw byte value.
    pub fn to_byte(self) -> u8 {
        self.0
    }

    /// Header type for the current protocol version without any flag set.
    pub fn current() -> Self {
        Self(PROTOCOL_VERSION << Self::VERSION_SHIFT)
    }

    /// Protocol version carried in bits 5-7.
    pub fn version(self) -> u8 {
        (self.0 & Self::VERSION_MASK) >> Self::VERSION_SHIFT
    }

    pub fn has_extended_header(self) -> bool {
        self.0 & Self::UEH != 0
    }

    pub fn is_big_endian(self) -> bool {
        self.0 & Self::MSBF != 0
    }

    pub fn with_ecu_id(self) -> bool {
        self.0 & Self::WEID != 0
    }

    pub fn with_session_id(self) -> bool {
        self.0 & Self::WSID != 0
    }

    pub fn with_timestamp(self) -> bool {
        self.0 & Self::WTMS != 0
    }

    /// Number of bytes between the fixed standard header and the extended header.
    pub fn extra_size(self) -> usize {
        let mut size = 0;
        if self.with_ecu_id() {
            size += 4;
        }
        if self.with_session_id() {
            size += 4;
        }
        if self.with_timestamp() {
            size += 4;
        }
        size
    }

    /// Set or clear a flag bit.
    pub fn with_flag(self, flag: u8, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | flag)
        } else {
            Self(self.0 & !flag)
        }
    }
}

/// Per-frame prefix in trace files: reception time and receiving ECU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageHeader {
    /// Reception time, seconds since the Unix epoch.
    pub seconds: u32,
    /// Sub-second part of the reception time.
    pub microseconds: i32,
    /// ECU the frame was received from.
    pub ecu: Id,
}

impl StorageHeader {
    /// Serialize to the 16-byte on-disk layout.
    pub fn to_bytes(&self) -> [u8; STORAGE_HEADER_SIZE] {
        let mut bytes = [0u8; STORAGE_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&STORAGE_PATTERN);
        bytes[4..8].copy_from_slice(&self.seconds.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.microseconds.to_le_bytes());
        bytes[12..16].copy_from_slice(self.ecu.as_bytes());
        bytes
    }
}

/// Fixed leading fields of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardHeader {
    pub header_type: HeaderType,
    /// Message counter, wrapping per sender.
    pub counter: u8,
    /// Length of the message from the standard header to the end of the payload.
    pub len: u16,
}

/// ECU id, session id and timestamp that may follow the standard header.
///
/// Each field is present only if the corresponding [`HeaderType`] flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtraParameters {
    pub ecu: Option<Id>,
    pub session_id: Option<u32>,
    /// Time since ECU start-up in units of 0.1 ms.
    pub timestamp: Option<u32>,
}

/// Optional header carrying message classification and identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub message_type: MessageType,
    /// Payload consists of self-describing arguments.
    pub verbose: bool,
    /// Number of arguments announced by the sender.
    pub argument_count: u8,
    pub app: Id,
    pub context: Id,
}

impl ExtendedHeader {
    /// Encode the message-info byte (verbose bit, type and subtype).
    pub fn message_info(&self) -> u8 {
        let (kind, subtype) = self.message_type.to_raw();
        (subtype << 4) | (kind << 1) | u8::from(self.verbose)
    }
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Fatal = 1,
    Error = 2,
    Warn = 3,
    Info = 4,
    Debug = 5,
    Verbose = 6,
}

/// Kind of an application trace message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TraceType {
    Variable = 1,
    FunctionIn = 2,
    FunctionOut = 3,
    State = 4,
    Vfb = 5,
}

/// Bus or channel of a network trace message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NetworkType {
    Ipc = 1,
    Can = 2,
    Flexray = 3,
    Most = 4,
    Ethernet = 5,
    SomeIp = 6,
}

/// Direction of a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlType {
    Request = 1,
    Response = 2,
    Time = 3,
}

/// Message type and subtype from the extended header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Log(LogLevel),
    AppTrace(TraceType),
    NetworkTrace(NetworkType),
    Control(ControlType),
}

impl MessageType {
    /// Decode type (bits 1-3) and subtype (bits 4-7) of a message-info byte.
    ///
    /// Values outside the defined enumerations are reported as [`Error::Corrupt`].
    pub fn from_message_info(message_info: u8) -> Result<Self> {
        let kind = (message_info >> 1) & 0x07;
        let subtype = (message_info >> 4) & 0x0F;
        let invalid = || {
            Error::Corrupt(alloc::format!(
                "undefined message subtype {subtype} for message type {kind}"
            ))
        };
        Ok(match kind {
            0 => MessageType::Log(match subtype {
                1 => LogLevel::Fatal,
                2 => LogLevel::Error,
                3 => LogLevel::Warn,
                4 => LogLevel::Info,
                5 => LogLevel::Debug,
                6 => LogLevel::Verbose,
                _ => return Err(invalid()),
            }),
            1 => MessageType::AppTrace(match subtype {
                1 => TraceType::Variable,
                2 => TraceType::FunctionIn,
                3 => TraceType::FunctionOut,
                4 => TraceType::State,
                5 => TraceType::Vfb,
                _ => return Err(invalid()),
            }),
            2 => MessageType::NetworkTrace(match subtype {
                1 => NetworkType::Ipc,
                2 => NetworkType::Can,
                3 => NetworkType::Flexray,
                4 => NetworkType::Most,
                5 => NetworkType::Ethernet,
                6 => NetworkType::SomeIp,
                _ => return Err(invalid()),
            }),
            3 => MessageType::Control(match subtype {
                1 => ControlType::Request,
                2 => ControlType::Response,
                3 => ControlType::Time,
                _ => return Err(invalid()),
            }),
            _ => {
                return Err(Error::Corrupt(alloc::format!(
                    "undefined message type {kind}"
                )));
            }
        })
    }

    /// Raw (type, subtype) pair.
    pub fn to_raw(self) -> (u8, u8) {
        match self {
            MessageType::Log(level) => (0, level as u8),
            MessageType::AppTrace(kind) => (1, kind as u8),
            MessageType::NetworkTrace(kind) => (2, kind as u8),
            MessageType::Control(kind) => (3, kind as u8),
        }
    }

    /// Name of the message type as printed in headers.
    pub fn type_name(self) -> &'static str {
        match self {
            MessageType::Log(_) => "log",
            MessageType::AppTrace(_) => "app_trace",
            MessageType::NetworkTrace(_) => "nw_trace",
            MessageType::Control(_) => "control",
        }
    }

    /// Name of the message subtype as printed in headers.
    pub fn subtype_name(self) -> &'static str {
        match self {
            MessageType::Log(level) => match level {
                LogLevel::Fatal => "fatal",
                LogLevel::Error => "error",
                LogLevel::Warn => "warn",
                LogLevel::Info => "info",
                LogLevel::Debug => "debug",
                LogLevel::Verbose => "verbose",
            },
            MessageType::AppTrace(kind) => match kind {
                TraceType::Variable => "variable",
                TraceType::FunctionIn => "func_in",
                TraceType::FunctionOut => "func_out",
                TraceType::State => "state",
                TraceType::Vfb => "vfb",
            },
            MessageType::NetworkTrace(kind) => match kind {
                NetworkType::Ipc => "ipc",
                NetworkType::Can => "can",
                NetworkType::Flexray => "flexray",
                NetworkType::Most => "most",
                NetworkType::Ethernet => "ethernet",
                NetworkType::SomeIp => "someip",
            },
            MessageType::Control(kind) => match kind {
                ControlType::Request => "request",
                ControlType::Response => "response",
                ControlType::Time => "time",
            },
        }
    }

    /// Returns true for type/subtype combinations that carry extra parameters.
    pub fn carries_extra_parameters(self) -> bool {
        matches!(
            self,
            MessageType::NetworkTrace(_)
                | MessageType::Control(ControlType::Response | ControlType::Time)
        )
    }
}

/// Payload interpretation of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Payload is a sequence of self-describing typed arguments.
    Verbose,
    /// Payload is a message id followed by an opaque blob.
    NonVerbose,
}

/// One decoded DLT message.
///
/// Created by [`Message::decode`] or [`Message::decode_with_storage_header`];
/// the payload borrows from the decoded bytes.
#[derive(Debug, Clone)]
pub struct Message<'a> {
    pub(crate) storage: Option<StorageHeader>,
    pub(crate) standard: StandardHeader,
    pub(crate) extra: ExtraParameters,
    pub(crate) extended: Option<ExtendedHeader>,
    /// Copy of every header byte, storage header included.
    pub(crate) header: Vec<u8>,
    pub(crate) payload: &'a [u8],
    pub(crate) mode: Mode,
}

impl<'a> Message<'a> {
    pub fn storage_header(&self) -> Option<&StorageHeader> {
        self.storage.as_ref()
    }

    pub fn standard_header(&self) -> &StandardHeader {
        &self.standard
    }

    pub fn extended_header(&self) -> Option<&ExtendedHeader> {
        self.extended.as_ref()
    }

    /// Raw header bytes (storage, standard, extras and extended header).
    pub fn header_bytes(&self) -> &[u8] {
        &self.header
    }

    /// Payload bytes following the headers.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_verbose(&self) -> bool {
        self.mode == Mode::Verbose
    }

    /// Returns true if the payload is encoded most significant byte first.
    pub fn is_big_endian(&self) -> bool {
        self.standard.header_type.is_big_endian()
    }

    pub fn counter(&self) -> u8 {
        self.standard.counter
    }

    /// Sender timestamp in units of 0.1 ms, if the header carries one.
    pub fn timestamp(&self) -> Option<u32> {
        self.extra.timestamp
    }

    pub fn session_id(&self) -> Option<u32> {
        self.extra.session_id
    }

    /// ECU id from the standard header, falling back to the storage header.
    pub fn ecu(&self) -> Option<Id> {
        self.extra
            .ecu
            .or_else(|| self.storage.as_ref().map(|storage| storage.ecu))
    }

    pub fn app(&self) -> Option<Id> {
        self.extended.as_ref().map(|ext| ext.app)
    }

    pub fn context(&self) -> Option<Id> {
        self.extended.as_ref().map(|ext| ext.context)
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.extended.as_ref().map(|ext| ext.message_type)
    }

    /// Number of arguments announced in the extended header.
    pub fn argument_count(&self) -> Option<u8> {
        self.extended.as_ref().map(|ext| ext.argument_count)
    }

    /// Size of all headers, storage header included.
    pub fn header_size(&self) -> usize {
        self.header.len()
    }

    /// Number of source bytes this message occupies, storage header included.
    pub fn total_len(&self) -> usize {
        self.header.len() + self.payload.len()
    }
}
