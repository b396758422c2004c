#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

//! # dlt-core
//!
//! Buffering, decoding, rendering and filtering of DLT (Diagnostic Log and
//! Trace) messages.
//!
//! Producers append encoded messages to a [`RingBuffer`]; a collector drains
//! the records, decodes each into a [`Message`], renders it as text and
//! selects messages with a [`FilterSet`]. Persisted trace files are replayed
//! through [`TraceFile`], which locates frames without the ring buffer.
//!
//! ## Features
//!
//! - **Ring buffer**: growable and shrinkable circular store of length-framed records
//! - **Decoding**: standard, extended and storage headers, typed verbose arguments
//! - **Rendering**: header fields and payloads as hex, ASCII or mixed text
//! - **Filtering**: ECU/application/context rules loaded from rule files
//! - **Trace files**: frame scanning with a JSON-persistable index (`std` only)
//!
//! ## Quick Start
//!
//! ```
//! use dlt_core::{
//!     Argument, FilterSet, LoadMode, LogLevel, Message, MessageBuilder, RenderOptions,
//!     Result, RingBuffer,
//! };
//!
//! fn main() -> Result<()> {
//!     let mut buffer = RingBuffer::new();
//!     buffer.init_dynamic(1024, 8192, 1024)?;
//!
//!     // Producer side
//!     let record = MessageBuilder::log(LogLevel::Info, "APP1".parse()?, "CTX1".parse()?)
//!         .ecu("ECU1".parse()?)
//!         .argument(Argument::string("hello"))
//!         .build()?;
//!     buffer.push(&record)?;
//!
//!     // Collector side
//!     let filters = FilterSet::load("ECU1 APP1", LoadMode::Strict)?;
//!     let mut out = vec![0u8; 1024];
//!     let copy = buffer.pull(&mut out)?;
//!     let message = Message::decode(&out[..copy.copied], false)?;
//!     if filters.matches(&message) {
//!         println!("{}", RenderOptions::default().render(&message)?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`buffer`] | Dynamic ring buffer of length-prefixed records |
//! | [`message`] | Message model, header decoding and argument iteration |
//! | [`builder`] | Encoding of messages and verbose arguments |
//! | [`render`] | Text rendering and numeric option parsing |
//! | [`filter`] | Filter rules and rule sets |
//! | `file` | Trace-file scanning and frame index (`std` only) |
//! | [`error`] | Error types and [`Result`] alias |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`], an alias for
//! `core::result::Result<T, Error>`. Decode failures on a single record
//! ([`Error::Corrupt`], [`Error::Truncated`]) are reported by
//! [`Error::is_recoverable`]; trace-file scanning skips such frames.
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger.

extern crate alloc;

pub mod buffer;
pub mod builder;
pub mod error;
#[cfg(feature = "std")]
pub mod file;
pub mod filter;
pub mod message;
pub mod render;

// Re-export commonly used types at the crate root
pub use buffer::{BufferConfig, RecordCopy, RingBuffer};
pub use builder::{MessageBuilder, encode_argument};
pub use error::{Error, Result};
#[cfg(feature = "std")]
pub use file::{FrameIndex, FrameLocation, TraceFile};
pub use filter::{FilterRule, FilterSet, LoadMode};
pub use message::{
    Argument, Arguments, ControlType, ExtendedHeader, ExtraParameters, FixedPoint, HeaderType, Id,
    LogLevel, Message, MessageType, Mode, NetworkType, StandardHeader, StorageHeader, TraceType,
    TypeInfo, Value,
};
pub use render::{
    HeaderFields, PayloadFormat, RenderOptions, Verbosity, render_header, render_message,
    render_payload,
};
