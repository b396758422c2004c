//! Byte-level decoding of DLT headers into a [`Message`].

use alloc::format;

use super::{
    EXTENDED_HEADER_SIZE, ExtendedHeader, ExtraParameters, HeaderType, Id, Message, MessageType,
    Mode, PROTOCOL_VERSION, STANDARD_HEADER_SIZE, STORAGE_HEADER_SIZE, STORAGE_PATTERN,
    StandardHeader, StorageHeader,
};
use crate::{Error, Result};

fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

impl<'a> Message<'a> {
    /// Decode one message starting at the standard header.
    ///
    /// `verbose_hint` selects the payload mode when the message has no
    /// extended header; otherwise the verbose bit of the extended header wins.
    ///
    /// Bytes beyond the declared message length are ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::Truncated`] if fewer bytes are available than the header declares
    /// - [`Error::Corrupt`] for an unsupported version, a declared length
    ///   shorter than the announced headers, or an undefined message type
    pub fn decode(bytes: &'a [u8], verbose_hint: bool) -> Result<Self> {
        if bytes.len() < STANDARD_HEADER_SIZE {
            return Err(Error::Truncated {
                expected: STANDARD_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let header_type = HeaderType::from_byte(bytes[0]);
        if header_type.version() != PROTOCOL_VERSION {
            return Err(Error::Corrupt(format!(
                "unsupported protocol version {}",
                header_type.version()
            )));
        }
        let standard = StandardHeader {
            header_type,
            counter: bytes[1],
            len: u16::from_be_bytes([bytes[2], bytes[3]]),
        };

        let extended_size = if header_type.has_extended_header() {
            EXTENDED_HEADER_SIZE
        } else {
            0
        };
        let header_size = STANDARD_HEADER_SIZE + header_type.extra_size() + extended_size;
        let len = usize::from(standard.len);
        if len < header_size {
            return Err(Error::Corrupt(format!(
                "declared length {len} is shorter than the {header_size} header bytes"
            )));
        }
        if bytes.len() < len {
            return Err(Error::Truncated {
                expected: len,
                actual: bytes.len(),
            });
        }

        let mut offset = STANDARD_HEADER_SIZE;
        let mut extra = ExtraParameters::default();
        if header_type.with_ecu_id() {
            extra.ecu = Some(Id::read(bytes, offset));
            offset += 4;
        }
        if header_type.with_session_id() {
            extra.session_id = Some(be_u32(bytes, offset));
            offset += 4;
        }
        if header_type.with_timestamp() {
            extra.timestamp = Some(be_u32(bytes, offset));
            offset += 4;
        }

        let extended = if header_type.has_extended_header() {
            let message_info = bytes[offset];
            Some(ExtendedHeader {
                message_type: MessageType::from_message_info(message_info)?,
                verbose: message_info & 0x01 != 0,
                argument_count: bytes[offset + 1],
                app: Id::read(bytes, offset + 2),
                context: Id::read(bytes, offset + 6),
            })
        } else {
            None
        };

        let mode = match &extended {
            Some(ext) if ext.verbose => Mode::Verbose,
            Some(_) => Mode::NonVerbose,
            None if verbose_hint => Mode::Verbose,
            None => Mode::NonVerbose,
        };

        Ok(Message {
            storage: None,
            standard,
            extra,
            extended,
            header: bytes[..header_size].to_vec(),
            payload: &bytes[header_size..len],
            mode,
        })
    }

    /// Decode a trace-file frame: a storage header followed by a message.
    pub fn decode_with_storage_header(bytes: &'a [u8], verbose_hint: bool) -> Result<Self> {
        if bytes.len() < STORAGE_HEADER_SIZE {
            return Err(Error::Truncated {
                expected: STORAGE_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes[..4] != STORAGE_PATTERN {
            return Err(Error::Corrupt(
                "storage header pattern \"DLT\\x01\" not found".into(),
            ));
        }
        let storage = StorageHeader {
            seconds: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            microseconds: i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            ecu: Id::read(bytes, 12),
        };

        let mut message = Self::decode(&bytes[STORAGE_HEADER_SIZE..], verbose_hint).map_err(
            |err| match err {
                Error::Truncated { expected, actual } => Error::Truncated {
                    expected: expected + STORAGE_HEADER_SIZE,
                    actual: actual + STORAGE_HEADER_SIZE,
                },
                other => other,
            },
        )?;
        let mut header = bytes[..STORAGE_HEADER_SIZE].to_vec();
        header.extend_from_slice(&message.header);
        message.header = header;
        message.storage = Some(storage);
        Ok(message)
    }

    fn carries_extra_parameters(&self) -> Result<()> {
        let carries = self
            .message_type()
            .is_some_and(MessageType::carries_extra_parameters);
        let flags = self.standard.header_type;
        if !carries || flags.extra_size() == 0 {
            return Err(Error::NotPresent("extra parameters"));
        }
        Ok(())
    }

    /// ECU id, session id and timestamp as an extension block.
    ///
    /// Only network-trace messages and control responses/time messages carry
    /// extra parameters, and only when the header announces the fields.
    pub fn extra_parameters(&self) -> Result<ExtraParameters> {
        self.carries_extra_parameters()?;
        Ok(self.extra)
    }

    /// Overwrite the extra parameters in the message header.
    ///
    /// `None` fields are left untouched. A value for a field the header does
    /// not carry fails with [`Error::NotPresent`] and changes nothing.
    pub fn set_extra_parameters(&mut self, params: ExtraParameters) -> Result<()> {
        self.carries_extra_parameters()?;
        let flags = self.standard.header_type;
        if params.ecu.is_some() && !flags.with_ecu_id() {
            return Err(Error::NotPresent("ECU id"));
        }
        if params.session_id.is_some() && !flags.with_session_id() {
            return Err(Error::NotPresent("session id"));
        }
        if params.timestamp.is_some() && !flags.with_timestamp() {
            return Err(Error::NotPresent("timestamp"));
        }

        let mut offset = STANDARD_HEADER_SIZE
            + if self.storage.is_some() {
                STORAGE_HEADER_SIZE
            } else {
                0
            };
        if flags.with_ecu_id() {
            if let Some(ecu) = params.ecu {
                self.header[offset..offset + 4].copy_from_slice(ecu.as_bytes());
                self.extra.ecu = Some(ecu);
            }
            offset += 4;
        }
        if flags.with_session_id() {
            if let Some(session_id) = params.session_id {
                self.header[offset..offset + 4].copy_from_slice(&session_id.to_be_bytes());
                self.extra.session_id = Some(session_id);
            }
            offset += 4;
        }
        if let Some(timestamp) = params.timestamp {
            self.header[offset..offset + 4].copy_from_slice(&timestamp.to_be_bytes());
            self.extra.timestamp = Some(timestamp);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ControlType, LogLevel, NetworkType};
    use alloc::vec;
    use alloc::vec::Vec;

    fn raw_message(htyp: u8, extras: &[u8], extended: Option<[u8; 10]>, payload: &[u8]) -> Vec<u8> {
        let ext_len = extended.map_or(0, |_| 10);
        let len = (4 + extras.len() + ext_len + payload.len()) as u16;
        let mut bytes = vec![htyp, 7];
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(extras);
        if let Some(ext) = extended {
            bytes.extend_from_slice(&ext);
        }
        bytes.extend_from_slice(payload);
        bytes
    }

    fn extended(message_info: u8) -> [u8; 10] {
        let mut ext = [0u8; 10];
        ext[0] = message_info;
        ext[1] = 1;
        ext[2..6].copy_from_slice(b"APP1");
        ext[6..10].copy_from_slice(b"CTX1");
        ext
    }

    #[test]
    fn test_decode_minimal_message() {
        let bytes = raw_message(0x20, &[], None, &[1, 2, 3]);
        let msg = Message::decode(&bytes, false).unwrap();
        assert_eq!(msg.counter(), 7);
        assert_eq!(msg.header_size(), 4);
        assert_eq!(msg.payload(), &[1, 2, 3]);
        assert_eq!(msg.mode(), Mode::NonVerbose);
        assert!(msg.extended_header().is_none());

        let msg = Message::decode(&bytes, true).unwrap();
        assert_eq!(msg.mode(), Mode::Verbose);
    }

    #[test]
    fn test_decode_all_headers() {
        let mut extras = Vec::new();
        extras.extend_from_slice(b"ECU1");
        extras.extend_from_slice(&42u32.to_be_bytes());
        extras.extend_from_slice(&12345u32.to_be_bytes());
        let htyp = 0x20 | HeaderType::UEH | HeaderType::WEID | HeaderType::WSID | HeaderType::WTMS;
        let bytes = raw_message(htyp, &extras, Some(extended(0x41)), &[9]);

        let msg = Message::decode(&bytes, false).unwrap();
        assert_eq!(msg.ecu().unwrap().trimmed(), b"ECU1");
        assert_eq!(msg.session_id(), Some(42));
        assert_eq!(msg.timestamp(), Some(12345));
        assert_eq!(msg.app().unwrap().trimmed(), b"APP1");
        assert_eq!(msg.context().unwrap().trimmed(), b"CTX1");
        assert_eq!(msg.message_type(), Some(MessageType::Log(LogLevel::Info)));
        assert_eq!(msg.argument_count(), Some(1));
        assert!(msg.is_verbose());
        assert_eq!(msg.header_size(), 26);
        assert_eq!(msg.total_len(), 27);
    }

    #[test]
    fn test_extended_header_overrides_hint() {
        let bytes = raw_message(0x21, &[], Some(extended(0x40)), &[]);
        let msg = Message::decode(&bytes, true).unwrap();
        assert_eq!(msg.mode(), Mode::NonVerbose);
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut bytes = raw_message(0x20, &[], None, &[1, 2]);
        bytes.extend_from_slice(&[0xFF; 8]);
        let msg = Message::decode(&bytes, false).unwrap();
        assert_eq!(msg.payload(), &[1, 2]);
        assert_eq!(msg.total_len(), 6);
    }

    #[test]
    fn test_truncated_message() {
        let bytes = raw_message(0x20, &[], None, &[1, 2, 3, 4]);
        assert!(matches!(
            Message::decode(&bytes[..6], false),
            Err(Error::Truncated {
                expected: 8,
                actual: 6
            })
        ));
        assert!(matches!(
            Message::decode(&bytes[..2], false),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn test_wrong_version_is_corrupt() {
        let bytes = raw_message(0x40, &[], None, &[]);
        assert!(matches!(
            Message::decode(&bytes, false),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn test_length_shorter_than_headers_is_corrupt() {
        let mut bytes = raw_message(0x21, &[], Some(extended(0x41)), &[]);
        bytes[3] = 6;
        assert!(matches!(
            Message::decode(&bytes, false),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn test_storage_header() {
        let mut bytes = StorageHeader {
            seconds: 1_700_000_000,
            microseconds: 250,
            ecu: "ECU9".parse().unwrap(),
        }
        .to_bytes()
        .to_vec();
        bytes.extend_from_slice(&raw_message(0x20, &[], None, &[5]));

        let msg = Message::decode_with_storage_header(&bytes, false).unwrap();
        let storage = msg.storage_header().unwrap();
        assert_eq!(storage.seconds, 1_700_000_000);
        assert_eq!(storage.microseconds, 250);
        assert_eq!(msg.ecu().unwrap().trimmed(), b"ECU9");
        assert_eq!(msg.header_size(), 20);
        assert_eq!(msg.total_len(), bytes.len());

        bytes[0] = b'X';
        assert!(matches!(
            Message::decode_with_storage_header(&bytes, false),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn test_extra_parameters_only_for_carrying_types() {
        let htyp = 0x20 | HeaderType::UEH | HeaderType::WEID | HeaderType::WTMS;
        let mut extras = Vec::new();
        extras.extend_from_slice(b"ECU1");
        extras.extend_from_slice(&100u32.to_be_bytes());

        let (kind, subtype) = MessageType::NetworkTrace(NetworkType::Can).to_raw();
        let bytes = raw_message(htyp, &extras, Some(extended((subtype << 4) | (kind << 1))), &[]);
        let mut msg = Message::decode(&bytes, false).unwrap();
        let params = msg.extra_parameters().unwrap();
        assert_eq!(params.timestamp, Some(100));
        assert_eq!(params.session_id, None);

        msg.set_extra_parameters(ExtraParameters {
            timestamp: Some(200),
            ..ExtraParameters::default()
        })
        .unwrap();
        assert_eq!(msg.timestamp(), Some(200));
        assert_eq!(&msg.header_bytes()[8..12], &200u32.to_be_bytes());

        assert!(matches!(
            msg.set_extra_parameters(ExtraParameters {
                session_id: Some(1),
                ..ExtraParameters::default()
            }),
            Err(Error::NotPresent(_))
        ));

        let (kind, subtype) = MessageType::Control(ControlType::Request).to_raw();
        let bytes = raw_message(htyp, &extras, Some(extended((subtype << 4) | (kind << 1))), &[]);
        let msg = Message::decode(&bytes, false).unwrap();
        assert!(matches!(msg.extra_parameters(), Err(Error::NotPresent(_))));
    }
}
