use dlt_core::{
    Argument, Error, FixedPoint, LogLevel, Message, MessageBuilder, MessageType, Mode,
    NetworkType, Result, RingBuffer, TypeInfo, Value,
};

/// Verbose log message with `true` and a 4-byte raw blob, encoded by hand.
fn bool_and_raw_message() -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&(TypeInfo::BOOL | 1).to_le_bytes());
    payload.push(1);
    payload.extend_from_slice(&TypeInfo::RAWD.to_le_bytes());
    payload.extend_from_slice(&4u16.to_le_bytes());
    payload.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

    let len = (4 + 10 + payload.len()) as u16;
    let mut bytes = vec![0x21, 0x00];
    bytes.extend_from_slice(&len.to_be_bytes());
    // verbose log info, two arguments
    bytes.extend_from_slice(&[0x41, 2]);
    bytes.extend_from_slice(b"APP1CTX1");
    bytes.extend_from_slice(&payload);
    bytes
}

#[test]
fn two_argument_verbose_message() -> Result<()> {
    let bytes = bool_and_raw_message();
    let message = Message::decode(&bytes, false)?;
    assert_eq!(message.mode(), Mode::Verbose);
    assert_eq!(message.argument_count(), Some(2));

    let mut arguments = message.arguments();
    let first = arguments.next().unwrap()?;
    assert_eq!(first.value, Value::Bool(true));
    let second = arguments.next().unwrap()?;
    assert_eq!(second.value, Value::Raw(&[0xDE, 0xAD, 0xBE, 0xEF]));
    assert_eq!(arguments.remaining_len(), 0);
    assert!(arguments.next().is_none());
    Ok(())
}

#[test]
fn overlong_argument_is_corrupt_and_fuses() -> Result<()> {
    let mut bytes = bool_and_raw_message();
    // raw length field claims 200 bytes
    let raw_len_offset = bytes.len() - 6;
    bytes[raw_len_offset..raw_len_offset + 2].copy_from_slice(&200u16.to_le_bytes());

    let message = Message::decode(&bytes, false)?;
    let mut arguments = message.arguments();
    assert!(arguments.next().unwrap().is_ok());
    assert!(matches!(arguments.next(), Some(Err(Error::Corrupt(_)))));
    assert!(arguments.next().is_none());
    Ok(())
}

#[test]
fn unknown_type_info_is_corrupt() -> Result<()> {
    let mut bytes = bool_and_raw_message();
    // clear every kind bit of the first tag
    bytes[14..18].copy_from_slice(&1u32.to_le_bytes());
    let message = Message::decode(&bytes, false)?;
    let results: Vec<_> = message.arguments().collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(Error::Corrupt(_))));
    Ok(())
}

#[test]
fn truncated_source() {
    let bytes = bool_and_raw_message();
    let result = Message::decode(&bytes[..bytes.len() - 1], false);
    assert!(matches!(result, Err(Error::Truncated { .. })));
    assert!(result.unwrap_err().is_recoverable());
}

#[test]
fn undefined_message_type_is_corrupt() {
    let mut bytes = bool_and_raw_message();
    bytes[4] = 0x71; // log with subtype 7
    assert!(matches!(
        Message::decode(&bytes, false),
        Err(Error::Corrupt(_))
    ));
}

#[test]
fn builder_roundtrip_of_all_kinds() -> Result<()> {
    let nested = Argument::structure(vec![
        Argument::int32(-5).with_name("x"),
        Argument::string("inner"),
    ])
    .with_name("point");
    let bytes = MessageBuilder::log(LogLevel::Debug, "APP".parse()?, "CTX".parse()?)
        .counter(9)
        .session_id(77)
        .argument(Argument::bool(false))
        .argument(Argument::int64(-1_234_567_890_123))
        .argument(Argument::uint32(42).with_name("speed").with_unit("km/h"))
        .argument(Argument::float64(2.5))
        .argument(Argument::float32(0.25))
        .argument(Argument::string("hello"))
        .argument(Argument::raw(&[1, 2, 3]))
        .argument(Argument::uint32_array(&[7, 8, 9])?)
        .argument(
            Argument::int32(100).with_fixed_point(FixedPoint {
                quantization: 0.1,
                offset: -40,
            }),
        )
        .argument(nested)
        .build()?;

    let message = Message::decode(&bytes, false)?;
    assert_eq!(message.counter(), 9);
    assert_eq!(message.session_id(), Some(77));
    assert_eq!(message.argument_count(), Some(10));
    assert_eq!(
        message.message_type(),
        Some(MessageType::Log(LogLevel::Debug))
    );

    let arguments = message.arguments().collect::<Result<Vec<_>>>()?;
    assert_eq!(arguments.len(), 10);
    assert_eq!(arguments[0].value, Value::Bool(false));
    assert_eq!(arguments[1].value, Value::Signed(-1_234_567_890_123));
    assert_eq!(arguments[2].name.as_deref(), Some("speed"));
    assert_eq!(arguments[2].unit.as_deref(), Some("km/h"));
    assert_eq!(arguments[2].value, Value::Unsigned(42));
    assert_eq!(arguments[3].value, Value::Float(2.5));
    assert_eq!(arguments[4].value, Value::Float(0.25));
    assert_eq!(arguments[5].value, Value::String("hello".into()));
    assert_eq!(arguments[6].value, Value::Raw(&[1, 2, 3]));
    assert_eq!(
        arguments[7].value,
        Value::Array {
            dimensions: vec![3],
            elements: vec![Value::Unsigned(7), Value::Unsigned(8), Value::Unsigned(9)],
        }
    );
    assert_eq!(
        arguments[8].fixed_point,
        Some(FixedPoint {
            quantization: 0.1,
            offset: -40
        })
    );
    assert_eq!(arguments[8].value, Value::Signed(100));

    let Value::Struct(entries) = &arguments[9].value else {
        panic!("expected a struct, got {:?}", arguments[9].value);
    };
    assert_eq!(arguments[9].name.as_deref(), Some("point"));
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name.as_deref(), Some("x"));
    assert_eq!(entries[0].value, Value::Signed(-5));
    assert_eq!(entries[1].value, Value::String("inner".into()));
    Ok(())
}

#[test]
fn non_verbose_message() -> Result<()> {
    let bytes = MessageBuilder::log(LogLevel::Info, "APP".parse()?, "CTX".parse()?)
        .big_endian(true)
        .non_verbose(0x0102_0304, &[0xAA, 0xBB])
        .build()?;
    let message = Message::decode(&bytes, true)?;
    assert_eq!(message.mode(), Mode::NonVerbose);
    assert_eq!(message.arguments().count(), 0);
    assert_eq!(message.non_verbose()?, (0x0102_0304, &[0xAA, 0xBB][..]));
    Ok(())
}

#[test]
fn extra_parameters_of_network_trace() -> Result<()> {
    let bytes = MessageBuilder::new()
        .extended(
            MessageType::NetworkTrace(NetworkType::Ethernet),
            "NET".parse()?,
            "ETH".parse()?,
        )
        .ecu("ECU1".parse()?)
        .session_id(5)
        .timestamp(10_000)
        .non_verbose(1, &[])
        .build()?;
    let mut message = Message::decode(&bytes, false)?;
    let params = message.extra_parameters()?;
    assert_eq!(params.ecu, Some("ECU1".parse()?));
    assert_eq!(params.session_id, Some(5));
    assert_eq!(params.timestamp, Some(10_000));

    let mut updated = params;
    updated.ecu = Some("ECU2".parse()?);
    message.set_extra_parameters(updated)?;
    assert_eq!(message.ecu(), Some("ECU2".parse()?));
    assert_eq!(&message.header_bytes()[4..8], b"ECU2");

    let log = MessageBuilder::log(LogLevel::Info, "APP".parse()?, "CTX".parse()?)
        .timestamp(1)
        .build()?;
    let message = Message::decode(&log, false)?;
    assert!(matches!(
        message.extra_parameters(),
        Err(Error::NotPresent(_))
    ));
    Ok(())
}

#[test]
fn decode_records_drained_from_ring_buffer() -> Result<()> {
    let mut buffer = RingBuffer::new();
    buffer.init_dynamic(64, 1024, 64)?;
    for counter in 0..20u8 {
        let record = MessageBuilder::new()
            .counter(counter)
            .argument(Argument::uint32(u32::from(counter) * 1000))
            .build()?;
        buffer.push(&record)?;
    }

    let mut out = [0u8; 256];
    for counter in 0..20u8 {
        let copy = buffer.pull(&mut out)?;
        let message = Message::decode(&out[..copy.copied], true)?;
        assert_eq!(message.counter(), counter);
        assert_eq!(message.standard_header().header_type.version(), 1);
        assert!(!message.standard_header().header_type.has_extended_header());
        let argument = message.arguments().next().unwrap()?;
        assert_eq!(argument.value, Value::Unsigned(u128::from(counter) * 1000));
    }
    Ok(())
}
