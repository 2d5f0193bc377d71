use std::sync::{Arc, Mutex};

use super::results::{OpSpecResult, OpStatus};
use super::*;
use crate::llrp::{decoder, THINGMAGIC_VENDOR_ID};
use crate::message::Message;
use crate::session::DEFAULT_LLRP_PORT;
use crate::transport::mock::{self, MockTransport};

fn scripted_session() -> (Session, Arc<Mutex<Vec<Message>>>) {
    let transport = MockTransport::new().with_responder(|msg| match message_types::response_type(msg.kind) {
        Some(r) => vec![mock::ok_response(r, msg.id)],
        None => Vec::new(),
    });
    let sent = transport.sent.clone();
    let session = Session::with_transport(
        String::from("test-reader"),
        String::from("127.0.0.1"),
        DEFAULT_LLRP_PORT,
        Box::new(transport),
    )
    .unwrap();
    (session, sent)
}

#[test]
fn test_build_access_spec_standalone() {
    let op = TagOp::Gen2Read {
        bank: GEN2_BANK_TID,
        word_address: 0,
        word_count: 4,
        access_password: 0,
    };
    let buf = build_access_spec(1234, 3, TagProtocol::Gen2, None, 0, &op, 11, true).unwrap();
    let spec = decoder::find_param(&buf, parameter_types::ACCESS_SPEC).unwrap();
    assert_eq!(1234, decoder::read_u32(spec.value, 0).unwrap());
    assert_eq!(3, decoder::read_u16(spec.value, 4).unwrap());
    assert_eq!(TagProtocol::Gen2.protocol_id(), spec.value[6]);
    assert_eq!(0, spec.value[7]); // disabled until enabled
    assert_eq!(0, decoder::read_u32(spec.value, 8).unwrap());

    // one execution, then the spec retires itself
    let stop = decoder::find_param(&spec.value[12..], parameter_types::ACCESS_SPEC_STOP_TRIGGER).unwrap();
    assert_eq!(ACCESS_STOP_OPERATION_COUNT, stop.value[0]);
    assert_eq!(1, decoder::read_u16(stop.value, 1).unwrap());

    let command = decoder::find_param(&spec.value[12..], parameter_types::ACCESS_COMMAND).unwrap();
    let tag_spec = decoder::find_param(command.value, parameter_types::C1G2_TAG_SPEC).unwrap();
    let target = decoder::find_param(tag_spec.value, parameter_types::C1G2_TARGET_TAG).unwrap();
    // zero length mask matches every tag
    assert_eq!((GEN2_BANK_EPC << 6) | (1 << 5), target.value[0]);
    assert_eq!(0, decoder::read_u16(target.value, 3).unwrap());

    let read = decoder::find_param(command.value, parameter_types::C1G2_READ).unwrap();
    assert_eq!(11, decoder::read_u16(read.value, 0).unwrap());
    assert_eq!(0, decoder::read_u32(read.value, 2).unwrap());
    assert_eq!((GEN2_BANK_TID & 0x03) << 6, read.value[6]);
    assert_eq!(0, decoder::read_u16(read.value, 7).unwrap());
    assert_eq!(4, decoder::read_u16(read.value, 9).unwrap());
}

#[test]
fn test_build_access_spec_embedded() {
    let op = TagOp::Gen2Kill { kill_password: 0xDEADBEEF };
    let buf = build_access_spec(55, ANTENNA_ALL, TagProtocol::Gen2, None, 77, &op, 12, false).unwrap();
    let spec = decoder::find_param(&buf, parameter_types::ACCESS_SPEC).unwrap();
    assert_eq!(ANTENNA_ALL, decoder::read_u16(spec.value, 4).unwrap());
    assert_eq!(77, decoder::read_u32(spec.value, 8).unwrap());
    // unbounded: runs against every matching tag the rospec singulates
    let stop = decoder::find_param(&spec.value[12..], parameter_types::ACCESS_SPEC_STOP_TRIGGER).unwrap();
    assert_eq!(ACCESS_STOP_NULL, stop.value[0]);
    assert_eq!(0, decoder::read_u16(stop.value, 1).unwrap());

    let command = decoder::find_param(&spec.value[12..], parameter_types::ACCESS_COMMAND).unwrap();
    let kill = decoder::find_param(command.value, parameter_types::C1G2_KILL).unwrap();
    assert_eq!(12, decoder::read_u16(kill.value, 0).unwrap());
    assert_eq!(0xDEADBEEF, decoder::read_u32(kill.value, 2).unwrap());
}

#[test]
fn test_build_access_spec_epc_filter() {
    let epc = vec![0x30, 0x31, 0x32, 0x33];
    let filter = TagFilter::TagData { epc: epc.clone() };
    let op = TagOp::Gen2Write {
        bank: GEN2_BANK_USER,
        word_address: 2,
        data: vec![0xCAFE, 0xF00D],
        access_password: 7,
    };
    let buf = build_access_spec(1, 1, TagProtocol::Gen2, Some(&filter), 0, &op, 13, true).unwrap();
    let spec = decoder::find_param(&buf, parameter_types::ACCESS_SPEC).unwrap();
    let command = decoder::find_param(&spec.value[12..], parameter_types::ACCESS_COMMAND).unwrap();
    let tag_spec = decoder::find_param(command.value, parameter_types::C1G2_TAG_SPEC).unwrap();
    let target = decoder::find_param(tag_spec.value, parameter_types::C1G2_TARGET_TAG).unwrap();
    // epc match starts past the crc and pc words
    assert_eq!(32, decoder::read_u16(target.value, 1).unwrap());
    assert_eq!((epc.len() * 8) as u16, decoder::read_u16(target.value, 3).unwrap());
    assert_eq!(epc, target.value[5..5 + epc.len()].to_vec());

    let write = decoder::find_param(command.value, parameter_types::C1G2_WRITE).unwrap();
    assert_eq!(13, decoder::read_u16(write.value, 0).unwrap());
    assert_eq!(7, decoder::read_u32(write.value, 2).unwrap());
    assert_eq!((GEN2_BANK_USER & 0x03) << 6, write.value[6]);
    assert_eq!(2, decoder::read_u16(write.value, 7).unwrap());
    assert_eq!(2, decoder::read_u16(write.value, 9).unwrap());
    assert_eq!(0xCAFE, decoder::read_u16(write.value, 11).unwrap());
    assert_eq!(0xF00D, decoder::read_u16(write.value, 13).unwrap());
}

#[test]
fn test_iso_ops_encode_as_custom_parameters() {
    let op = TagOp::Iso180006bWrite {
        byte_address: 0x10,
        data: vec![0x01, 0x02],
    };
    let buf = build_access_spec(9, 1, TagProtocol::Iso180006b, None, 0, &op, 14, true).unwrap();
    let spec = decoder::find_param(&buf, parameter_types::ACCESS_SPEC).unwrap();
    assert_eq!(TagProtocol::Iso180006b.protocol_id(), spec.value[6]);
    let command = decoder::find_param(&spec.value[12..], parameter_types::ACCESS_COMMAND).unwrap();
    let mut subtypes = Vec::new();
    for p in decoder::params(command.value) {
        let p = p.unwrap();
        assert_eq!(parameter_types::CUSTOM_PARAMETER, p.kind);
        let (vendor, subtype, value) = decoder::custom_subtype(&p).unwrap();
        assert_eq!(THINGMAGIC_VENDOR_ID, vendor);
        if subtype == parameter_types::TM_ISO_180006B_WRITE {
            assert_eq!(14, decoder::read_u16(value, 0).unwrap());
            assert_eq!(0x10, value[2]);
            assert_eq!(2, value[3]);
            assert_eq!(vec![0x01, 0x02], value[4..].to_vec());
        }
        subtypes.push(subtype);
    }
    assert_eq!(
        vec![parameter_types::TM_ISO_180006B_TAG_PATTERN, parameter_types::TM_ISO_180006B_WRITE],
        subtypes
    );
}

#[test]
fn test_iso_rejects_gen2_select_filter() {
    let filter = TagFilter::Gen2Select {
        bank: 1,
        bit_pointer: 32,
        mask: vec![0xFF],
        bit_length: 8,
    };
    let op = TagOp::Iso180006bLock { byte_address: 0 };
    let result = build_access_spec(1, 1, TagProtocol::Iso180006b, Some(&filter), 0, &op, 1, true);
    match result {
        Err(ReaderError::Unsupported(_)) => (),
        other => panic!("expected an unsupported filter error, got {other:?}"),
    }
}

#[test]
fn test_op_validation() {
    assert!(TagOp::Gen2Read { bank: 4, word_address: 0, word_count: 1, access_password: 0 }
        .validate()
        .is_err());
    assert!(TagOp::Gen2Lock { privilege: 4, data_field: 0, access_password: 0 }
        .validate()
        .is_err());
    assert!(TagOp::Gen2Lock { privilege: 0, data_field: 5, access_password: 0 }
        .validate()
        .is_err());
    assert!(TagOp::Gen2Lock { privilege: 3, data_field: 4, access_password: 0 }
        .validate()
        .is_ok());
    assert!(TagOp::Iso180006bRead { byte_address: 0, length: 8 }.validate().is_ok());
}

#[test]
fn test_unsupported_protocols_rejected() {
    let (mut session, sent) = scripted_session();
    let op = TagOp::Gen2Read {
        bank: GEN2_BANK_EPC,
        word_address: 0,
        word_count: 1,
        access_password: 0,
    };
    for protocol in [TagProtocol::Ipx64, TagProtocol::Ipx256] {
        match session.add_access_spec(protocol, None, 0, &op, true) {
            Err(ReaderError::Unsupported(_)) => (),
            other => panic!("expected an unsupported protocol error, got {other:?}"),
        }
    }
    // a gen2 op cannot ride under the iso protocol either
    match session.add_access_spec(TagProtocol::Iso180006b, None, 0, &op, true) {
        Err(ReaderError::Unsupported(_)) => (),
        other => panic!("expected a protocol mismatch error, got {other:?}"),
    }
    // nothing was put on the wire for any of them
    assert!(sent.lock().unwrap().is_empty());
    session.disconnect().unwrap();
}

#[test]
fn test_add_enable_delete_access_spec() {
    let (mut session, sent) = scripted_session();
    let op = TagOp::Gen2Read {
        bank: GEN2_BANK_EPC,
        word_address: 0,
        word_count: 1,
        access_password: 0,
    };
    let id = session.add_access_spec(TagProtocol::Gen2, None, 0, &op, true).unwrap();
    session.enable_access_spec(id).unwrap();
    session.delete_access_spec(id).unwrap();
    session.delete_all_access_specs().unwrap();
    {
        let sent = sent.lock().unwrap();
        let kinds: Vec<u16> = sent.iter().map(|m| m.kind).collect();
        assert_eq!(
            vec![
                message_types::ADD_ACCESS_SPEC,
                message_types::ENABLE_ACCESS_SPEC,
                message_types::DELETE_ACCESS_SPEC,
                message_types::DELETE_ACCESS_SPEC,
            ],
            kinds
        );
        assert_eq!(id.to_be_bytes().to_vec(), sent[1].body);
        assert_eq!(vec![0, 0, 0, 0], sent[3].body);
    }
    session.disconnect().unwrap();
}

#[test]
fn test_op_spec_result_status_mapping() {
    let cases = [
        (OpSpecResult::Read { result: 0, op_spec_id: 1, words: Vec::new() }, OpStatus::Success),
        (OpSpecResult::Read { result: 2, op_spec_id: 1, words: Vec::new() }, OpStatus::NoResponse),
        (OpSpecResult::Read { result: 5, op_spec_id: 1, words: Vec::new() }, OpStatus::MemoryLocked),
        (OpSpecResult::Write { result: 1, op_spec_id: 1, words_written: 0 }, OpStatus::MemoryOverrun),
        (OpSpecResult::Write { result: 3, op_spec_id: 1, words_written: 0 }, OpStatus::InsufficientPower),
        (OpSpecResult::Kill { result: 1, op_spec_id: 1 }, OpStatus::InvalidKillPassword),
        (OpSpecResult::Kill { result: 9, op_spec_id: 1 }, OpStatus::ReaderError),
        (OpSpecResult::Lock { result: 2, op_spec_id: 1 }, OpStatus::TagError),
        (OpSpecResult::BlockWrite { result: 2, op_spec_id: 1, words_written: 0 }, OpStatus::MemoryLocked),
        (OpSpecResult::IsoRead { result: 0, op_spec_id: 1, data: Vec::new() }, OpStatus::Success),
        (OpSpecResult::IsoWrite { result: 1, op_spec_id: 1 }, OpStatus::TagError),
    ];
    for (result, expected) in cases {
        assert_eq!(expected, result.status());
    }
}

#[test]
fn test_decode_iso_result_param() {
    let mut w = crate::llrp::encoder::ParamWriter::new();
    w.begin_custom(parameter_types::TM_ISO_180006B_READ_OP_SPEC_RESULT)
        .u8(0)
        .u16(31)
        .bytes(&[0x0A, 0x0B])
        .end_param();
    let buf = w.into_bytes();
    let p = decoder::find_param(&buf, parameter_types::CUSTOM_PARAMETER).unwrap();
    assert!(OpSpecResult::is_result_param(&p));
    let result = OpSpecResult::decode(&p).unwrap();
    match &result {
        OpSpecResult::IsoRead { op_spec_id, data, .. } => {
            assert_eq!(31, *op_spec_id);
            assert_eq!(vec![0x0A, 0x0B], data.to_vec());
        }
        other => panic!("expected an iso read result, got {other:?}"),
    }
    assert_eq!(OpStatus::Success, result.status());
}

#[test]
fn test_decode_unknown_result_param_errors() {
    let mut w = crate::llrp::encoder::ParamWriter::new();
    w.begin_param(parameter_types::RO_SPEC_START_TRIGGER).u8(0).end_param();
    let buf = w.into_bytes();
    let p = decoder::find_param(&buf, parameter_types::RO_SPEC_START_TRIGGER).unwrap();
    assert!(!OpSpecResult::is_result_param(&p));
    match OpSpecResult::decode(&p) {
        Err(ReaderError::MessageParse(_)) => (),
        other => panic!("expected a parse error, got {other:?}"),
    }
}
