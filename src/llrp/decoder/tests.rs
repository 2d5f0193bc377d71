use super::*;
use crate::llrp::encoder::ParamWriter;
use crate::llrp::parameter_types;

#[test]
fn test_params_mixed_tv_and_tlv() {
    let mut w = ParamWriter::new();
    w.tv(parameter_types::ANTENNA_ID).u16(3);
    w.begin_param(parameter_types::RO_SPEC_START_TRIGGER)
        .u8(0)
        .end_param();
    w.tv(parameter_types::PEAK_RSSI).u8(0xC8);
    let buf = w.into_bytes();

    let parsed: Vec<Param> = params(&buf).map(|p| p.unwrap()).collect();
    assert_eq!(3, parsed.len());
    assert_eq!(parameter_types::ANTENNA_ID, parsed[0].kind);
    assert!(parsed[0].tv);
    assert_eq!(vec![0x00, 0x03], parsed[0].value.to_vec());
    assert_eq!(parameter_types::RO_SPEC_START_TRIGGER, parsed[1].kind);
    assert!(!parsed[1].tv);
    assert_eq!(vec![0x00], parsed[1].value.to_vec());
    assert_eq!(parameter_types::PEAK_RSSI, parsed[2].kind);
    assert_eq!(vec![0xC8], parsed[2].value.to_vec());
}

#[test]
fn test_params_nested_value_left_intact() {
    let mut w = ParamWriter::new();
    w.begin_param(parameter_types::RO_BOUNDARY_SPEC);
    w.begin_param(parameter_types::RO_SPEC_START_TRIGGER).u8(1).end_param();
    w.end_param();
    let buf = w.into_bytes();

    let outer = find_param(&buf, parameter_types::RO_BOUNDARY_SPEC).unwrap();
    let inner = find_param(outer.value, parameter_types::RO_SPEC_START_TRIGGER).unwrap();
    assert_eq!(vec![0x01], inner.value.to_vec());
}

#[test]
fn test_params_unknown_tv_type_errors() {
    // tv type 0x7F has no length table entry
    let buf = vec![0xFF, 0x00, 0x00];
    let mut iter = params(&buf);
    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
}

#[test]
fn test_params_short_tlv_errors() {
    let buf = vec![0x00, 0xB2];
    let mut iter = params(&buf);
    assert!(iter.next().unwrap().is_err());
}

#[test]
fn test_params_bad_tlv_length_errors() {
    // declared length of 2 is below the 4 byte header minimum
    let buf = vec![0x00, 0xB2, 0x00, 0x02, 0x00];
    let mut iter = params(&buf);
    assert!(iter.next().unwrap().is_err());
}

#[test]
fn test_status_code() {
    let mut w = ParamWriter::new();
    w.begin_param(parameter_types::LLRP_STATUS)
        .u16(parameter_types::M_FIELD_ERROR)
        .u16(0)
        .end_param();
    let buf = w.into_bytes();
    assert_eq!(parameter_types::M_FIELD_ERROR, status_code(&buf).unwrap());
    assert!(status_code(&[]).is_err());
}

#[test]
fn test_read_helpers() {
    let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
    assert_eq!(0x0102, read_u16(&buf, 0).unwrap());
    assert_eq!(0x02030405, read_u32(&buf, 1).unwrap());
    assert_eq!(0x0102030405060708, read_u64(&buf, 0).unwrap());
    assert!(read_u16(&buf, 7).is_err());
    assert!(read_u32(&buf, 5).is_err());
    assert!(read_u64(&buf, 1).is_err());
}

#[test]
fn test_custom_subtype() {
    let mut w = ParamWriter::new();
    w.begin_custom(parameter_types::TM_FAST_SEARCH_MODE).u8(1).end_param();
    let buf = w.into_bytes();
    let p = find_param(&buf, parameter_types::CUSTOM_PARAMETER).unwrap();
    let (vendor, subtype, rest) = custom_subtype(&p).unwrap();
    assert_eq!(crate::llrp::THINGMAGIC_VENDOR_ID, vendor);
    assert_eq!(parameter_types::TM_FAST_SEARCH_MODE, subtype);
    assert_eq!(vec![0x01], rest.to_vec());
}
