use super::*;
use crate::message::Message;
use crate::transport::mock;

fn parsed(model: u32, firmware: &str, power_table: &[(u16, u16)]) -> Capabilities {
    let frame = mock::capabilities_response(1, model, firmware, power_table);
    let msg = Message::from_frame(&frame).unwrap();
    Capabilities::parse(&msg.body).unwrap()
}

#[test]
fn test_parse() {
    let caps = parsed(48, "4.17.3", &[(1, 1000), (2, 3000), (3, 3250)]);
    assert_eq!(ReaderModel::AstraEx, caps.model);
    assert_eq!("4.17.3", caps.firmware);
    assert_eq!(4, caps.max_antennas);
    assert_eq!(vec![(1, 1000), (2, 3000), (3, 3250)], caps.power_table);
    assert_eq!(vec![915_250, 915_750], caps.frequencies);
    assert!(!caps.hopping);
    assert_eq!(1, caps.gen2_modes.len());
    assert_eq!(2, caps.gen2_modes[0].m);
    assert_eq!(250_000, caps.gen2_modes[0].blf);
    assert_eq!(6250, caps.gen2_modes[0].min_tari);
}

#[test]
fn test_parse_unknown_model() {
    let caps = parsed(99, "1.2", &[]);
    assert_eq!(ReaderModel::Unknown(99), caps.model);
}

#[test]
fn test_parse_requires_general_capabilities() {
    assert!(Capabilities::parse(&[]).is_err());
}

#[test]
fn test_power_lookups() {
    let caps = parsed(52, "5.3.2", &[(1, 1000), (2, 3000), (3, 3250)]);
    assert_eq!(Some(2), caps.power_index_for(3000));
    assert_eq!(None, caps.power_index_for(2999));
    assert_eq!(Some(3250), caps.max_power());
    let empty = parsed(52, "5.3.2", &[]);
    assert_eq!(None, empty.max_power());
}

#[test]
fn test_supports_phase_reporting() {
    assert!(parsed(52, "4.17.0", &[]).supports_phase_reporting());
    assert!(parsed(52, "4.19.2", &[]).supports_phase_reporting());
    assert!(parsed(52, "5.1.0", &[]).supports_phase_reporting());
    assert!(!parsed(52, "4.16.9", &[]).supports_phase_reporting());
    assert!(!parsed(52, "3.7.1", &[]).supports_phase_reporting());
    assert!(!parsed(52, "garbage", &[]).supports_phase_reporting());
}
