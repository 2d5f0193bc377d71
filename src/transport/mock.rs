use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{RecvError, Transport};
use crate::llrp::encoder::ParamWriter;
use crate::llrp::{encoder, message_types, parameter_types};
use crate::message::Message;

/// Scripted stand-in for a reader. Sent frames are recorded, inbound
/// frames come from a queue, and an optional responder can answer each
/// request the way a real reader would.
pub struct MockTransport {
    pub sent: Arc<Mutex<Vec<Message>>>,
    pub inbound: Arc<Mutex<VecDeque<Vec<u8>>>>,
    responder: Option<Box<dyn FnMut(&Message) -> Vec<Vec<u8>> + Send>>,
    /// Sleep this long inside recv before looking at the queue, to make
    /// receiver/foreground interleavings observable in tests.
    pub recv_delay: Option<Duration>,
    /// Once set, the peer has hung up: polls and receives report
    /// Closed as soon as the inbound queue runs dry.
    pub closed: Arc<Mutex<bool>>,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport {
            sent: Arc::new(Mutex::new(Vec::new())),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            responder: None,
            recv_delay: None,
            closed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_responder<F>(mut self, f: F) -> MockTransport
    where
        F: FnMut(&Message) -> Vec<Vec<u8>> + Send + 'static,
    {
        self.responder = Some(Box::new(f));
        self
    }

    pub fn push_inbound(&self, frame: Vec<u8>) {
        self.inbound.lock().unwrap().push_back(frame);
    }

    pub fn sent_kinds(&self) -> Vec<u16> {
        self.sent.lock().unwrap().iter().map(|m| m.kind).collect()
    }
}

impl Transport for MockTransport {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), String> {
        let msg = Message::from_frame(frame).map_err(String::from)?;
        let replies = match &mut self.responder {
            Some(f) => f(&msg),
            None => Vec::new(),
        };
        self.sent.lock().unwrap().push(msg);
        let mut inbound = self.inbound.lock().unwrap();
        for r in replies {
            inbound.push_back(r);
        }
        Ok(())
    }

    fn recv_message(&mut self, timeout: Duration) -> Result<Message, RecvError> {
        if let Some(d) = self.recv_delay {
            thread::sleep(d);
        }
        let frame = self.inbound.lock().unwrap().pop_front();
        match frame {
            Some(f) => Message::from_frame(&f).map_err(|e| RecvError::Failed(String::from(e))),
            None => {
                if *self.closed.lock().unwrap() {
                    return Err(RecvError::Closed)
                }
                thread::sleep(timeout.min(Duration::from_millis(5)));
                Err(RecvError::TimedOut)
            }
        }
    }

    fn poll_readable(&mut self, timeout: Duration) -> Result<bool, RecvError> {
        if self.inbound.lock().unwrap().is_empty() {
            if *self.closed.lock().unwrap() {
                return Err(RecvError::Closed)
            }
            thread::sleep(timeout.min(Duration::from_millis(5)));
            return Ok(false)
        }
        Ok(true)
    }
}

/// Response frame carrying a success LLRPStatus.
pub fn ok_response(kind: u16, id: u32) -> Vec<u8> {
    status_response(kind, id, parameter_types::M_SUCCESS)
}

pub fn status_response(kind: u16, id: u32, status: u16) -> Vec<u8> {
    let mut w = ParamWriter::new();
    w.begin_param(parameter_types::LLRP_STATUS)
        .u16(status)
        .u16(0) // error description length
        .end_param();
    w.into_message(kind, id)
}

pub fn keepalive_frame(id: u32) -> Vec<u8> {
    encoder::frame(message_types::KEEPALIVE, id, &[])
}

/// READER_EVENT_NOTIFICATION carrying an end-of-ROSpec event.
pub fn rospec_end_event(id: u32, rospec_id: u32) -> Vec<u8> {
    let mut w = ParamWriter::new();
    w.begin_param(parameter_types::READER_EVENT_NOTIFICATION_DATA);
    w.begin_param(parameter_types::UTC_TIMESTAMP).u64(0).end_param();
    w.begin_param(parameter_types::RO_SPEC_EVENT)
        .u8(1) // event type 1 = end of rospec
        .u32(rospec_id)
        .u32(0) // preempting rospec id
        .end_param();
    w.end_param();
    w.into_message(message_types::READER_EVENT_NOTIFICATION, id)
}

/// RO_ACCESS_REPORT with `epcs.len()` TagReportData entries.
pub fn tag_report(id: u32, epcs: &[[u8; 12]]) -> Vec<u8> {
    let mut w = ParamWriter::new();
    for epc in epcs {
        w.begin_param(parameter_types::TAG_REPORT_DATA);
        w.tv(parameter_types::EPC_96).bytes(epc);
        w.tv(parameter_types::ANTENNA_ID).u16(1);
        w.tv(parameter_types::PEAK_RSSI).u8(200);
        w.tv(parameter_types::FIRST_SEEN_TIMESTAMP_UTC).u64(1_600_000_000_000_000);
        w.tv(parameter_types::TAG_SEEN_COUNT).u16(3);
        w.end_param();
    }
    w.into_message(message_types::RO_ACCESS_REPORT, id)
}

/// GET_READER_CAPABILITIES_RESPONSE for a reader with the given model
/// code and firmware, plus a small power table and frequency list.
pub fn capabilities_response(id: u32, model: u32, firmware: &str, power_table: &[(u16, u16)]) -> Vec<u8> {
    let mut w = ParamWriter::new();
    w.begin_param(parameter_types::LLRP_STATUS)
        .u16(parameter_types::M_SUCCESS)
        .u16(0)
        .end_param();
    w.begin_param(parameter_types::GENERAL_DEVICE_CAPABILITIES);
    w.u16(4); // max antennas
    w.u16(0x8000); // can set antenna properties
    w.u32(26554); // device manufacturer
    w.u32(model);
    w.u16(firmware.len() as u16);
    w.bytes(firmware.as_bytes());
    w.end_param();
    w.begin_param(parameter_types::REGULATORY_CAPABILITIES);
    w.u16(840); // country code
    w.u16(1); // communications standard
    w.begin_param(parameter_types::UHF_BAND_CAPABILITIES);
    for (index, power) in power_table {
        w.begin_param(parameter_types::TRANSMIT_POWER_LEVEL_TABLE_ENTRY)
            .u16(*index)
            .u16(*power)
            .end_param();
    }
    w.begin_param(parameter_types::FREQUENCY_INFORMATION);
    w.u8(0); // fixed frequency list
    w.begin_param(parameter_types::FIXED_FREQUENCY_TABLE)
        .u16(2)
        .u32(915_250)
        .u32(915_750)
        .end_param();
    w.end_param();
    w.begin_param(parameter_types::C1G2_UHF_MODE_TABLE);
    w.begin_param(parameter_types::C1G2_UHF_MODE_TABLE_ENTRY);
    w.u32(0); // mode id
    w.u8(1); // divide ratio
    w.u8(2); // miller 4
    w.u16(0);
    w.u32(250_000); // backscatter link frequency
    w.u32(0);
    w.u32(6250); // min tari
    w.u32(6250); // max tari
    w.u32(0); // step
    w.end_param();
    w.end_param();
    w.end_param();
    w.end_param();
    w.into_message(message_types::GET_READER_CAPABILITIES_RESPONSE, id)
}

/// GET_ROSPECS_RESPONSE listing the given (id, state, start trigger) specs.
pub fn rospecs_response(id: u32, specs: &[(u32, u8, u8)]) -> Vec<u8> {
    let mut w = ParamWriter::new();
    w.begin_param(parameter_types::LLRP_STATUS)
        .u16(parameter_types::M_SUCCESS)
        .u16(0)
        .end_param();
    for (rospec_id, state, trigger) in specs {
        w.begin_param(parameter_types::RO_SPEC);
        w.u32(*rospec_id);
        w.u8(0); // priority
        w.u8(*state);
        w.begin_param(parameter_types::RO_BOUNDARY_SPEC);
        w.begin_param(parameter_types::RO_SPEC_START_TRIGGER);
        w.u8(*trigger);
        if *trigger == 2 {
            w.begin_param(parameter_types::PERIODIC_TRIGGER_VALUE)
                .u32(0)
                .u32(1000)
                .end_param();
        }
        w.end_param();
        w.begin_param(parameter_types::RO_SPEC_STOP_TRIGGER)
            .u8(0)
            .u32(0)
            .end_param();
        w.end_param();
        w.end_param();
    }
    w.into_message(message_types::GET_ROSPECS_RESPONSE, id)
}
