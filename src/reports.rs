use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accessspec::results::OpSpecResult;
use crate::errors::ReaderError;
use crate::llrp::{decoder, parameter_types};


/// One tag observation out of an RO_ACCESS_REPORT, flattened from the
/// TV and TLV soup into fields callers can use directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TagRead {
    pub epc: Vec<u8>,
    pub antenna: u16,
    pub rssi: i8,
    pub first_seen: Option<DateTime<Utc>>,
    pub seen_count: u16,
    pub rospec_id: u32,
    pub crc: Option<u16>,
    pub pc: Option<u16>,
    #[serde(skip)]
    pub op_results: Vec<OpSpecResult>,
}

impl TagRead {
    pub fn epc_hex(&self) -> String {
        let mut out = String::with_capacity(self.epc.len() * 2);
        for b in &self.epc {
            out.push_str(&format!("{b:02X}"));
        }
        out
    }
}

/// Number of TagReportData parameters in a report body. Cheaper than a
/// full decode when only the tally matters.
pub fn count_tag_reports(body: &[u8]) -> usize {
    params_of_kind(body, parameter_types::TAG_REPORT_DATA)
}

fn params_of_kind(body: &[u8], kind: u16) -> usize {
    decoder::params(body)
        .filter(|p| matches!(p, Ok(p) if p.kind == kind))
        .count()
}

/// Decodes every tag read in an RO_ACCESS_REPORT body.
pub fn decode_tag_reads(body: &[u8]) -> Result<Vec<TagRead>, ReaderError> {
    let mut reads = Vec::new();
    for p in decoder::params(body) {
        let p = p.map_err(|e| ReaderError::MessageParse(String::from(e)))?;
        if p.kind != parameter_types::TAG_REPORT_DATA {
            continue;
        }
        reads.push(decode_one(p.value)?);
    }
    Ok(reads)
}

fn decode_one(value: &[u8]) -> Result<TagRead, ReaderError> {
    let parse = |e: &'static str| ReaderError::MessageParse(String::from(e));
    let mut read = TagRead {
        epc: Vec::new(),
        antenna: 0,
        rssi: 0,
        first_seen: None,
        seen_count: 0,
        rospec_id: 0,
        crc: None,
        pc: None,
        op_results: Vec::new(),
    };
    for p in decoder::params(value) {
        let p = p.map_err(parse)?;
        match p.kind {
            parameter_types::EPC_96 if p.tv => {
                read.epc = p.value.to_vec();
            }
            parameter_types::EPC_DATA if !p.tv => {
                // u16 bit count, then the epc padded to a byte boundary
                let bits = decoder::read_u16(p.value, 0).map_err(parse)? as usize;
                let bytes = (bits + 7) / 8;
                if p.value.len() < 2 + bytes {
                    return Err(parse("epc data truncated"))
                }
                read.epc = p.value[2..2 + bytes].to_vec();
            }
            parameter_types::ANTENNA_ID if p.tv => {
                read.antenna = decoder::read_u16(p.value, 0).map_err(parse)?;
            }
            parameter_types::PEAK_RSSI if p.tv => {
                read.rssi = p.value[0] as i8;
            }
            parameter_types::FIRST_SEEN_TIMESTAMP_UTC if p.tv => {
                let micros = decoder::read_u64(p.value, 0).map_err(parse)?;
                read.first_seen = DateTime::from_timestamp_micros(micros as i64);
            }
            parameter_types::TAG_SEEN_COUNT if p.tv => {
                read.seen_count = decoder::read_u16(p.value, 0).map_err(parse)?;
            }
            parameter_types::RO_SPEC_ID if p.tv => {
                read.rospec_id = decoder::read_u32(p.value, 0).map_err(parse)?;
            }
            parameter_types::C1G2_CRC if p.tv => {
                read.crc = Some(decoder::read_u16(p.value, 0).map_err(parse)?);
            }
            parameter_types::C1G2_PC if p.tv => {
                read.pc = Some(decoder::read_u16(p.value, 0).map_err(parse)?);
            }
            _ => {
                if OpSpecResult::is_result_param(&p) {
                    read.op_results.push(OpSpecResult::decode(&p)?);
                }
            }
        }
    }
    Ok(read)
}
