use serde::{Deserialize, Serialize};

use crate::errors::ReaderError;
use crate::llrp::{decoder, parameter_types};

#[cfg(test)]
mod tests;

/// Hardware models this session layer knows the quirks of. Anything
/// else still works, it just gets no model specific handling.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum ReaderModel {
    M6,
    AstraEx,
    Sargas,
    Izar,
    Unknown(u32),
}

impl ReaderModel {
    pub fn from_code(code: u32) -> ReaderModel {
        match code {
            6 => ReaderModel::M6,
            48 => ReaderModel::AstraEx,
            52 => ReaderModel::Sargas,
            56 => ReaderModel::Izar,
            other => ReaderModel::Unknown(other),
        }
    }
}

/// One Gen2 RF mode the reader supports (link frequency, miller value,
/// tari range).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Gen2Mode {
    pub id: u32,
    pub m: u8,
    pub blf: u32,
    pub min_tari: u32,
    pub max_tari: u32,
}

/// Reader hardware limits, fetched once right after connecting and
/// never mutated afterward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Capabilities {
    pub model: ReaderModel,
    pub firmware: String,
    pub max_antennas: u16,
    /// (index, value in centi-dBm), index as used by RFTransmitter
    pub power_table: Vec<(u16, i16)>,
    pub frequencies: Vec<u32>,
    pub hopping: bool,
    pub gen2_modes: Vec<Gen2Mode>,
}

impl Capabilities {
    pub fn parse(body: &[u8]) -> Result<Capabilities, ReaderError> {
        let mut caps = Capabilities {
            model: ReaderModel::Unknown(0),
            firmware: String::new(),
            max_antennas: 0,
            power_table: Vec::new(),
            frequencies: Vec::new(),
            hopping: false,
            gen2_modes: Vec::new(),
        };
        let general = decoder::find_param(body, parameter_types::GENERAL_DEVICE_CAPABILITIES)
            .ok_or_else(|| ReaderError::MessageParse(String::from("no general device capabilities")))?;
        parse_general(general.value, &mut caps).map_err(|e| ReaderError::MessageParse(String::from(e)))?;
        if let Some(regulatory) = decoder::find_param(body, parameter_types::REGULATORY_CAPABILITIES) {
            parse_regulatory(regulatory.value, &mut caps)
                .map_err(|e| ReaderError::MessageParse(String::from(e)))?;
        }
        Ok(caps)
    }

    /// Power table index whose value matches exactly.
    pub fn power_index_for(&self, value: i16) -> Option<u16> {
        self.power_table
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(i, _)| *i)
    }

    pub fn max_power(&self) -> Option<i16> {
        self.power_table.iter().map(|(_, v)| *v).max()
    }

    /// Phase angle reporting shipped in firmware 4.17.
    pub fn supports_phase_reporting(&self) -> bool {
        let mut parts = self.firmware.split('.');
        let major: u32 = match parts.next().and_then(|p| p.parse().ok()) {
            Some(v) => v,
            None => return false,
        };
        let minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        major > 4 || (major == 4 && minor >= 17)
    }
}

fn parse_general(value: &[u8], caps: &mut Capabilities) -> Result<(), &'static str> {
    caps.max_antennas = decoder::read_u16(value, 0)?;
    // skip the property bits and manufacturer id
    let model_code = decoder::read_u32(value, 8)?;
    caps.model = ReaderModel::from_code(model_code);
    let fw_len = decoder::read_u16(value, 12)? as usize;
    if value.len() < 14 + fw_len {
        return Err("firmware string truncated")
    }
    caps.firmware = String::from_utf8_lossy(&value[14..14 + fw_len]).to_string();
    Ok(())
}

fn parse_regulatory(value: &[u8], caps: &mut Capabilities) -> Result<(), &'static str> {
    // country code u16, communications standard u16, then sub params
    if value.len() < 4 {
        return Err("regulatory capabilities truncated")
    }
    let uhf = match decoder::find_param(&value[4..], parameter_types::UHF_BAND_CAPABILITIES) {
        Some(p) => p,
        None => return Ok(()),
    };
    for p in decoder::params(uhf.value) {
        let p = p?;
        match p.kind {
            parameter_types::TRANSMIT_POWER_LEVEL_TABLE_ENTRY => {
                let index = decoder::read_u16(p.value, 0)?;
                let power = decoder::read_u16(p.value, 2)? as i16;
                caps.power_table.push((index, power));
            }
            parameter_types::FREQUENCY_INFORMATION => {
                parse_frequencies(p.value, caps)?;
            }
            parameter_types::C1G2_LLRP_CAPABILITIES => (),
            parameter_types::C1G2_UHF_MODE_TABLE => {
                for entry in decoder::params(p.value) {
                    let entry = entry?;
                    if entry.kind != parameter_types::C1G2_UHF_MODE_TABLE_ENTRY {
                        continue;
                    }
                    if entry.value.len() < 28 {
                        return Err("uhf mode table entry truncated")
                    }
                    caps.gen2_modes.push(Gen2Mode {
                        id: decoder::read_u32(entry.value, 0)?,
                        m: entry.value[5],
                        blf: decoder::read_u32(entry.value, 8)?,
                        min_tari: decoder::read_u32(entry.value, 16)?,
                        max_tari: decoder::read_u32(entry.value, 20)?,
                    });
                }
            }
            _ => (),
        }
    }
    Ok(())
}

fn parse_frequencies(value: &[u8], caps: &mut Capabilities) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("frequency information truncated")
    }
    caps.hopping = value[0] != 0;
    for p in decoder::params(&value[1..]) {
        let p = p?;
        match p.kind {
            parameter_types::FREQUENCY_HOP_TABLE => {
                let count = decoder::read_u16(p.value, 2)? as usize;
                for i in 0..count {
                    caps.frequencies.push(decoder::read_u32(p.value, 4 + i * 4)?);
                }
            }
            parameter_types::FIXED_FREQUENCY_TABLE => {
                let count = decoder::read_u16(p.value, 0)? as usize;
                for i in 0..count {
                    caps.frequencies.push(decoder::read_u32(p.value, 2 + i * 4)?);
                }
            }
            _ => (),
        }
    }
    Ok(())
}
