use crate::errors::ReaderError;
use crate::llrp::decoder::{self, Param};
use crate::llrp::{parameter_types, THINGMAGIC_VENDOR_ID};

/// The shared status taxonomy every OpSpec result collapses into, so
/// callers reason about outcomes the same way no matter which
/// operation ran.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum OpStatus {
    Success,
    TagError,
    NoResponse,
    ReaderError,
    MemoryOverrun,
    MemoryLocked,
    InsufficientPower,
    InvalidKillPassword,
}

/// Decoded result of one executed OpSpec. One variant per result
/// parameter kind; adding a new kind without a status mapping is a
/// compile error rather than a silent fallthrough.
#[derive(Clone, Debug)]
pub enum OpSpecResult {
    Read {
        result: u8,
        op_spec_id: u16,
        words: Vec<u16>,
    },
    Write {
        result: u8,
        op_spec_id: u16,
        words_written: u16,
    },
    Kill {
        result: u8,
        op_spec_id: u16,
    },
    Lock {
        result: u8,
        op_spec_id: u16,
    },
    BlockErase {
        result: u8,
        op_spec_id: u16,
    },
    BlockWrite {
        result: u8,
        op_spec_id: u16,
        words_written: u16,
    },
    BlockPermalock {
        result: u8,
        op_spec_id: u16,
    },
    IsoRead {
        result: u8,
        op_spec_id: u16,
        data: Vec<u8>,
    },
    IsoWrite {
        result: u8,
        op_spec_id: u16,
    },
    IsoLock {
        result: u8,
        op_spec_id: u16,
    },
}

impl OpSpecResult {
    /// True if the parameter is an OpSpec result of any kind.
    pub fn is_result_param(p: &Param) -> bool {
        match p.kind {
            parameter_types::C1G2_READ_OP_SPEC_RESULT
            | parameter_types::C1G2_WRITE_OP_SPEC_RESULT
            | parameter_types::C1G2_KILL_OP_SPEC_RESULT
            | parameter_types::C1G2_LOCK_OP_SPEC_RESULT
            | parameter_types::C1G2_BLOCK_ERASE_OP_SPEC_RESULT
            | parameter_types::C1G2_BLOCK_WRITE_OP_SPEC_RESULT
            | parameter_types::C1G2_BLOCK_PERMALOCK_OP_SPEC_RESULT => true,
            parameter_types::CUSTOM_PARAMETER => matches!(
                decoder::custom_subtype(p),
                Ok((THINGMAGIC_VENDOR_ID, sub, _)) if is_iso_result_subtype(sub)
            ),
            _ => false,
        }
    }

    pub fn decode(p: &Param) -> Result<OpSpecResult, ReaderError> {
        let parse = |e: &'static str| ReaderError::MessageParse(String::from(e));
        match p.kind {
            parameter_types::C1G2_READ_OP_SPEC_RESULT => {
                if p.value.len() < 5 {
                    return Err(parse("read result truncated"))
                }
                let word_count = decoder::read_u16(p.value, 3).map_err(parse)? as usize;
                let mut words = Vec::with_capacity(word_count);
                for i in 0..word_count {
                    words.push(decoder::read_u16(p.value, 5 + i * 2).map_err(parse)?);
                }
                Ok(OpSpecResult::Read {
                    result: p.value[0],
                    op_spec_id: decoder::read_u16(p.value, 1).map_err(parse)?,
                    words,
                })
            }
            parameter_types::C1G2_WRITE_OP_SPEC_RESULT => {
                if p.value.len() < 5 {
                    return Err(parse("write result truncated"))
                }
                Ok(OpSpecResult::Write {
                    result: p.value[0],
                    op_spec_id: decoder::read_u16(p.value, 1).map_err(parse)?,
                    words_written: decoder::read_u16(p.value, 3).map_err(parse)?,
                })
            }
            parameter_types::C1G2_KILL_OP_SPEC_RESULT => {
                if p.value.len() < 3 {
                    return Err(parse("kill result truncated"))
                }
                Ok(OpSpecResult::Kill {
                    result: p.value[0],
                    op_spec_id: decoder::read_u16(p.value, 1).map_err(parse)?,
                })
            }
            parameter_types::C1G2_LOCK_OP_SPEC_RESULT => {
                if p.value.len() < 3 {
                    return Err(parse("lock result truncated"))
                }
                Ok(OpSpecResult::Lock {
                    result: p.value[0],
                    op_spec_id: decoder::read_u16(p.value, 1).map_err(parse)?,
                })
            }
            parameter_types::C1G2_BLOCK_ERASE_OP_SPEC_RESULT => {
                if p.value.len() < 3 {
                    return Err(parse("block erase result truncated"))
                }
                Ok(OpSpecResult::BlockErase {
                    result: p.value[0],
                    op_spec_id: decoder::read_u16(p.value, 1).map_err(parse)?,
                })
            }
            parameter_types::C1G2_BLOCK_WRITE_OP_SPEC_RESULT => {
                if p.value.len() < 5 {
                    return Err(parse("block write result truncated"))
                }
                Ok(OpSpecResult::BlockWrite {
                    result: p.value[0],
                    op_spec_id: decoder::read_u16(p.value, 1).map_err(parse)?,
                    words_written: decoder::read_u16(p.value, 3).map_err(parse)?,
                })
            }
            parameter_types::C1G2_BLOCK_PERMALOCK_OP_SPEC_RESULT => {
                if p.value.len() < 3 {
                    return Err(parse("block permalock result truncated"))
                }
                Ok(OpSpecResult::BlockPermalock {
                    result: p.value[0],
                    op_spec_id: decoder::read_u16(p.value, 1).map_err(parse)?,
                })
            }
            parameter_types::CUSTOM_PARAMETER => {
                let (vendor, subtype, rest) = decoder::custom_subtype(p).map_err(parse)?;
                if vendor != THINGMAGIC_VENDOR_ID {
                    return Err(parse("unrecognized op result vendor"))
                }
                decode_iso_result(subtype, rest)
            }
            _ => Err(parse("unrecognized op result parameter")),
        }
    }

    /// The per-variant status mapping. Result codes differ between
    /// operation kinds; this is the one place that knows them all.
    pub fn status(&self) -> OpStatus {
        match self {
            OpSpecResult::Read { result, .. } => match result {
                0 => OpStatus::Success,
                1 => OpStatus::TagError,
                2 => OpStatus::NoResponse,
                4 => OpStatus::MemoryOverrun,
                5 => OpStatus::MemoryLocked,
                _ => OpStatus::ReaderError,
            },
            OpSpecResult::Write { result, .. }
            | OpSpecResult::BlockWrite { result, .. }
            | OpSpecResult::BlockErase { result, .. } => match result {
                0 => OpStatus::Success,
                1 => OpStatus::MemoryOverrun,
                2 => OpStatus::MemoryLocked,
                3 => OpStatus::InsufficientPower,
                4 => OpStatus::TagError,
                5 => OpStatus::NoResponse,
                _ => OpStatus::ReaderError,
            },
            OpSpecResult::Kill { result, .. } => match result {
                0 => OpStatus::Success,
                1 => OpStatus::InvalidKillPassword,
                2 => OpStatus::InsufficientPower,
                3 => OpStatus::TagError,
                4 => OpStatus::NoResponse,
                _ => OpStatus::ReaderError,
            },
            OpSpecResult::Lock { result, .. } | OpSpecResult::BlockPermalock { result, .. } => match result {
                0 => OpStatus::Success,
                1 => OpStatus::InsufficientPower,
                2 => OpStatus::TagError,
                3 => OpStatus::NoResponse,
                _ => OpStatus::ReaderError,
            },
            OpSpecResult::IsoRead { result, .. }
            | OpSpecResult::IsoWrite { result, .. }
            | OpSpecResult::IsoLock { result, .. } => match result {
                0 => OpStatus::Success,
                1 => OpStatus::TagError,
                2 => OpStatus::NoResponse,
                _ => OpStatus::ReaderError,
            },
        }
    }

    pub fn op_spec_id(&self) -> u16 {
        match self {
            OpSpecResult::Read { op_spec_id, .. }
            | OpSpecResult::Write { op_spec_id, .. }
            | OpSpecResult::Kill { op_spec_id, .. }
            | OpSpecResult::Lock { op_spec_id, .. }
            | OpSpecResult::BlockErase { op_spec_id, .. }
            | OpSpecResult::BlockWrite { op_spec_id, .. }
            | OpSpecResult::BlockPermalock { op_spec_id, .. }
            | OpSpecResult::IsoRead { op_spec_id, .. }
            | OpSpecResult::IsoWrite { op_spec_id, .. }
            | OpSpecResult::IsoLock { op_spec_id, .. } => *op_spec_id,
        }
    }
}

fn is_iso_result_subtype(subtype: u32) -> bool {
    matches!(
        subtype,
        parameter_types::TM_ISO_180006B_READ_OP_SPEC_RESULT
            | parameter_types::TM_ISO_180006B_WRITE_OP_SPEC_RESULT
            | parameter_types::TM_ISO_180006B_LOCK_OP_SPEC_RESULT
    )
}

fn decode_iso_result(subtype: u32, value: &[u8]) -> Result<OpSpecResult, ReaderError> {
    let parse = |e: &'static str| ReaderError::MessageParse(String::from(e));
    if value.len() < 3 {
        return Err(parse("iso op result truncated"))
    }
    let result = value[0];
    let op_spec_id = decoder::read_u16(value, 1).map_err(parse)?;
    match subtype {
        parameter_types::TM_ISO_180006B_READ_OP_SPEC_RESULT => Ok(OpSpecResult::IsoRead {
            result,
            op_spec_id,
            data: value[3..].to_vec(),
        }),
        parameter_types::TM_ISO_180006B_WRITE_OP_SPEC_RESULT => {
            Ok(OpSpecResult::IsoWrite { result, op_spec_id })
        }
        parameter_types::TM_ISO_180006B_LOCK_OP_SPEC_RESULT => {
            Ok(OpSpecResult::IsoLock { result, op_spec_id })
        }
        _ => Err(parse("unrecognized op result parameter")),
    }
}
