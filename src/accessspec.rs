use serde::{Deserialize, Serialize};

use crate::errors::ReaderError;
use crate::llrp::encoder::ParamWriter;
use crate::llrp::{message_types, parameter_types};
use crate::rospec::{TagFilter, TagProtocol, ANTENNA_ALL};
use crate::session::Session;

pub mod results;

#[cfg(test)]
mod tests;

// AccessSpec stop trigger types.
pub const ACCESS_STOP_NULL: u8 = 0;
pub const ACCESS_STOP_OPERATION_COUNT: u8 = 1;

pub const GEN2_BANK_RESERVED: u8 = 0;
pub const GEN2_BANK_EPC: u8 = 1;
pub const GEN2_BANK_TID: u8 = 2;
pub const GEN2_BANK_USER: u8 = 3;

/// One tag operation. Exactly one of these goes into an AccessSpec;
/// readers in this family run a single op per spec.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TagOp {
    Gen2Read {
        bank: u8,
        word_address: u16,
        word_count: u16,
        access_password: u32,
    },
    Gen2Write {
        bank: u8,
        word_address: u16,
        data: Vec<u16>,
        access_password: u32,
    },
    Gen2Kill {
        kill_password: u32,
    },
    Gen2Lock {
        /// 0 read/write, 1 permalock, 2 permaunlock, 3 unlock
        privilege: u8,
        /// 0 kill pwd, 1 access pwd, 2 epc, 3 tid, 4 user
        data_field: u8,
        access_password: u32,
    },
    Gen2BlockErase {
        bank: u8,
        word_address: u16,
        word_count: u16,
        access_password: u32,
    },
    Gen2BlockWrite {
        bank: u8,
        word_address: u16,
        data: Vec<u16>,
        access_password: u32,
    },
    Gen2BlockPermalock {
        bank: u8,
        block_pointer: u16,
        mask: Vec<u16>,
        access_password: u32,
    },
    Iso180006bRead {
        byte_address: u8,
        length: u8,
    },
    Iso180006bWrite {
        byte_address: u8,
        data: Vec<u8>,
    },
    Iso180006bLock {
        byte_address: u8,
    },
}

impl TagOp {
    pub fn protocol(&self) -> TagProtocol {
        match self {
            TagOp::Iso180006bRead { .. } | TagOp::Iso180006bWrite { .. } | TagOp::Iso180006bLock { .. } => {
                TagProtocol::Iso180006b
            }
            _ => TagProtocol::Gen2,
        }
    }

    fn validate(&self) -> Result<(), ReaderError> {
        match self {
            TagOp::Gen2Lock { privilege, data_field, .. } => {
                if *privilege > 3 {
                    return Err(ReaderError::InvalidValue(format!("lock privilege {privilege} out of range")))
                }
                if *data_field > 4 {
                    return Err(ReaderError::InvalidValue(format!("lock data field {data_field} out of range")))
                }
                Ok(())
            }
            TagOp::Gen2Read { bank, .. }
            | TagOp::Gen2Write { bank, .. }
            | TagOp::Gen2BlockErase { bank, .. }
            | TagOp::Gen2BlockWrite { bank, .. }
            | TagOp::Gen2BlockPermalock { bank, .. } => {
                if *bank > GEN2_BANK_USER {
                    return Err(ReaderError::InvalidValue(format!("memory bank {bank} out of range")))
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Session {
    pub(crate) fn next_access_spec_id(&self) -> u32 {
        let mut output: u32 = 0;
        if let Ok(mut v) = self.access_spec_id.lock() {
            output = *v;
            *v += 1;
        }
        output
    }

    pub(crate) fn next_op_spec_id(&self) -> u16 {
        let mut output: u16 = 0;
        if let Ok(mut v) = self.op_spec_id.lock() {
            output = *v;
            *v += 1;
        }
        output
    }

    /// Builds and adds one AccessSpec wrapping a single tag operation.
    ///
    /// Standalone operations target the configured tag-op antenna and
    /// stop after one execution; embedded operations inherit their
    /// antenna from the AISpec and run against every matching tag. The
    /// protocol must be one this session layer actually speaks.
    pub fn add_access_spec(
        &self,
        protocol: TagProtocol,
        filter: Option<&TagFilter>,
        rospec_id: u32,
        op: &TagOp,
        standalone: bool,
    ) -> Result<u32, ReaderError> {
        match protocol {
            TagProtocol::Gen2 | TagProtocol::Iso180006b => (),
            other => {
                return Err(ReaderError::Unsupported(format!(
                    "tag operations are not supported under {other:?}"
                )))
            }
        }
        if op.protocol() != protocol {
            return Err(ReaderError::Unsupported(format!(
                "operation does not run under protocol {protocol:?}"
            )))
        }
        op.validate()?;
        let access_spec_id = self.next_access_spec_id();
        let op_spec_id = self.next_op_spec_id();
        let antenna = if standalone { self.tag_op_antenna() } else { ANTENNA_ALL };
        let body = build_access_spec(access_spec_id, antenna, protocol, filter, rospec_id, op, op_spec_id, standalone)?;
        self.command(message_types::ADD_ACCESS_SPEC, |id| {
            let mut w = ParamWriter::new();
            w.bytes(&body);
            w.into_message(message_types::ADD_ACCESS_SPEC, id)
        })?;
        Ok(access_spec_id)
    }

    pub fn enable_access_spec(&self, access_spec_id: u32) -> Result<(), ReaderError> {
        self.command(message_types::ENABLE_ACCESS_SPEC, |id| {
            let mut w = ParamWriter::new();
            w.u32(access_spec_id);
            w.into_message(message_types::ENABLE_ACCESS_SPEC, id)
        })?;
        Ok(())
    }

    pub fn delete_access_spec(&self, access_spec_id: u32) -> Result<(), ReaderError> {
        self.command(message_types::DELETE_ACCESS_SPEC, |id| {
            let mut w = ParamWriter::new();
            w.u32(access_spec_id);
            w.into_message(message_types::DELETE_ACCESS_SPEC, id)
        })?;
        Ok(())
    }

    /// Deletes every AccessSpec on the reader (id 0 means all).
    pub fn delete_all_access_specs(&self) -> Result<(), ReaderError> {
        self.command(message_types::DELETE_ACCESS_SPEC, |id| {
            let mut w = ParamWriter::new();
            w.u32(0);
            w.into_message(message_types::DELETE_ACCESS_SPEC, id)
        })?;
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn build_access_spec(
    access_spec_id: u32,
    antenna: u16,
    protocol: TagProtocol,
    filter: Option<&TagFilter>,
    rospec_id: u32,
    op: &TagOp,
    op_spec_id: u16,
    standalone: bool,
) -> Result<Vec<u8>, ReaderError> {
    let mut w = ParamWriter::new();
    w.begin_param(parameter_types::ACCESS_SPEC);
    w.u32(access_spec_id);
    w.u16(antenna);
    w.u8(protocol.protocol_id());
    w.u8(0); // current state: disabled until enabled
    w.u32(rospec_id);
    w.begin_param(parameter_types::ACCESS_SPEC_STOP_TRIGGER);
    if standalone {
        // execute once, then the spec retires itself
        w.u8(ACCESS_STOP_OPERATION_COUNT);
        w.u16(1);
    } else {
        // run against every matching tag the rospec singulates
        w.u8(ACCESS_STOP_NULL);
        w.u16(0);
    }
    w.end_param();
    w.begin_param(parameter_types::ACCESS_COMMAND);
    match protocol {
        TagProtocol::Gen2 => write_c1g2_tag_spec(&mut w, filter),
        TagProtocol::Iso180006b => write_iso_tag_pattern(&mut w, filter)?,
        other => {
            return Err(ReaderError::Unsupported(format!(
                "tag operations are not supported under {other:?}"
            )))
        }
    }
    write_op_spec(&mut w, op, op_spec_id);
    w.end_param();
    w.end_param();
    Ok(w.into_bytes())
}

/// The target pattern an AccessSpec matches tags against. No filter
/// means a zero length pattern, which matches everything.
fn write_c1g2_tag_spec(w: &mut ParamWriter, filter: Option<&TagFilter>) {
    w.begin_param(parameter_types::C1G2_TAG_SPEC);
    w.begin_param(parameter_types::C1G2_TARGET_TAG);
    match filter {
        Some(TagFilter::Gen2Select { bank, bit_pointer, mask, bit_length }) => {
            w.u8(((bank & 0x03) << 6) | (1 << 5)); // match on pattern
            w.u16(*bit_pointer);
            w.u16(*bit_length);
            w.bytes(mask);
            w.u16(0); // no data compare
        }
        Some(TagFilter::TagData { epc }) => {
            w.u8(((GEN2_BANK_EPC & 0x03) << 6) | (1 << 5));
            w.u16(32);
            w.u16((epc.len() * 8) as u16);
            w.bytes(epc);
            w.u16(0);
        }
        None => {
            w.u8((GEN2_BANK_EPC << 6) | (1 << 5));
            w.u16(0);
            w.u16(0); // zero length mask matches all
            w.u16(0);
        }
    }
    w.end_param();
    w.end_param();
}

fn write_iso_tag_pattern(w: &mut ParamWriter, filter: Option<&TagFilter>) -> Result<(), ReaderError> {
    w.begin_custom(parameter_types::TM_ISO_180006B_TAG_PATTERN);
    match filter {
        Some(TagFilter::TagData { epc }) => {
            w.u8(epc.len() as u8);
            w.bytes(epc);
        }
        Some(TagFilter::Gen2Select { .. }) => {
            return Err(ReaderError::Unsupported(String::from(
                "gen2 select filters do not apply to iso 18000-6b",
            )))
        }
        None => {
            w.u8(0);
        }
    }
    w.end_param();
    Ok(())
}

/// One OpSpec per TagOp variant; the match is the whole dispatch table.
fn write_op_spec(w: &mut ParamWriter, op: &TagOp, op_spec_id: u16) {
    match op {
        TagOp::Gen2Read { bank, word_address, word_count, access_password } => {
            w.begin_param(parameter_types::C1G2_READ);
            w.u16(op_spec_id);
            w.u32(*access_password);
            w.u8((bank & 0x03) << 6);
            w.u16(*word_address);
            w.u16(*word_count);
            w.end_param();
        }
        TagOp::Gen2Write { bank, word_address, data, access_password } => {
            w.begin_param(parameter_types::C1G2_WRITE);
            w.u16(op_spec_id);
            w.u32(*access_password);
            w.u8((bank & 0x03) << 6);
            w.u16(*word_address);
            w.u16(data.len() as u16);
            for word in data {
                w.u16(*word);
            }
            w.end_param();
        }
        TagOp::Gen2Kill { kill_password } => {
            w.begin_param(parameter_types::C1G2_KILL);
            w.u16(op_spec_id);
            w.u32(*kill_password);
            w.end_param();
        }
        TagOp::Gen2Lock { privilege, data_field, access_password } => {
            w.begin_param(parameter_types::C1G2_LOCK);
            w.u16(op_spec_id);
            w.u32(*access_password);
            w.begin_param(parameter_types::C1G2_LOCK_PAYLOAD)
                .u8(*privilege)
                .u8(*data_field)
                .end_param();
            w.end_param();
        }
        TagOp::Gen2BlockErase { bank, word_address, word_count, access_password } => {
            w.begin_param(parameter_types::C1G2_BLOCK_ERASE);
            w.u16(op_spec_id);
            w.u32(*access_password);
            w.u8((bank & 0x03) << 6);
            w.u16(*word_address);
            w.u16(*word_count);
            w.end_param();
        }
        TagOp::Gen2BlockWrite { bank, word_address, data, access_password } => {
            w.begin_param(parameter_types::C1G2_BLOCK_WRITE);
            w.u16(op_spec_id);
            w.u32(*access_password);
            w.u8((bank & 0x03) << 6);
            w.u16(*word_address);
            w.u16(data.len() as u16);
            for word in data {
                w.u16(*word);
            }
            w.end_param();
        }
        TagOp::Gen2BlockPermalock { bank, block_pointer, mask, access_password } => {
            w.begin_param(parameter_types::C1G2_BLOCK_PERMALOCK);
            w.u16(op_spec_id);
            w.u32(*access_password);
            w.u8((bank & 0x03) << 6);
            w.u16(*block_pointer);
            w.u16(mask.len() as u16);
            for word in mask {
                w.u16(*word);
            }
            w.end_param();
        }
        TagOp::Iso180006bRead { byte_address, length } => {
            w.begin_custom(parameter_types::TM_ISO_180006B_READ);
            w.u16(op_spec_id);
            w.u8(*byte_address);
            w.u8(*length);
            w.end_param();
        }
        TagOp::Iso180006bWrite { byte_address, data } => {
            w.begin_custom(parameter_types::TM_ISO_180006B_WRITE);
            w.u16(op_spec_id);
            w.u8(*byte_address);
            w.u8(data.len() as u8);
            w.bytes(data);
            w.end_param();
        }
        TagOp::Iso180006bLock { byte_address } => {
            w.begin_custom(parameter_types::TM_ISO_180006B_LOCK);
            w.u16(op_spec_id);
            w.u8(*byte_address);
            w.end_param();
        }
    }
}
