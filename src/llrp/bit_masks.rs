use super::parameter_types;

// First 16 bits of a message header are as follows.
// 3 bits reserved (should be 0)
// 3 bits llrp version (1 for 1.0, 2 for 1.1)
// 10 bits for Message Type
pub const RESERVED: u16 = 0xE000; // 1110 0000 0000 0000
pub const VERSION:  u16 = 0x1C00; // 0001 1100 0000 0000
pub const MSG_TYPE: u16 = 0x03FF; // 0000 0011 1111 1111

pub struct MsgHeader {
    pub version: u16,
    pub kind: u16,
    pub length: u32,
    pub id: u32,
}

/// Decodes the full 10 byte message header. Length is the total
/// message length including the header itself.
pub fn decode_header(bits: &[u8]) -> Result<MsgHeader, &'static str> {
    if bits.len() < super::HEADER_LEN {
        return Err("header too short")
    }
    let first = ((bits[0] as u16) << 8) | bits[1] as u16;
    if (first & RESERVED) != 0 {
        return Err("invalid reserved field")
    }
    let vers = (first & VERSION) >> 10;
    if vers != super::VERSION_1_0 && vers != super::VERSION_1_1 {
        return Err("invalid version specified")
    }
    let length = ((bits[2] as u32) << 24) | ((bits[3] as u32) << 16) | ((bits[4] as u32) << 8) | bits[5] as u32;
    if (length as usize) < super::HEADER_LEN {
        return Err("invalid message length")
    }
    Ok(MsgHeader {
        version: vers,
        kind: first & MSG_TYPE,
        length,
        id: ((bits[6] as u32) << 24) | ((bits[7] as u32) << 16) | ((bits[8] as u32) << 8) | bits[9] as u32,
    })
}

/// Encodes the 10 byte header for a message whose body is `body_len` bytes.
pub fn encode_header(version: u16, kind: u16, id: u32, body_len: usize) -> [u8; 10] {
    let first: u16 = (version << 10) | (kind & MSG_TYPE);
    let length: u32 = (body_len + super::HEADER_LEN) as u32;
    [
        ((first & 0xFF00) >> 8) as u8,
        (first & 0x00FF) as u8,
        ((length & 0xFF000000) >> 24) as u8,
        ((length & 0x00FF0000) >> 16) as u8,
        ((length & 0x0000FF00) >> 8) as u8,
        (length & 0x000000FF) as u8,
        ((id & 0xFF000000) >> 24) as u8,
        ((id & 0x00FF0000) >> 16) as u8,
        ((id & 0x0000FF00) >> 8) as u8,
        (id & 0x000000FF) as u8,
    ]
}

// TV parameter masks
pub const TV_RESERVED: u16 = 0x8000; // 1000 0000 0000 0000
pub const TV_TYPE:     u16 = 0x7F00; // 0111 1111 0000 0000

// Non-TV parameter masks
pub const PARAM_RESERVED: u16 = 0xFC00; // 1111 1100 0000 0000
pub const PARAM_TYPE:     u16 = 0x03FF; // 0000 0011 1111 1111

pub struct ParamTypeInfo {
    pub tv: bool,
    pub kind: u16,
}

pub fn get_param_type(bits: &u16) -> Result<ParamTypeInfo, &'static str> {
    if (bits & TV_RESERVED) != 0 {
        return Ok(ParamTypeInfo {
            tv: true,
            kind: (bits & TV_TYPE) >> 8,
        })
    }
    if (bits & PARAM_RESERVED) != 0 {
        return Err("invalid reserved field")
    }
    Ok(ParamTypeInfo {
        tv: false,
        kind: bits & PARAM_TYPE,
    })
}

/// Value length in bytes of a TV encoded parameter, not counting the
/// type byte itself. TV parameters carry no length field so the walker
/// needs this table to skip them.
pub fn tv_value_len(kind: u16) -> Option<usize> {
    match kind {
        parameter_types::ANTENNA_ID => Some(2),
        parameter_types::FIRST_SEEN_TIMESTAMP_UTC => Some(8),
        parameter_types::FIRST_SEEN_TIMESTAMP_UPTIME => Some(8),
        parameter_types::LAST_SEEN_TIMESTAMP_UTC => Some(8),
        parameter_types::LAST_SEEN_TIMESTAMP_UPTIME => Some(8),
        parameter_types::PEAK_RSSI => Some(1),
        parameter_types::CHANNEL_INDEX => Some(2),
        parameter_types::TAG_SEEN_COUNT => Some(2),
        parameter_types::RO_SPEC_ID => Some(4),
        parameter_types::INVENTORY_PARAMETER_SPEC_ID => Some(2),
        parameter_types::C1G2_CRC => Some(2),
        parameter_types::C1G2_PC => Some(2),
        parameter_types::EPC_96 => Some(12),
        parameter_types::SPEC_INDEX => Some(2),
        parameter_types::ACCESS_SPEC_ID => Some(4),
        parameter_types::C1G2_SINGULATION_DETAILS => Some(4),
        parameter_types::C1G2_XPCW1 => Some(2),
        parameter_types::C1G2_XPCW2 => Some(2),
        _ => None,
    }
}
