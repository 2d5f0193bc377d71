use super::{bit_masks, parameter_types};

/// One parameter pulled out of a message body or a parent parameter.
/// For TLV parameters `value` is the bytes after the 4 byte header,
/// which may contain further nested parameters. For TV parameters it
/// is the fixed-length value after the type byte.
pub struct Param<'a> {
    pub kind: u16,
    pub tv: bool,
    pub value: &'a [u8],
}

/// Walks the parameters laid end to end in `buf`. Yields an error item
/// and stops if the data doesn't parse.
pub struct ParamIter<'a> {
    buf: &'a [u8],
    pos: usize,
}

pub fn params(buf: &[u8]) -> ParamIter {
    ParamIter { buf, pos: 0 }
}

impl<'a> Iterator for ParamIter<'a> {
    type Item = Result<Param<'a>, &'static str>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None
        }
        let rest = &self.buf[self.pos..];
        if rest[0] & 0x80 != 0 {
            // TV encoded, no length field
            let kind = (rest[0] & 0x7F) as u16;
            let len = match bit_masks::tv_value_len(kind) {
                Some(l) => l,
                None => {
                    self.pos = self.buf.len();
                    return Some(Err("unknown tv parameter type"))
                }
            };
            if rest.len() < 1 + len {
                self.pos = self.buf.len();
                return Some(Err("short tv parameter"))
            }
            self.pos += 1 + len;
            return Some(Ok(Param {
                kind,
                tv: true,
                value: &rest[1..1 + len],
            }))
        }
        if rest.len() < 4 {
            self.pos = self.buf.len();
            return Some(Err("short tlv header"))
        }
        let first = ((rest[0] as u16) << 8) | rest[1] as u16;
        let info = match bit_masks::get_param_type(&first) {
            Ok(i) => i,
            Err(e) => {
                self.pos = self.buf.len();
                return Some(Err(e))
            }
        };
        let len = (((rest[2] as u16) << 8) | rest[3] as u16) as usize;
        if len < 4 || rest.len() < len {
            self.pos = self.buf.len();
            return Some(Err("invalid tlv length"))
        }
        self.pos += len;
        Some(Ok(Param {
            kind: info.kind,
            tv: false,
            value: &rest[4..len],
        }))
    }
}

/// First parameter of the given kind at this nesting level.
pub fn find_param<'a>(buf: &'a [u8], kind: u16) -> Option<Param<'a>> {
    for p in params(buf) {
        match p {
            Ok(p) => {
                if p.kind == kind {
                    return Some(p)
                }
            }
            Err(_) => return None,
        }
    }
    None
}

/// Status code out of the LLRPStatus parameter every response carries.
pub fn status_code(body: &[u8]) -> Result<u16, &'static str> {
    match find_param(body, parameter_types::LLRP_STATUS) {
        Some(p) => {
            if p.value.len() < 2 {
                return Err("llrp status too short")
            }
            Ok(((p.value[0] as u16) << 8) | p.value[1] as u16)
        }
        None => Err("no llrp status in response"),
    }
}

pub fn read_u16(buf: &[u8], at: usize) -> Result<u16, &'static str> {
    if buf.len() < at + 2 {
        return Err("short read")
    }
    Ok(((buf[at] as u16) << 8) | buf[at + 1] as u16)
}

pub fn read_u32(buf: &[u8], at: usize) -> Result<u32, &'static str> {
    if buf.len() < at + 4 {
        return Err("short read")
    }
    Ok(((buf[at] as u32) << 24) | ((buf[at + 1] as u32) << 16) | ((buf[at + 2] as u32) << 8) | buf[at + 3] as u32)
}

pub fn read_u64(buf: &[u8], at: usize) -> Result<u64, &'static str> {
    if buf.len() < at + 8 {
        return Err("short read")
    }
    let mut v: u64 = 0;
    for b in &buf[at..at + 8] {
        v = (v << 8) | *b as u64;
    }
    Ok(v)
}

/// Vendor and subtype of a custom parameter, plus the remaining value.
pub fn custom_subtype<'a>(p: &Param<'a>) -> Result<(u32, u32, &'a [u8]), &'static str> {
    if p.kind != parameter_types::CUSTOM_PARAMETER {
        return Err("not a custom parameter")
    }
    let vendor = read_u32(p.value, 0)?;
    let subtype = read_u32(p.value, 4)?;
    Ok((vendor, subtype, &p.value[8..]))
}

#[cfg(test)]
mod tests;
