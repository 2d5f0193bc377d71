use super::{bit_masks, THINGMAGIC_VENDOR_ID, VERSION_1_0};

/// Builds LLRP message bodies out of nested TLV and TV parameters.
/// Fixed-shape requests can still be written out as plain byte arrays,
/// but anything carrying a filter, an antenna list or a variable length
/// spec goes through here so the lengths get patched for us.
pub struct ParamWriter {
    buf: Vec<u8>,
    // byte offsets of the length fields of currently open TLV params
    open: Vec<usize>,
}

impl ParamWriter {
    pub fn new() -> ParamWriter {
        ParamWriter {
            buf: Vec::new(),
            open: Vec::new(),
        }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    /// Opens a TLV parameter. Must be matched by a call to end_param.
    pub fn begin_param(&mut self, kind: u16) -> &mut Self {
        self.buf.extend_from_slice(&(kind & bit_masks::PARAM_TYPE).to_be_bytes());
        self.open.push(self.buf.len());
        // length placeholder, patched in end_param
        self.buf.extend_from_slice(&[0x00, 0x00]);
        self
    }

    pub fn end_param(&mut self) -> &mut Self {
        // an unmatched end_param is a bug in the builder itself, not
        // anything a caller can cause at run time
        let at = self.open.pop().expect("end_param without begin_param");
        let len = (self.buf.len() - at + 2) as u16;
        self.buf[at] = ((len & 0xFF00) >> 8) as u8;
        self.buf[at + 1] = (len & 0x00FF) as u8;
        self
    }

    /// Writes a TV parameter header. The caller writes the value bytes.
    pub fn tv(&mut self, kind: u16) -> &mut Self {
        self.buf.push(0x80 | (kind as u8 & 0x7F));
        self
    }

    /// Opens a ThingMagic custom parameter with the given subtype.
    pub fn begin_custom(&mut self, subtype: u32) -> &mut Self {
        self.begin_param(super::parameter_types::CUSTOM_PARAMETER);
        self.u32(THINGMAGIC_VENDOR_ID);
        self.u32(subtype);
        self
    }

    /// Finishes the body and frames it as a complete message.
    pub fn into_message(self, kind: u16, id: u32) -> Vec<u8> {
        frame(kind, id, &self.buf)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Frames a message body with the 10 byte LLRP header.
pub fn frame(kind: u16, id: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(super::HEADER_LEN + body.len());
    out.extend_from_slice(&bit_masks::encode_header(VERSION_1_0, kind, id, body.len()));
    out.extend_from_slice(body);
    out
}
