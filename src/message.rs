use crate::llrp::{self, bit_masks, message_types};

/// Coarse classification used by the router. Everything the session
/// layer doesn't recognize lands in Other and gets dropped.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum MessageKind {
    Keepalive,
    ReaderEvent,
    TagReport,
    Response,
    Other,
}

/// One decoded LLRP message. Owns its payload; when the last holder
/// drops it the storage goes with it, so there is no explicit release
/// to forget on an early return.
#[derive(Clone, Debug)]
pub struct Message {
    pub version: u16,
    pub kind: u16,
    pub id: u32,
    pub body: Vec<u8>,
}

impl Message {
    /// Decodes a complete frame (header plus body).
    pub fn from_frame(frame: &[u8]) -> Result<Message, &'static str> {
        let header = bit_masks::decode_header(frame)?;
        if frame.len() != header.length as usize {
            return Err("frame length mismatch")
        }
        Ok(Message {
            version: header.version,
            kind: header.kind,
            id: header.id,
            body: frame[llrp::HEADER_LEN..].to_vec(),
        })
    }

    pub fn classify(&self) -> MessageKind {
        match self.kind {
            message_types::KEEPALIVE => MessageKind::Keepalive,
            message_types::READER_EVENT_NOTIFICATION => MessageKind::ReaderEvent,
            message_types::RO_ACCESS_REPORT => MessageKind::TagReport,
            k if message_types::get_message_name(k).is_some() => MessageKind::Response,
            _ => MessageKind::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        message_types::get_message_name(self.kind).unwrap_or("UNKNOWN")
    }
}
