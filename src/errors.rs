use std::fmt;

use crate::llrp::parameter_types;

#[derive(Debug)]
pub enum ReaderError {
    /// The connection is absent or the underlying send failed.
    SendIo(String),
    /// Receive failed or timed out.
    ReceiveIo(String),
    /// A well formed response was missing an expected field or parameter.
    MessageParse(String),
    /// The response carried a non-success LLRP status code.
    ProtocolStatus(u16),
    /// The keepalive watchdog saw nothing from the reader for too long.
    ConnectionLost,
    /// Protocol or tag operation variant this session layer doesn't do.
    Unsupported(String),
    /// Caller supplied parameter out of range.
    InvalidValue(String),
    /// Requested power exceeds the safety clamp for this model/region.
    PowerTooHigh(String),
    /// The background receiver thread could not be started.
    NoThreads,
}

impl std::error::Error for ReaderError {}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReaderError::SendIo(val) => write!(f, "Send Error: {val}"),
            ReaderError::ReceiveIo(val) => write!(f, "Receive Error: {val}"),
            ReaderError::MessageParse(val) => write!(f, "Message Parse Error: {val}"),
            ReaderError::ProtocolStatus(code) => {
                match parameter_types::get_llrp_status_name(*code) {
                    Some(name) => write!(f, "LLRP Status Error: {name}"),
                    None => write!(f, "LLRP Status Error: code {code}"),
                }
            }
            ReaderError::ConnectionLost => write!(f, "Connection Lost"),
            ReaderError::Unsupported(val) => write!(f, "Unsupported: {val}"),
            ReaderError::InvalidValue(val) => write!(f, "Invalid Value: {val}"),
            ReaderError::PowerTooHigh(val) => write!(f, "Power Too High: {val}"),
            ReaderError::NoThreads => write!(f, "Unable To Start Receiver Thread"),
        }
    }
}
