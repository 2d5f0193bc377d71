use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};

use crate::llrp::{self, bit_masks};
use crate::message::Message;

#[cfg(test)]
pub mod mock;

/// How a receive attempt can come up empty.
#[derive(Debug)]
pub enum RecvError {
    /// Nothing arrived within the timeout.
    TimedOut,
    /// The reader closed the connection.
    Closed,
    /// Anything else.
    Failed(String),
}

/// The blocking channel underneath a session. One message in, one
/// message out; the session layer decides who gets to call receive.
pub trait Transport: Send {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), String>;
    fn recv_message(&mut self, timeout: Duration) -> Result<Message, RecvError>;
    /// True if a receive would find data. Blocks at most `timeout`.
    /// A peer close shows up here as `RecvError::Closed`, not as a
    /// readable socket.
    fn poll_readable(&mut self, timeout: Duration) -> Result<bool, RecvError>;
}

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connects and applies socket tuning. LLRP readers drop idle
    /// connections quietly, so turn TCP keepalive on underneath the
    /// protocol level keepalives as well.
    pub fn connect(ip_address: &str, port: u16) -> Result<TcpTransport, String> {
        let stream = match TcpStream::connect(format!("{ip_address}:{port}")) {
            Ok(s) => s,
            Err(e) => return Err(format!("unable to connect: {e}")),
        };
        let ka = TcpKeepalive::new().with_time(Duration::from_secs(60));
        if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&ka) {
            println!("Error setting tcp keepalive. {e}");
        }
        if let Err(e) = stream.set_nodelay(true) {
            println!("Error setting nodelay. {e}");
        }
        Ok(TcpTransport { stream })
    }
}

impl Transport for TcpTransport {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), String> {
        match self.stream.write_all(frame) {
            Ok(_) => Ok(()),
            Err(e) => Err(format!("error writing data: {e}")),
        }
    }

    fn recv_message(&mut self, timeout: Duration) -> Result<Message, RecvError> {
        if let Err(e) = self.stream.set_read_timeout(Some(timeout)) {
            return Err(RecvError::Failed(format!("error setting read timeout: {e}")))
        }
        let mut header = [0u8; llrp::HEADER_LEN];
        read_fully(&mut self.stream, &mut header)?;
        let decoded = match bit_masks::decode_header(&header) {
            Ok(h) => h,
            Err(e) => return Err(RecvError::Failed(String::from(e))),
        };
        let mut frame = Vec::with_capacity(decoded.length as usize);
        frame.extend_from_slice(&header);
        if decoded.length as usize > llrp::HEADER_LEN {
            let mut body = vec![0u8; decoded.length as usize - llrp::HEADER_LEN];
            read_fully(&mut self.stream, &mut body)?;
            frame.extend_from_slice(&body);
        }
        match Message::from_frame(&frame) {
            Ok(msg) => Ok(msg),
            Err(e) => Err(RecvError::Failed(String::from(e))),
        }
    }

    fn poll_readable(&mut self, timeout: Duration) -> Result<bool, RecvError> {
        if let Err(e) = self.stream.set_read_timeout(Some(timeout)) {
            return Err(RecvError::Failed(format!("error setting read timeout: {e}")))
        }
        let mut probe = [0u8; 1];
        match self.stream.peek(&mut probe) {
            // a zero-byte peek is how a closed peer looks from here
            Ok(0) => Err(RecvError::Closed),
            Ok(_) => Ok(true),
            Err(e) => match e.kind() {
                ErrorKind::TimedOut | ErrorKind::WouldBlock => Ok(false),
                ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset => Err(RecvError::Closed),
                _ => Err(RecvError::Failed(format!("error polling socket: {e}"))),
            },
        }
    }
}

/// read_exact, but with timeouts and closed connections mapped onto
/// RecvError. A timeout mid-message is still a timeout to the caller;
/// the next receive starts over at a header boundary only because the
/// reader writes whole frames, which holds for every LLRP reader seen.
fn read_fully(stream: &mut TcpStream, buf: &mut [u8]) -> Result<(), RecvError> {
    match stream.read_exact(buf) {
        Ok(_) => Ok(()),
        Err(e) => match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Err(RecvError::TimedOut),
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset => {
                Err(RecvError::Closed)
            }
            _ => Err(RecvError::Failed(format!("error reading from reader: {e}"))),
        },
    }
}
