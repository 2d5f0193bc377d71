use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::capabilities::{Capabilities, ReaderModel};
use crate::errors::ReaderError;
use crate::llrp::encoder::{self, ParamWriter};
use crate::llrp::{decoder, message_types, parameter_types};
use crate::message::Message;
use crate::transport::{RecvError, TcpTransport, Transport};

pub mod receiver;
pub mod router;


pub const DEFAULT_LLRP_PORT: u16 = 5084;

// Per-call wait for a command response, on top of the transport timeout.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_TRANSPORT_TIMEOUT_MS: u64 = 5000;

// Interval the reader is asked to send keepalives at. The receiver's
// watchdog declares the connection dead after four of these in a row
// go missing.
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 5000;
pub const KEEPALIVE_MISSES_ALLOWED: u32 = 4;

/// Regulatory region the reader is operating under. Only the regions
/// relevant to the power clamp are spelled out; everything else rides
/// on Other.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Region {
    Na,
    Eu,
    Other,
}

/// What the synchronous completion tracker is currently waiting on.
/// ConnectionLost is sticky: once the watchdog sets it, it stays set
/// until the session reconnects.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Completion {
    Idle,
    Pending(u32),
    ConnectionLost,
}

/// State shared with the background receiver thread, all guarded by
/// the one mutex in ReceiverControl.
pub(crate) struct ReceiverState {
    /// should the thread be pumping the transport
    pub enabled: bool,
    /// is it currently inside a pump iteration
    pub running: bool,
    /// checked at the top of every loop iteration
    pub cancel: bool,
    pub completion: Completion,
    /// tag report messages owned by the buffer until the foreground
    /// wait drains them
    pub reports: Vec<Message>,
    pub last_receive: Instant,
    /// running total of tags handed to the caller over the session
    pub tags_reported: u64,
}

pub(crate) struct ReceiverControl {
    pub state: Mutex<ReceiverState>,
    pub cond: Condvar,
}

impl ReceiverControl {
    fn new() -> ReceiverControl {
        ReceiverControl {
            state: Mutex::new(ReceiverState {
                enabled: false,
                running: false,
                cancel: false,
                completion: Completion::Idle,
                reports: Vec::new(),
                last_receive: Instant::now(),
                tags_reported: 0,
            }),
            cond: Condvar::new(),
        }
    }
}

/// The pieces of a session both threads touch. The foreground caller
/// and the receiver thread each hold an Arc of this.
pub(crate) struct SessionCore {
    pub transport: Mutex<Option<Box<dyn Transport>>>,
    pub msg_id: Mutex<u32>,
    /// continuous (background) reading vs synchronous reading
    pub continuous: Mutex<bool>,
    pub receiver: ReceiverControl,
    pub keepalive_interval: Mutex<Duration>,
    pub transport_timeout: Duration,
}

impl SessionCore {
    pub fn get_next_id(&self) -> u32 {
        let mut output: u32 = 0;
        if let Ok(mut v) = self.msg_id.lock() {
            output = *v + 1;
            *v = output;
        }
        output
    }

    pub fn send_frame(&self, frame: &[u8]) -> Result<(), ReaderError> {
        if let Ok(mut transport) = self.transport.lock() {
            match transport.as_mut() {
                Some(t) => t.send_frame(frame).map_err(ReaderError::SendIo),
                None => Err(ReaderError::SendIo(String::from("not connected"))),
            }
        } else {
            Err(ReaderError::SendIo(String::from("unable to get transport mutex")))
        }
    }

    pub fn recv_message(&self, timeout: Duration) -> Result<Message, ReaderError> {
        if let Ok(mut transport) = self.transport.lock() {
            match transport.as_mut() {
                Some(t) => match t.recv_message(timeout) {
                    Ok(msg) => Ok(msg),
                    Err(RecvError::TimedOut) => {
                        Err(ReaderError::ReceiveIo(String::from("timed out")))
                    }
                    Err(RecvError::Closed) => {
                        Err(ReaderError::ReceiveIo(String::from("connection closed")))
                    }
                    Err(RecvError::Failed(e)) => Err(ReaderError::ReceiveIo(e)),
                },
                None => Err(ReaderError::ReceiveIo(String::from("not connected"))),
            }
        } else {
            Err(ReaderError::ReceiveIo(String::from("unable to get transport mutex")))
        }
    }

    /// Flips the background receiver on or off. Turning it off blocks
    /// until the thread confirms it is out of its pump iteration, so
    /// after this returns the transport belongs to the caller.
    pub fn set_receiver_enabled(&self, enable: bool) {
        let ctrl = &self.receiver;
        if let Ok(mut state) = ctrl.state.lock() {
            if enable {
                state.enabled = true;
                state.last_receive = Instant::now();
                ctrl.cond.notify_all();
            } else {
                state.enabled = false;
                ctrl.cond.notify_all();
                let result = ctrl.cond.wait_while(state, |s| s.running);
                if result.is_err() {
                    println!("Error waiting for receiver to stand down.");
                }
            }
        }
    }
}

/// Direction and shape of a frame crossing the transport, handed to a
/// registered trace listener.
pub struct TraceEvent {
    pub outbound: bool,
    pub kind: u16,
    pub id: u32,
    pub length: usize,
}

pub type TraceListener = dyn Fn(&TraceEvent) + Send + Sync;

/// One physical connection to a reader. A session supports exactly one
/// foreground caller; the only other thread touching it is its own
/// background receiver. Concurrent foreground callers on one session
/// are not coordinated, same as vendor SDKs for this protocol family.
pub struct Session {
    nickname: String,
    ip_address: String,
    port: u16,

    pub(crate) core: Arc<SessionCore>,
    command_timeout: Duration,

    region: Region,
    tag_op_antenna: u16,
    capabilities: Option<Capabilities>,

    pub(crate) rospec_id: Mutex<u32>,
    pub(crate) access_spec_id: Mutex<u32>,
    pub(crate) op_spec_id: Mutex<u16>,
    pub(crate) active_rospec: Mutex<Option<u32>>,
    pub(crate) multi_plan: Mutex<bool>,

    receiver_handle: Mutex<Option<JoinHandle<()>>>,
    trace: Option<Arc<TraceListener>>,
}

impl Session {
    /// Connects to a reader and runs the initialization ladder:
    /// keepalive spec, stale spec cleanup, event notifications,
    /// events-and-reports enable, capability fetch.
    pub fn connect(nickname: String, ip_address: String, port: u16) -> Result<Session, ReaderError> {
        let transport = TcpTransport::connect(&ip_address, port).map_err(ReaderError::SendIo)?;
        let mut session = Session::with_transport(nickname, ip_address, port, Box::new(transport))?;
        session.initialize()?;
        Ok(session)
    }

    /// Builds a session over an already-open transport and starts the
    /// receiver thread. No initialization traffic is sent.
    pub fn with_transport(
        nickname: String,
        ip_address: String,
        port: u16,
        transport: Box<dyn Transport>,
    ) -> Result<Session, ReaderError> {
        let core = Arc::new(SessionCore {
            transport: Mutex::new(Some(transport)),
            msg_id: Mutex::new(0),
            continuous: Mutex::new(false),
            receiver: ReceiverControl::new(),
            keepalive_interval: Mutex::new(Duration::from_millis(DEFAULT_KEEPALIVE_INTERVAL_MS)),
            transport_timeout: Duration::from_millis(DEFAULT_TRANSPORT_TIMEOUT_MS),
        });
        let handle = receiver::spawn(core.clone())?;
        // rospec ids start at a random point so a new session can't
        // collide with leftovers a crashed session never deleted
        let base: u32 = (rand::random::<u16>() as u32) << 8;
        Ok(Session {
            nickname,
            ip_address,
            port,
            core,
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            region: Region::Other,
            tag_op_antenna: 1,
            capabilities: None,
            rospec_id: Mutex::new(base + 1),
            access_spec_id: Mutex::new(base + 1),
            op_spec_id: Mutex::new(1),
            active_rospec: Mutex::new(None),
            multi_plan: Mutex::new(false),
            receiver_handle: Mutex::new(Some(handle)),
            trace: None,
        })
    }

    pub fn nickname(&self) -> &str {
        self.nickname.as_str()
    }

    pub fn ip_address(&self) -> &str {
        self.ip_address.as_str()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn set_tag_op_antenna(&mut self, antenna: u16) {
        self.tag_op_antenna = antenna;
    }

    pub fn tag_op_antenna(&self) -> u16 {
        self.tag_op_antenna
    }

    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.command_timeout = timeout;
    }

    pub fn set_trace_listener(&mut self, listener: Arc<TraceListener>) {
        self.trace = Some(listener);
    }

    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    pub fn is_continuous(&self) -> bool {
        match self.core.continuous.lock() {
            Ok(c) => *c,
            Err(_) => false,
        }
    }

    pub(crate) fn set_continuous(&self, continuous: bool) {
        if let Ok(mut c) = self.core.continuous.lock() {
            *c = continuous;
        }
    }

    /// Total tags handed back over the life of the session.
    pub fn tags_reported(&self) -> u64 {
        match self.core.receiver.state.lock() {
            Ok(s) => s.tags_reported,
            Err(_) => 0,
        }
    }

    fn notify_trace(&self, outbound: bool, kind: u16, id: u32, length: usize) {
        if let Some(listener) = &self.trace {
            listener(&TraceEvent { outbound, kind, id, length });
        }
    }

    /// Sends a request built by `build`, which receives the assigned
    /// message id. No response is read.
    pub fn send<F>(&self, kind: u16, build: F) -> Result<u32, ReaderError>
    where
        F: FnOnce(u32) -> Vec<u8>,
    {
        let id = self.core.get_next_id();
        let frame = build(id);
        self.notify_trace(true, kind, id, frame.len());
        self.core.send_frame(&frame)?;
        Ok(id)
    }

    /// Receives one message, waiting the caller's timeout plus the
    /// configured transport timeout.
    pub fn receive(&self, timeout: Duration) -> Result<Message, ReaderError> {
        let msg = self.core.recv_message(timeout + self.core.transport_timeout)?;
        self.notify_trace(false, msg.kind, msg.id, msg.body.len());
        Ok(msg)
    }

    /// Sends a request and waits for its matching response type. Any
    /// other message that arrives in between goes to the router the
    /// same way the background receiver would have handled it.
    ///
    /// Outside continuous mode the background receiver is stood down
    /// for the duration so only this thread reads the transport; it is
    /// re-enabled on every exit path.
    ///
    /// Each receive inside the loop waits the full command timeout
    /// again rather than a shrinking share of it. A busy reader can
    /// therefore stretch the wall clock past the nominal timeout; the
    /// vendor protocol layer this mirrors behaves identically.
    pub fn send_and_receive<F>(&self, kind: u16, build: F) -> Result<Message, ReaderError>
    where
        F: FnOnce(u32) -> Vec<u8>,
    {
        let continuous = self.is_continuous();
        if !continuous {
            self.core.set_receiver_enabled(false);
        }
        let result = self.exchange(kind, build);
        if !continuous {
            self.core.set_receiver_enabled(true);
        }
        result
    }

    fn exchange<F>(&self, kind: u16, build: F) -> Result<Message, ReaderError>
    where
        F: FnOnce(u32) -> Vec<u8>,
    {
        let expected = match message_types::response_type(kind) {
            Some(t) => t,
            None => return Err(ReaderError::InvalidValue(format!("message type {kind} has no response"))),
        };
        self.send(kind, build)?;
        loop {
            let msg = self.receive(self.command_timeout)?;
            if msg.kind == expected {
                return Ok(msg)
            }
            if msg.kind == message_types::ERROR_MESSAGE {
                let code = decoder::status_code(&msg.body)
                    .map_err(|e| ReaderError::MessageParse(String::from(e)))?;
                return Err(ReaderError::ProtocolStatus(code))
            }
            if let Err(e) = router::route(&self.core, msg) {
                println!("Error handling interleaved message. {e}");
            }
        }
    }

    /// Runs a request/response pair and checks the embedded LLRPStatus
    /// before anyone looks at the rest of the response.
    pub fn command<F>(&self, kind: u16, build: F) -> Result<Message, ReaderError>
    where
        F: FnOnce(u32) -> Vec<u8>,
    {
        let response = self.send_and_receive(kind, build)?;
        let code = decoder::status_code(&response.body)
            .map_err(|e| ReaderError::MessageParse(String::from(e)))?;
        if code != parameter_types::M_SUCCESS {
            return Err(ReaderError::ProtocolStatus(code))
        }
        Ok(response)
    }

    /// The connect-time ladder. Mirrors what a reader expects before
    /// it will produce reports: keepalives configured, stale specs
    /// cleared, event notifications chosen, reporting unlocked.
    pub fn initialize(&mut self) -> Result<(), ReaderError> {
        let interval = match self.core.keepalive_interval.lock() {
            Ok(i) => *i,
            Err(_) => Duration::from_millis(DEFAULT_KEEPALIVE_INTERVAL_MS),
        };
        self.set_keepalive_spec(interval)?;
        self.stop_active_rospecs()?;
        self.delete_all_access_specs()?;
        self.set_event_notifications()?;
        self.enable_events_and_reports()?;
        let capabilities = self.fetch_capabilities()?;
        self.capabilities = Some(capabilities);
        println!("Reader {} initialized.", self.nickname);
        Ok(())
    }

    /// Asks the reader for periodic keepalives at the given interval.
    pub fn set_keepalive_spec(&self, interval: Duration) -> Result<(), ReaderError> {
        if interval.as_millis() == 0 || interval.as_millis() > u32::MAX as u128 {
            return Err(ReaderError::InvalidValue(String::from("keepalive interval out of range")))
        }
        self.command(message_types::SET_READER_CONFIG, |id| {
            let mut w = ParamWriter::new();
            w.u8(0); // don't restore factory defaults
            w.begin_param(parameter_types::KEEPALIVE_SPEC)
                .u8(1) // periodic trigger
                .u32(interval.as_millis() as u32)
                .end_param();
            w.into_message(message_types::SET_READER_CONFIG, id)
        })?;
        if let Ok(mut i) = self.core.keepalive_interval.lock() {
            *i = interval;
        }
        Ok(())
    }

    /// Turns on the reader event notifications the session layer
    /// depends on: ROSpec events, buffer fill warnings, exceptions.
    pub fn set_event_notifications(&self) -> Result<(), ReaderError> {
        self.command(message_types::SET_READER_CONFIG, |id| {
            let mut w = ParamWriter::new();
            w.u8(0);
            w.begin_param(parameter_types::READER_EVENT_NOTIFICATION_SPEC);
            for event_type in [2u16, 3u16, 4u16] {
                w.begin_param(parameter_types::EVENT_NOTIFICATION_STATE)
                    .u16(event_type)
                    .u8(0x80)
                    .end_param();
            }
            w.end_param();
            w.into_message(message_types::SET_READER_CONFIG, id)
        })?;
        Ok(())
    }

    /// ENABLE_EVENTS_AND_REPORTS has no response defined; send only.
    pub fn enable_events_and_reports(&self) -> Result<(), ReaderError> {
        self.send(message_types::ENABLE_EVENTS_AND_REPORTS, |id| {
            encoder::frame(message_types::ENABLE_EVENTS_AND_REPORTS, id, &[])
        })?;
        Ok(())
    }

    /// Fetches and parses the capability snapshot. Called once at
    /// connect; the cached copy is read-only afterward.
    pub fn fetch_capabilities(&self) -> Result<Capabilities, ReaderError> {
        let response = self.command(message_types::GET_READER_CAPABILITIES, |id| {
            let mut w = ParamWriter::new();
            w.u8(0); // requested data: all
            w.into_message(message_types::GET_READER_CAPABILITIES, id)
        })?;
        Capabilities::parse(&response.body)
    }

    /// Sets transmit power on one antenna, in centi-dBm. Clamps are
    /// checked against the model/region limits before anything is put
    /// on the wire.
    pub fn set_power_level(&self, antenna: u16, value: i16) -> Result<(), ReaderError> {
        self.check_power_limit(antenna, value)?;
        let index = match self.capabilities.as_ref() {
            Some(caps) => caps.power_index_for(value).ok_or_else(|| {
                ReaderError::InvalidValue(format!("no power table entry for {value}"))
            })?,
            None => return Err(ReaderError::InvalidValue(String::from("capabilities not fetched"))),
        };
        self.command(message_types::SET_READER_CONFIG, |id| {
            let mut w = ParamWriter::new();
            w.u8(0);
            w.begin_param(parameter_types::ANTENNA_CONFIGURATION);
            w.u16(antenna);
            w.begin_param(parameter_types::RF_TRANSMITTER)
                .u16(0) // hop table id
                .u16(1) // channel index
                .u16(index)
                .end_param();
            w.end_param();
            w.into_message(message_types::SET_READER_CONFIG, id)
        })?;
        Ok(())
    }

    /// The vendor safety clamp: some model/region/antenna combinations
    /// must not be driven at full table power.
    pub fn check_power_limit(&self, antenna: u16, value: i16) -> Result<(), ReaderError> {
        if let Some(caps) = self.capabilities.as_ref() {
            if caps.model == ReaderModel::AstraEx && self.region == Region::Na && antenna == 1 && value > 3000 {
                return Err(ReaderError::PowerTooHigh(format!(
                    "{value} exceeds 3000 for Astra-EX antenna 1 in region NA"
                )))
            }
            if let Some(max) = caps.max_power() {
                if value > max {
                    return Err(ReaderError::PowerTooHigh(format!("{value} exceeds reader maximum {max}")))
                }
            }
        }
        Ok(())
    }

    /// Sets the completion tracker up to wait for `n` ROSpecs to
    /// finish. Called before starting a synchronous read.
    pub fn expect_rospec_events(&self, n: u32) {
        if let Ok(mut state) = self.core.receiver.state.lock() {
            if state.completion != Completion::ConnectionLost {
                state.completion = Completion::Pending(n);
            }
        }
    }

    /// Blocks until every expected ROSpec has reported end of
    /// operation, then hands back the buffered report messages. Once
    /// the watchdog has declared the connection lost this returns the
    /// error immediately, no matter how often it is called.
    pub fn wait_for_completion(&self) -> Result<CompletedRead, ReaderError> {
        let ctrl = &self.core.receiver;
        let guard = match ctrl.state.lock() {
            Ok(g) => g,
            Err(_) => return Err(ReaderError::ReceiveIo(String::from("receiver state poisoned"))),
        };
        let mut state = match ctrl.cond.wait_while(guard, |s| {
            matches!(s.completion, Completion::Pending(n) if n > 0)
        }) {
            Ok(s) => s,
            Err(_) => return Err(ReaderError::ReceiveIo(String::from("receiver state poisoned"))),
        };
        if state.completion == Completion::ConnectionLost {
            return Err(ReaderError::ConnectionLost)
        }
        state.completion = Completion::Idle;
        let reports: Vec<Message> = std::mem::take(&mut state.reports);
        let mut tag_count: u32 = 0;
        for report in &reports {
            tag_count += crate::reports::count_tag_reports(&report.body) as u32;
        }
        state.tags_reported += tag_count as u64;
        Ok(CompletedRead { tag_count, reports })
    }

    /// Cancels the receiver thread and joins it. Idempotent: after the
    /// first call the handle is gone and there is nothing to do.
    fn shutdown_receiver(&self) {
        if let Ok(mut state) = self.core.receiver.state.lock() {
            state.cancel = true;
            self.core.receiver.cond.notify_all();
        }
        if let Ok(mut handle) = self.receiver_handle.lock() {
            if let Some(h) = handle.take() {
                if h.join().is_err() {
                    println!("Receiver thread for {} panicked.", self.nickname);
                }
            }
        }
    }

    /// Cancels the receiver thread, closes the protocol connection and
    /// drops the transport. Safe to call more than once.
    pub fn disconnect(&mut self) -> Result<(), ReaderError> {
        _ = self.stop_reading();
        self.shutdown_receiver();
        let close = self.send(message_types::CLOSE_CONNECTION, |id| {
            encoder::frame(message_types::CLOSE_CONNECTION, id, &[])
        });
        if close.is_ok() {
            // best effort read of the close response so the reader
            // sees a clean shutdown
            _ = self.receive(self.command_timeout);
        }
        if let Ok(mut transport) = self.core.transport.lock() {
            *transport = None;
        }
        println!("Reader {} disconnected.", self.nickname);
        Ok(())
    }
}

/// A session dropped without a disconnect still reclaims its receiver
/// thread, which would otherwise park forever holding the core and the
/// open transport. The protocol-level close stays disconnect's job.
impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown_receiver();
    }
}

/// What a finished synchronous read hands back: how many tags were
/// seen and the raw report messages, now owned by the caller.
#[derive(Debug)]
pub struct CompletedRead {
    pub tag_count: u32,
    pub reports: Vec<Message>,
}
