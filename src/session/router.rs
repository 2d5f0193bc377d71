use super::{Completion, SessionCore};
use crate::errors::ReaderError;
use crate::llrp::{decoder, encoder, message_types, parameter_types};
use crate::message::{Message, MessageKind};

/// Dispatches one inbound message. Total over every message type: a
/// message either transfers into the pending-report buffer or is
/// dropped here; nothing leaks out unowned.
pub(crate) fn route(core: &SessionCore, msg: Message) -> Result<(), ReaderError> {
    match msg.classify() {
        MessageKind::Keepalive => {
            let id = core.get_next_id();
            let ack = encoder::frame(message_types::KEEPALIVE_ACK, id, &[]);
            core.send_frame(&ack)
        }
        MessageKind::ReaderEvent => {
            handle_reader_event(core, &msg);
            Ok(())
        }
        MessageKind::TagReport => {
            // ownership moves into the buffer; the synchronous wait
            // path drains and releases it
            if let Ok(mut state) = core.receiver.state.lock() {
                state.reports.push(msg);
            }
            Ok(())
        }
        MessageKind::Response | MessageKind::Other => {
            println!("Discarding unexpected {} message.", msg.name());
            Ok(())
        }
    }
}

// ROSpecEvent event types
const ROSPEC_EVENT_END: u8 = 1;

/// End-of-ROSpec events complete one step of a synchronous read. In
/// continuous mode rospecs end and restart on their own schedule and
/// the counter is left alone.
fn handle_reader_event(core: &SessionCore, msg: &Message) {
    let continuous = match core.continuous.lock() {
        Ok(c) => *c,
        Err(_) => return,
    };
    if continuous {
        return;
    }
    let data = match decoder::find_param(&msg.body, parameter_types::READER_EVENT_NOTIFICATION_DATA) {
        Some(p) => p,
        None => return,
    };
    let event = match decoder::find_param(data.value, parameter_types::RO_SPEC_EVENT) {
        Some(p) => p,
        None => return,
    };
    if event.value.is_empty() || event.value[0] != ROSPEC_EVENT_END {
        return;
    }
    if let Ok(mut state) = core.receiver.state.lock() {
        if let Completion::Pending(n) = state.completion {
            if n > 0 {
                state.completion = Completion::Pending(n - 1);
                if n == 1 {
                    core.receiver.cond.notify_all();
                }
            }
        }
    }
}
