use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::{router, Completion, SessionCore, KEEPALIVE_MISSES_ALLOWED};
use crate::errors::ReaderError;
use crate::transport::RecvError;

// How long one readiness poll blocks; also the cancellation latency.
pub const POLL_PERIOD_MS: u64 = 100;

/// Starts the background receiver for a session. One thread, alive for
/// the session's lifetime, exits when the cancel flag is set.
pub(crate) fn spawn(core: Arc<SessionCore>) -> Result<thread::JoinHandle<()>, ReaderError> {
    thread::Builder::new()
        .name(String::from("llrp-receiver"))
        .spawn(move || run(core))
        .map_err(|_| ReaderError::NoThreads)
}

fn run(core: Arc<SessionCore>) {
    println!("Receiver thread started.");
    loop {
        // wait here until enabled, leaving running false so a
        // foreground disable call never blocks on us
        {
            let ctrl = &core.receiver;
            let guard = match ctrl.state.lock() {
                Ok(g) => g,
                Err(_) => break,
            };
            let mut state = match ctrl.cond.wait_while(guard, |s| !s.enabled && !s.cancel) {
                Ok(s) => s,
                Err(_) => break,
            };
            if state.cancel {
                state.running = false;
                ctrl.cond.notify_all();
                break;
            }
            state.running = true;
        }
        pump(&core);
        {
            let ctrl = &core.receiver;
            if let Ok(mut state) = ctrl.state.lock() {
                state.running = false;
                ctrl.cond.notify_all();
                if state.cancel {
                    break;
                }
            } else {
                break;
            }
        }
    }
    println!("Receiver thread has now closed.");
}

/// One pump iteration: poll for readability, receive and route if data
/// is there, then let the watchdog look at the clock.
fn pump(core: &Arc<SessionCore>) {
    let poll = Duration::from_millis(POLL_PERIOD_MS);
    // nothing left to pump on a dead link; idle at the poll cadence so
    // cancellation still lands quickly
    {
        let lost = match core.receiver.state.lock() {
            Ok(state) => state.completion == Completion::ConnectionLost,
            Err(_) => false,
        };
        if lost {
            thread::sleep(poll);
            return;
        }
    }
    let ready = {
        match core.transport.lock() {
            Ok(mut transport) => match transport.as_mut() {
                Some(t) => t.poll_readable(poll),
                None => Err(RecvError::Failed(String::from("not connected"))),
            },
            Err(_) => Err(RecvError::Failed(String::from("unable to get transport mutex"))),
        }
    };
    match ready {
        Ok(true) => {
            let received = match core.transport.lock() {
                Ok(mut transport) => match transport.as_mut() {
                    Some(t) => t.recv_message(core.transport_timeout),
                    None => Err(RecvError::Closed),
                },
                Err(_) => Err(RecvError::Failed(String::from("unable to get transport mutex"))),
            };
            match received {
                Ok(msg) => {
                    if let Ok(mut state) = core.receiver.state.lock() {
                        state.last_receive = Instant::now();
                    }
                    if let Err(e) = router::route(core, msg) {
                        println!("Error routing message. {e}");
                    }
                }
                Err(RecvError::TimedOut) => (),
                Err(RecvError::Closed) => {
                    mark_connection_lost(core);
                    return;
                }
                Err(RecvError::Failed(e)) => {
                    println!("Error reading from reader. {e}");
                }
            }
        }
        Ok(false) => (),
        // a close seen at the poll stage counts the same as one seen
        // mid-receive; no reason to wait out the watchdog
        Err(RecvError::Closed) => {
            mark_connection_lost(core);
            return;
        }
        Err(RecvError::TimedOut) => (),
        Err(RecvError::Failed(e)) => {
            println!("Error polling reader socket. {e}");
        }
    }
    watchdog(core);
}

/// Declares the connection dead if the reader has been silent past the
/// allowed number of keepalive intervals, and wakes every foreground
/// waiter so nobody hangs on a dead link. Re-firing is harmless: lost
/// stays lost.
fn watchdog(core: &Arc<SessionCore>) {
    let interval = match core.keepalive_interval.lock() {
        Ok(i) => *i,
        Err(_) => return,
    };
    let limit = interval * KEEPALIVE_MISSES_ALLOWED;
    if let Ok(state) = core.receiver.state.lock() {
        if state.last_receive.elapsed() <= limit {
            return;
        }
    } else {
        return;
    }
    mark_connection_lost(core);
}

fn mark_connection_lost(core: &Arc<SessionCore>) {
    if let Ok(mut state) = core.receiver.state.lock() {
        if state.completion != Completion::ConnectionLost {
            println!("Keepalive watchdog fired; marking connection lost.");
            state.completion = Completion::ConnectionLost;
            core.receiver.cond.notify_all();
        }
    }
}
