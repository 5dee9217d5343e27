//! Server-push reload stream (SSE framing).

use std::collections::VecDeque;
use std::io::{self, Read};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};

use crate::reload::HotReloadEvent;

const KEEPALIVE_SECS: u64 = 15;

/// Adapts a bus subscription into a `text/event-stream` body.
///
/// tiny_http drives the response by pulling from a `Read`; each pull
/// blocks until the next event (or a keep-alive tick) and yields one
/// complete SSE frame. EOF when the bus disconnects or shutdown begins.
pub struct EventStream {
    rx: Receiver<HotReloadEvent>,
    pending: VecDeque<u8>,
}

impl EventStream {
    pub fn new(rx: Receiver<HotReloadEvent>) -> Self {
        // Tells the browser how quickly to reconnect after a drop.
        let pending = b"retry: 1000\n\n".to_vec().into();
        Self { rx, pending }
    }

    fn frame(event: &HotReloadEvent) -> Vec<u8> {
        format!("data: {}\n\n", event.to_json()).into_bytes()
    }
}

impl Read for EventStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pending.is_empty() {
            match self.rx.recv_timeout(Duration::from_secs(KEEPALIVE_SECS)) {
                Ok(event) => self.pending.extend(Self::frame(&event)),
                Err(RecvTimeoutError::Timeout) => {
                    if crate::core::is_shutdown() {
                        return Ok(0);
                    }
                    // Comment frame; keeps proxies from closing idle streams.
                    self.pending.extend(b": keep-alive\n\n");
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}
