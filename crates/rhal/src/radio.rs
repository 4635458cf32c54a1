//! Byte-oriented radio link transport.
//!
//! The framing layer sees the radio module as a serial pipe: a transmit
//! side that accepts byte runs (and may block while the outgoing buffer
//! drains) and a ring-buffered receive side that reports per-byte line
//! errors. The hosted implementation below replaces the UART interrupt
//! glue with in-memory rings shared between endpoints.

use std::collections::VecDeque;
use std::sync::Arc;

use bitflags::bitflags;
use spin::Mutex;

bitflags! {
    /// Error flags reported by the receive side of the link, one bit per
    /// hardware condition, matching the status byte of the underlying
    /// UART driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineStatus: u8 {
        /// Start/stop bit framing violation.
        const FRAMING = 1 << 0;
        /// Receiver register overrun; at least one byte was lost.
        const OVERRUN = 1 << 1;
        /// Software ring buffer overflow; at least one byte was lost.
        const OVERFLOW = 1 << 2;
    }
}

/// Errors surfaced by [`Transport::rx_read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RxError {
    /// Fewer bytes buffered than requested.
    #[error("no data buffered")]
    NoData,
    /// The line reported an error for one of the requested bytes.
    #[error("line error: {0:?}")]
    Line(LineStatus),
}

/// The byte-level transport under the framing layer.
pub trait Transport: Send {
    /// Bring the link up. Hosted links need no setup.
    fn init(&mut self) {}

    /// Queue `bytes` for transmission. May block while the outgoing
    /// buffer is full; callers must not hold a critical section across
    /// large writes.
    fn tx_write(&mut self, bytes: &[u8]);

    /// Number of received bytes ready to be read.
    fn rx_count(&self) -> u16;

    /// Read exactly `buf.len()` received bytes. Fails with
    /// [`RxError::NoData`] when fewer are buffered, or with the line
    /// status of the first bad byte encountered.
    fn rx_read(&mut self, buf: &mut [u8]) -> Result<(), RxError>;
}

// ── Hosted pipe transport ───────────────────────────────────────

/// One received byte, or the line error that clobbered its slot.
type RxEntry = Result<u8, LineStatus>;

type Ring = Arc<Mutex<VecDeque<RxEntry>>>;

/// An in-memory link endpoint.
///
/// `Pipe::pair` wires two endpoints back to back like a radio channel;
/// `Pipe::loopback` wires an endpoint to itself, which is how a node
/// addresses a frame to its own board.
pub struct Pipe {
    rx: Ring,
    tx: Ring,
}

impl Pipe {
    /// Two endpoints, each transmitting into the other's receive ring.
    pub fn pair() -> (Pipe, Pipe) {
        let a = Ring::default();
        let b = Ring::default();
        (
            Pipe {
                rx: a.clone(),
                tx: b.clone(),
            },
            Pipe { rx: b, tx: a },
        )
    }

    /// A single endpoint whose transmissions land in its own receive ring.
    pub fn loopback() -> Pipe {
        let ring = Ring::default();
        Pipe {
            rx: ring.clone(),
            tx: ring,
        }
    }

    /// Simulate a line error on the receive side: the next read that
    /// crosses this slot fails with the given status.
    pub fn inject_rx_error(&self, status: LineStatus) {
        self.rx.lock().push_back(Err(status));
    }

    /// Corrupt the channel in flight: the far receiver sees a line
    /// error in place of the next transmitted byte.
    pub fn inject_tx_error(&self, status: LineStatus) {
        self.tx.lock().push_back(Err(status));
    }
}

impl Transport for Pipe {
    fn tx_write(&mut self, bytes: &[u8]) {
        // The hosted ring is unbounded, so transmission never blocks.
        let mut tx = self.tx.lock();
        tx.extend(bytes.iter().copied().map(Ok));
    }

    fn rx_count(&self) -> u16 {
        self.rx.lock().len() as u16
    }

    fn rx_read(&mut self, buf: &mut [u8]) -> Result<(), RxError> {
        let mut rx = self.rx.lock();
        if rx.len() < buf.len() {
            return Err(RxError::NoData);
        }
        for slot in buf.iter_mut() {
            match rx.pop_front() {
                Some(Ok(byte)) => *slot = byte,
                Some(Err(status)) => return Err(RxError::Line(status)),
                None => return Err(RxError::NoData),
            }
        }
        Ok(())
    }
}
