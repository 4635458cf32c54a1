//! Frame assembly on the byte transport.
//!
//! The receive side is a small explicit state machine consumed one
//! `worker` call at a time: each invocation assembles at most one frame,
//! yielding cooperatively while it waits for bytes and giving up after
//! 500 ms of silence on a partially assembled frame. An abort never
//! desynchronizes the stream beyond the bytes already consumed; the
//! next invocation simply hunts for a start flag again.

use std::sync::Arc;

use rhal::{Clock, Transport};

use crate::comm::frame::{
    self, Address, Frame, InnerFrame, MAX_INNER_FRAME_LEN, START_FLAG,
};
use crate::task::scheduler::Kernel;

/// Give up on a partially assembled frame after this long.
pub const READ_TIMEOUT_MS: u32 = 500;

/// One endpoint of the framed link: owns the transport, knows its own
/// address, and moves whole frames in and out.
pub struct SerialLink {
    transport: spin::Mutex<Box<dyn Transport>>,
    clock: Arc<dyn Clock>,
    address: Address,
}

impl SerialLink {
    pub fn new(
        mut transport: Box<dyn Transport>,
        clock: Arc<dyn Clock>,
        address: Address,
    ) -> SerialLink {
        transport.init();
        SerialLink {
            transport: spin::Mutex::new(transport),
            clock,
            address,
        }
    }

    /// This node's address.
    pub fn address(&self) -> Address {
        self.address
    }

    // ── Send ────────────────────────────────────────────────────

    /// Assemble and transmit one frame: header, inner frame, checksum.
    /// The transport may block while its outgoing buffer drains.
    pub fn write_frame(&self, dest: Address, inner: &InnerFrame) {
        let header = frame::header_bytes(self.address, dest, inner.len() as u8);
        let checksum = frame::frame_checksum(self.address, dest, inner);

        let mut transport = self.transport.lock();
        transport.tx_write(&header);
        transport.tx_write(inner.as_bytes());
        transport.tx_write(&[checksum]);
        log::trace!("tx frame {} -> {}: {inner:?}", self.address, dest);
    }

    // ── Receive ─────────────────────────────────────────────────

    /// Whether `timestamp + timeout_ms` lies in the past.
    fn has_timeout(&self, timestamp: u32, timeout_ms: u32) -> bool {
        self.clock.now_ms().wrapping_sub(timestamp) >= timeout_ms
    }

    /// Block (yielding) until `count` bytes are buffered. False when the
    /// timeout measured from `since` expires first.
    fn wait_for_data(&self, kernel: &Kernel, count: u16, since: u32) -> bool {
        while self.transport.lock().rx_count() < count {
            if self.has_timeout(since, READ_TIMEOUT_MS) {
                return false;
            }
            kernel.yield_now();
        }
        true
    }

    fn read_byte(&self) -> Option<u8> {
        let mut byte = [0u8; 1];
        self.transport.lock().rx_read(&mut byte).ok()?;
        Some(byte[0])
    }

    /// Try to assemble one frame; hand it to `on_frame` if it survives
    /// every check. Call periodically. Nothing else may read from the
    /// transport while this runs.
    pub fn worker(&self, kernel: &Kernel, on_frame: &mut dyn FnMut(&Frame)) {
        let [flag_low, flag_high] = START_FLAG.to_le_bytes();

        // Hunt for the start flag.
        let t0 = self.clock.now_ms();
        if !self.wait_for_data(kernel, 2, t0) {
            return;
        }
        match self.read_byte() {
            Some(byte) if byte == flag_low => {}
            _ => return,
        }
        match self.read_byte() {
            Some(byte) if byte == flag_high => {}
            _ => return,
        }

        // A frame is underway; all further timeouts count from here.
        let t1 = self.clock.now_ms();

        let Some(src) = self.read_byte() else { return };
        let Some(dest) = self.read_byte() else { return };
        let Some(length) = self.read_byte() else { return };
        let length = length as usize;
        if length > MAX_INNER_FRAME_LEN {
            log::trace!("rx drop: inner length {length} out of range");
            return;
        }

        // Inner frame plus the checksum footer.
        if !self.wait_for_data(kernel, (length + 1) as u16, t1) {
            log::trace!("rx drop: timeout mid-frame");
            return;
        }
        let mut inner_bytes = [0u8; MAX_INNER_FRAME_LEN];
        if self
            .transport
            .lock()
            .rx_read(&mut inner_bytes[..length])
            .is_err()
        {
            return;
        }
        let Some(received_checksum) = self.read_byte() else {
            return;
        };

        let src = Address(src);
        let dest = Address(dest);
        let Some(inner) = InnerFrame::from_bytes(&inner_bytes[..length]) else {
            return;
        };
        if frame::frame_checksum(src, dest, &inner) != received_checksum {
            log::trace!("rx drop: checksum mismatch");
            return;
        }
        if dest != self.address && !dest.is_broadcast() {
            log::trace!("rx drop: frame for {dest}, not us");
            return;
        }

        log::trace!("rx frame {src} -> {dest}: {inner:?}");
        on_frame(&Frame { src, dest, inner });
    }
}
